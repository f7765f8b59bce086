//! `ga4gh://` readset URLs.
//!
//! A readset is addressed as
//! `ga4gh://<api root>/reads/<dataset>/<readset>/<sequence>/[<start>-<end>]`,
//! for example
//! `ga4gh://www.googleapis.com/genomics/v1beta/reads/1680154093/CLqN8Z3sDRD/1/`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::stream::QueryInterval;

const SCHEME: &str = "ga4gh://";
const READS_COMPONENT: &str = "/reads/";

/// Errors raised while parsing a readset URL.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    /// The URL does not start with `ga4gh://`.
    #[error("{0}: scheme is not ga4gh")]
    Scheme(String),
    /// No `/reads/` path component.
    #[error("{0}: missing /reads/ path component")]
    MissingReads(String),
    /// Fewer than dataset, readset and sequence after `/reads/`.
    #[error("{url}: expected /reads/<dataset>/<readset>/<sequence>/[range], got {path}")]
    MissingComponents {
        /// Full URL.
        url: String,
        /// Path from `/reads/` on.
        path: String,
    },
    /// The trailing component is not `<start>-<end>`.
    #[error("{url}: expected last component to be <start>-<end>, got {range}")]
    InvalidRange {
        /// Full URL.
        url: String,
        /// Offending component.
        range: String,
    },
}

/// Parsed readset URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadsetUrl {
    /// API root with the scheme rewritten to `https://`.
    pub root_url: String,
    /// Dataset id.
    pub dataset: String,
    /// Read group set id.
    pub readset: String,
    /// Reference name.
    pub sequence: String,
    /// Range start, zero when absent.
    pub range_start: i64,
    /// Range end, zero when absent.
    pub range_end: i64,
}

impl ReadsetUrl {
    /// Whether `url` uses the `ga4gh` scheme (case-insensitive).
    pub fn is_ga4gh_url(url: &str) -> bool {
        url.get(..SCHEME.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SCHEME))
    }

    /// Parse a `ga4gh://` URL.
    pub fn parse(url: &str) -> Result<Self, UrlError> {
        if !Self::is_ga4gh_url(url) {
            return Err(UrlError::Scheme(url.to_string()));
        }
        let reads_at = url
            .find(READS_COMPONENT)
            .ok_or_else(|| UrlError::MissingReads(url.to_string()))?;
        let root_url = format!("https://{}", &url[SCHEME.len()..reads_at]);
        let path = &url[reads_at..];

        let mut components: Vec<&str> = path.split('/').collect();
        while components.last().is_some_and(|last| last.is_empty()) {
            components.pop();
        }
        let [_, _, dataset, readset, sequence, rest @ ..] = components.as_slice() else {
            return Err(UrlError::MissingComponents {
                url: url.to_string(),
                path: path.to_string(),
            });
        };

        let (range_start, range_end) = match rest.first() {
            None => (0, 0),
            Some(range) => {
                let invalid = || UrlError::InvalidRange {
                    url: url.to_string(),
                    range: range.to_string(),
                };
                let (start, end) = range.split_once('-').ok_or_else(invalid)?;
                (
                    start.parse().map_err(|_| invalid())?,
                    end.parse().map_err(|_| invalid())?,
                )
            }
        };

        Ok(Self {
            root_url,
            dataset: dataset.to_string(),
            readset: readset.to_string(),
            sequence: sequence.to_string(),
            range_start,
            range_end,
        })
    }

    /// Overlap interval addressed by the URL.
    pub fn to_interval(&self) -> QueryInterval {
        QueryInterval::overlapping(self.sequence.as_str(), self.range_start, self.range_end)
    }
}

impl FromStr for ReadsetUrl {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ReadsetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.root_url.strip_prefix("https://").unwrap_or(&self.root_url);
        write!(
            f,
            "{SCHEME}{root}{READS_COMPONENT}{}/{}/{}/",
            self.dataset, self.readset, self.sequence
        )?;
        if self.range_start != 0 || self.range_end != 0 {
            write!(f, "{}-{}", self.range_start, self.range_end)?;
        }
        Ok(())
    }
}
