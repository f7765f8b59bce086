use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ga4gh_sam::io::{write_records, OutputFormat};
use ga4gh_sam::model::ReadsetMetadata;
use ga4gh_sam::source::JsonSource;
use ga4gh_sam::{
    HeaderBuilder, PositionConstraint, QueryInterval, ReadsetUrl, SamReader, StreamConfig,
    StreamError, DEFAULT_MAX_UNMAPPED_MATES,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ga4gh-sam", about = "Stream remote reads as SAM/BAM records")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream reads of a local readset export to SAM or BAM.
    View {
        /// Readset metadata (read group set and references) as JSON.
        #[arg(long)]
        metadata: PathBuf,
        /// Reads as JSON lines, coordinate sorted with unmapped reads last.
        #[arg(long)]
        reads: PathBuf,
        /// Read group set id (default: the one in the metadata).
        #[arg(long)]
        readset: Option<String>,
        /// ga4gh:// URL selecting readset and region.
        #[arg(long, conflicts_with_all = ["readset", "region"])]
        url: Option<String>,
        /// Region `name[:start[-end]]`; repeat for several. Default: all reads.
        #[arg(long)]
        region: Vec<QueryInterval>,
        /// Keep only records contained in the regions.
        #[arg(long, conflicts_with = "start_at")]
        contained: bool,
        /// Keep only records starting exactly at the region start.
        #[arg(long)]
        start_at: bool,
        /// Do not re-inject unmapped mates next to their mapped mate.
        #[arg(long)]
        no_injection: bool,
        /// Cap on buffered unmapped mates.
        #[arg(long, default_value_t = DEFAULT_MAX_UNMAPPED_MATES)]
        max_unmapped: usize,
        /// Output file (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write SAM text instead of BAM.
        #[arg(long)]
        sam: bool,
    },
    /// Print the merged SAM header of a readset.
    Header {
        /// Readset metadata as JSON.
        #[arg(long)]
        metadata: PathBuf,
    },
    /// Print the components of a ga4gh:// readset URL.
    ParseUrl {
        /// URL to parse.
        url: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::View {
            metadata,
            reads,
            readset,
            url,
            region,
            contained,
            start_at,
            no_injection,
            max_unmapped,
            output,
            sam,
        } => {
            let constraint = if contained {
                PositionConstraint::Contained
            } else if start_at {
                PositionConstraint::StartAt
            } else {
                PositionConstraint::Overlapping
            };
            let config = StreamConfig::default()
                .with_mate_injection(!no_injection)
                .with_max_unmapped_mates(max_unmapped);
            let format = if sam { OutputFormat::Sam } else { OutputFormat::Bam };
            run_view(
                metadata, reads, readset, url, region, constraint, config, output, format,
            )?
        }
        Commands::Header { metadata } => run_header(metadata)?,
        Commands::ParseUrl { url } => run_parse_url(&url)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[allow(clippy::too_many_arguments)]
fn run_view(
    metadata_path: PathBuf,
    reads_path: PathBuf,
    readset: Option<String>,
    url: Option<String>,
    regions: Vec<QueryInterval>,
    constraint: PositionConstraint,
    config: StreamConfig,
    output: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let source = JsonSource::open(&metadata_path, &reads_path).with_context(|| {
        format!(
            "failed to open readset export {} / {}",
            metadata_path.display(),
            reads_path.display()
        )
    })?;

    let (readset, regions) = match url {
        Some(url) => {
            let url = ReadsetUrl::parse(&url).context("invalid readset URL")?;
            let interval = url.to_interval();
            (url.readset, vec![interval])
        }
        None => (
            readset.unwrap_or_else(|| source.read_group_set_id().to_string()),
            regions,
        ),
    };
    let intervals = if regions.is_empty() {
        vec![QueryInterval::whole_readset()]
    } else {
        regions
            .into_iter()
            .map(|interval| interval.with_constraint(constraint))
            .collect()
    };

    let mut reader = SamReader::open(source, &readset, config)
        .with_context(|| format!("failed to open readset {readset}"))?;
    let mut stream = reader.query(intervals).context("failed to start query")?;

    let mut failure: Option<StreamError> = None;
    let mut skipped = 0usize;
    let records = stream
        .by_ref()
        .map_while(|item| match item {
            Ok(record) => Some(Some(record)),
            Err(StreamError::Convert(err)) => {
                warn!(error = %err, "skipping read that failed to convert");
                skipped += 1;
                Some(None)
            }
            Err(err) => {
                failure = Some(err);
                None
            }
        })
        .flatten();
    let written = write_records(output.as_deref(), format, reader.header(), records)?;

    let violations = stream.order_violations();
    stream.close();
    reader.close();
    if let Some(err) = failure {
        bail!("stream failed after {written} records: {err}");
    }
    info!(written, skipped, order_violations = violations, "done");
    Ok(())
}

fn run_header(metadata_path: PathBuf) -> Result<()> {
    let file = File::open(&metadata_path)
        .with_context(|| format!("failed to open {}", metadata_path.display()))?;
    let metadata: ReadsetMetadata = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse {}", metadata_path.display()))?;
    let header = HeaderBuilder::new()
        .build(&metadata.read_group_set, &metadata.references)
        .context("failed to build header")?;
    print!("{}", header.to_sam_text());
    Ok(())
}

fn run_parse_url(url: &str) -> Result<()> {
    let url = ReadsetUrl::parse(url)?;
    println!("root\t{}", url.root_url);
    println!("dataset\t{}", url.dataset);
    println!("readset\t{}", url.readset);
    println!("sequence\t{}", url.sequence);
    println!("range\t{}-{}", url.range_start, url.range_end);
    Ok(())
}
