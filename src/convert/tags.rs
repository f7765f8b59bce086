//! Typed decoding of free-form read tags.

use std::str::FromStr;

use thiserror::Error;

use crate::model::{TagArray, TagValue};

/// Standard tags from the SAM specification (section 1.5) with their types.
/// Names not listed here decode as strings.
const STANDARD_TAGS: [(&str, char); 45] = [
    ("AM", 'i'),
    ("AS", 'i'),
    ("BC", 'Z'),
    ("BQ", 'Z'),
    ("CC", 'Z'),
    ("CM", 'i'),
    ("CO", 'Z'),
    ("CP", 'i'),
    ("CQ", 'Z'),
    ("CS", 'Z'),
    ("CT", 'Z'),
    ("E2", 'Z'),
    ("FI", 'i'),
    ("FS", 'Z'),
    ("FZ", 'B'),
    ("H0", 'i'),
    ("H1", 'i'),
    ("H2", 'i'),
    ("HI", 'i'),
    ("IH", 'i'),
    ("LB", 'Z'),
    ("MC", 'Z'),
    ("MD", 'Z'),
    ("MQ", 'i'),
    ("NH", 'i'),
    ("NM", 'i'),
    ("OQ", 'Z'),
    ("OP", 'i'),
    ("OC", 'Z'),
    ("PG", 'Z'),
    ("PQ", 'i'),
    ("PT", 'Z'),
    ("PU", 'Z'),
    ("QT", 'Z'),
    ("Q2", 'Z'),
    ("R2", 'Z'),
    ("RG", 'Z'),
    ("RT", 'Z'),
    ("SA", 'Z'),
    ("SM", 'i'),
    ("TC", 'i'),
    ("U2", 'Z'),
    ("UQ", 'i'),
    ("MF", 'i'),
    ("Aq", 'i'),
];

/// Errors raised while decoding a tag.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TagError {
    /// Tag names are two characters, a letter then a letter or digit.
    #[error("invalid tag name {0:?}")]
    InvalidName(String),
    /// Type character outside `A i f Z H B`.
    #[error("unknown type {type_code:?} for tag {tag}")]
    UnknownType {
        /// Tag name.
        tag: String,
        /// Offending type.
        type_code: String,
    },
    /// Value does not parse as the declared type.
    #[error("malformed {type_code} value {value:?} for tag {tag}")]
    InvalidValue {
        /// Tag name.
        tag: String,
        /// Declared type.
        type_code: char,
        /// Raw value.
        value: String,
    },
    /// Array value is malformed.
    #[error("malformed array for tag {tag}: {reason}")]
    InvalidArray {
        /// Tag name.
        tag: String,
        /// What went wrong.
        reason: String,
    },
    /// Text is not of the form `NAME:TYPE:VALUE`.
    #[error("malformed tag text {0:?}")]
    MalformedText(String),
}

/// Decodes `NAME:TYPE:VALUE` triples into typed values.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagCodec;

impl TagCodec {
    /// SAM type for a tag name, `Z` when the name is not a standard tag.
    pub fn type_for(name: &str) -> char {
        STANDARD_TAGS
            .iter()
            .find(|(tag, _)| *tag == name)
            .map(|(_, type_code)| *type_code)
            .unwrap_or('Z')
    }

    /// Decode one free-form value of `name`, typed by the standard table.
    pub fn decode(name: &str, value: &str) -> Result<TagValue, TagError> {
        Self::decode_typed(name, Self::type_for(name), value)
    }

    /// Decode a full `NAME:TYPE:VALUE` text triple.
    pub fn decode_text(text: &str) -> Result<(String, TagValue), TagError> {
        let mut parts = text.splitn(3, ':');
        let (Some(name), Some(type_code), Some(value)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(TagError::MalformedText(text.to_string()));
        };
        let mut chars = type_code.chars();
        let (Some(code), None) = (chars.next(), chars.next()) else {
            return Err(TagError::UnknownType {
                tag: name.to_string(),
                type_code: type_code.to_string(),
            });
        };
        let decoded = Self::decode_typed(name, code, value)?;
        Ok((name.to_string(), decoded))
    }

    /// Render a typed value back to its text triple.
    pub fn encode(name: &str, value: &TagValue) -> String {
        format!("{name}:{}:{value}", value.type_code())
    }

    /// Decode `value` as SAM type `type_code`.
    pub fn decode_typed(name: &str, type_code: char, value: &str) -> Result<TagValue, TagError> {
        validate_name(name)?;
        let invalid = || TagError::InvalidValue {
            tag: name.to_string(),
            type_code,
            value: value.to_string(),
        };

        match type_code {
            'A' => {
                let mut bytes = value.bytes();
                match (bytes.next(), bytes.next()) {
                    (Some(c), None) if c.is_ascii_graphic() => Ok(TagValue::Char(c)),
                    _ => Err(invalid()),
                }
            }
            'i' => value.trim().parse().map(TagValue::Int).map_err(|_| invalid()),
            'f' => value.trim().parse().map(TagValue::Float).map_err(|_| invalid()),
            'Z' => {
                if value.bytes().all(|b| b == b' ' || b.is_ascii_graphic()) {
                    Ok(TagValue::String(value.to_string()))
                } else {
                    Err(invalid())
                }
            }
            'H' => {
                if value.len() % 2 == 0 && value.bytes().all(|b| b.is_ascii_hexdigit()) {
                    Ok(TagValue::Hex(value.to_ascii_uppercase()))
                } else {
                    Err(invalid())
                }
            }
            'B' => decode_array(name, value).map(TagValue::Array),
            other => Err(TagError::UnknownType {
                tag: name.to_string(),
                type_code: other.to_string(),
            }),
        }
    }
}

fn validate_name(name: &str) -> Result<(), TagError> {
    match name.as_bytes() {
        [first, second] if first.is_ascii_alphabetic() && second.is_ascii_alphanumeric() => Ok(()),
        _ => Err(TagError::InvalidName(name.to_string())),
    }
}

fn decode_array(name: &str, value: &str) -> Result<TagArray, TagError> {
    let array_error = |reason: String| TagError::InvalidArray {
        tag: name.to_string(),
        reason,
    };

    let mut fields = value.split(',');
    let subtype = fields
        .next()
        .filter(|subtype| subtype.len() == 1)
        .ok_or_else(|| array_error(format!("missing subtype in {value:?}")))?;
    let elements: Vec<&str> = fields.map(str::trim).collect();

    fn parse_all<T: FromStr>(elements: &[&str]) -> Result<Vec<T>, String> {
        elements
            .iter()
            .map(|element| {
                element
                    .parse()
                    .map_err(|_| format!("element {element:?} out of range"))
            })
            .collect()
    }

    let array = match subtype {
        "c" => parse_all(&elements).map(TagArray::I8),
        "C" => parse_all(&elements).map(TagArray::U8),
        "s" => parse_all(&elements).map(TagArray::I16),
        "S" => parse_all(&elements).map(TagArray::U16),
        "i" => parse_all(&elements).map(TagArray::I32),
        "I" => parse_all(&elements).map(TagArray::U32),
        "f" => parse_all(&elements).map(TagArray::Float),
        other => Err(format!("unknown subtype {other:?}")),
    };
    array.map_err(array_error)
}
