//! Encoding of logical names into object-store keys.
//!
//! Object keys are raw bytes on the wire. Logical names are Rust strings, so
//! they are encoded into the configured character set on the way out and
//! decoded with the same charset when keys are listed back.

use crate::error::{StorageError, StorageResult};

/// Character set used for object keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameCharset {
    /// UTF-8, the default.
    #[default]
    Utf8,
    /// ISO-8859-1: one byte per code point up to U+00FF.
    Latin1,
    /// 7-bit ASCII.
    Ascii,
}

impl NameCharset {
    /// Parses a charset label as used in configuration.
    pub fn parse(label: &str) -> StorageResult<Self> {
        match label.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Ok(Self::Latin1),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            other => Err(StorageError::invalid_argument(format!(
                "unsupported file name charset: {other}"
            ))),
        }
    }

    /// Encodes a logical name into key bytes.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the name has a character outside the charset.
    pub fn encode(self, name: &str) -> StorageResult<Vec<u8>> {
        match self {
            Self::Utf8 => Ok(name.as_bytes().to_vec()),
            Self::Latin1 => name
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| unencodable(self, name, c)))
                .collect(),
            Self::Ascii => name
                .chars()
                .map(|c| {
                    if c.is_ascii() {
                        Ok(c as u8)
                    } else {
                        Err(unencodable(self, name, c))
                    }
                })
                .collect(),
        }
    }

    /// Decodes key bytes back into a logical name.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the bytes are not valid in the charset.
    pub fn decode(self, key: &[u8]) -> StorageResult<String> {
        match self {
            Self::Utf8 => String::from_utf8(key.to_vec()).map_err(|e| {
                StorageError::invalid_argument(format!("object key is not valid utf-8: {e}"))
            }),
            Self::Latin1 => Ok(key.iter().map(|&b| char::from(b)).collect()),
            Self::Ascii => {
                if key.is_ascii() {
                    Ok(key.iter().map(|&b| char::from(b)).collect())
                } else {
                    Err(StorageError::invalid_argument("object key is not ascii"))
                }
            }
        }
    }

    /// Label of the charset.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "iso-8859-1",
            Self::Ascii => "ascii",
        }
    }
}

fn unencodable(charset: NameCharset, name: &str, c: char) -> StorageError {
    StorageError::invalid_argument(format!(
        "{name:?} contains {c:?}, which is not representable in {}",
        charset.label()
    ))
}
