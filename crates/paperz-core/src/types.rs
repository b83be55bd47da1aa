//! Domain records shared by every client surface.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::hash::EntryHash;

/// An uploaded paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    /// Original filename, extension included.
    pub filename: String,
    /// File bytes, base64-encoded. Kept as text so the record passes through
    /// the wire and the zome store unchanged.
    pub blob_str: String,
}

impl Paper {
    /// Build a record from raw file bytes.
    pub fn from_bytes(filename: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            blob_str: STANDARD.encode(bytes),
        }
    }

    /// Decode the stored blob back into file bytes.
    pub fn decode_blob(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.blob_str)
    }
}

/// A reader's annotation against one paper.
///
/// `paper_ref` is the entry hash of the paper it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub paper_ref: EntryHash,
    pub page_num: u64,
    pub paragraph_num: u64,
    pub what_it_says: String,
    pub what_it_should_say: String,
}

/// An uploaded meme image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meme {
    /// Original filename, extension included.
    pub filename: String,
    /// Image bytes, base64-encoded.
    pub blob_str: String,
}

impl Meme {
    pub fn from_bytes(filename: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            blob_str: STANDARD.encode(bytes),
        }
    }

    pub fn decode_blob(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.blob_str)
    }
}
