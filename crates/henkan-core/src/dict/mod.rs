//! Dictionary storage.
//!
//! `LoudsDictionary` maps readings to entries through a LOUDS trie.
//! `ConnectionMatrix` and `MorphemePairTable` hold the transition values used
//! to score adjacent lattice nodes.

pub mod connection;
mod element;
mod louds;
mod louds_dict;

pub use connection::{ConnectionMatrix, Connectivity, MorphemePairTable};
pub use element::{DicdataElement, DictEntry, ElementFlags};
pub use louds_dict::{LoudsDictionary, TypoMatch};

use std::io;

/// Error type for dictionary image and connectivity table I/O.
#[derive(Debug, thiserror::Error)]
pub enum DictError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header (too short)")]
    InvalidHeader,

    #[error("invalid magic bytes")]
    InvalidMagic,

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("serialization error: {0}")]
    Serialize(bincode::Error),

    #[error("deserialization error: {0}")]
    Deserialize(bincode::Error),

    #[error("parse error: {0}")]
    Parse(String),
}
