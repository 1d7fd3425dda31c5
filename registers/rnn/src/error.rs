// Licensed under the Apache-2.0 license

//! Error types for loading, resolving and decoding register databases.
//!
//! Loading never stops at the first problem: apart from the two fatal kinds
//! (see [`LoadError::is_fatal`]) every error is recorded as a [`Diagnostic`]
//! on the database and processing continues. Decoding never fails at all;
//! a [`DecodeError`] only explains why a rendering fell back to raw hex.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Problems found while reading or resolving a database.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("couldn't find database file \"{0}\", please set RNN_PATH")]
    FileNotFound(String),

    #[error("couldn't parse database file: {0}")]
    MalformedDocument(String),

    #[error("schema validation failed: {0}")]
    SchemaValidationFailed(String),

    #[error("invalid {expected} value \"{value}\" in attribute {attr}")]
    MalformedAttribute {
        attr: String,
        value: String,
        expected: &'static str,
    },

    #[error("<{element}> is missing required attribute \"{attr}\"")]
    MissingRequiredAttribute { element: String, attr: String },

    #[error("merge fail for {kind} {name}: {detail}")]
    DuplicateDefinitionConflict {
        kind: &'static str,
        name: String,
        detail: String,
    },

    #[error("wrong {what} \"{name}\" in <{context}>")]
    UnknownElementOrAttribute {
        context: String,
        name: String,
        what: &'static str,
    },

    #[error("{context}: unknown type {name}")]
    UnresolvedTypeReference { context: String, name: String },

    #[error("group {0} not found")]
    UnresolvedGroupReference(String),

    #[error("group {0} uses itself")]
    RecursiveGroup(String),

    #[error("{0} has non-1 length, but no stride")]
    ArrayMissingStride(String),

    #[error("{name}: bitfield has wrong placement [{low}:{high}]")]
    InvalidBitRange { name: String, low: u32, high: u32 },

    #[error("{context}: variant {variant} doesn't exist in {varset}")]
    UnknownVariant {
        context: String,
        varset: String,
        variant: String,
    },

    #[error("{context}: variant range {range} of {varset} is empty")]
    EmptyVariantRange {
        context: String,
        varset: String,
        range: String,
    },

    #[error("{context}: addvariant specified on non-enum type {name}")]
    AddVariantOnNonEnum { context: String, name: String },
}

impl LoadError {
    /// Fatal errors abort the current load or resolve call. Everything else
    /// is accumulated.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LoadError::FileNotFound(_) | LoadError::ArrayMissingStride(_)
        )
    }
}

/// An accumulated, non-fatal load error with its source location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
    pub error: LoadError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: {}", file.display(), line, self.error),
            (Some(file), None) => write!(f, "{}: {}", file.display(), self.error),
            _ => write!(f, "{}", self.error),
        }
    }
}

/// Reasons a decode degraded to a raw rendering.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("I don't know which {0} variant to use")]
    NoVariantSelected(String),

    #[error("no register matches address {0:#x}")]
    NoAddressMatch(u64),

    #[error("value {value:#x} doesn't fit field mask {mask:#x}")]
    ValueOutOfRange { value: u64, mask: u64 },

    #[error("enum {0} doesn't exist in database")]
    UnknownEnum(String),

    #[error("variant {variant} doesn't exist in enum {varset}")]
    UnknownVariant { varset: String, variant: String },
}

/// Markup syntax errors reported by [`crate::tree::parse`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("line {line}: {message}")]
    Syntax { line: u32, message: String },

    #[error("document has no root element")]
    Empty,
}
