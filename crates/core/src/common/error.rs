//! Crate-wide error type.
//!
//! This module defines [`SimError`], the single error type returned by
//! configuration parsing, trace loading, and component construction. Request
//! handling itself never returns `Result`: a rejected request is communicated
//! through [`crate::common::Response::accepted`], not an error, since
//! "the queue is full right now" is an expected, recoverable outcome rather
//! than a failure.

use thiserror::Error;

/// Errors raised while configuring or assembling a simulation.
#[derive(Error, Debug, Clone)]
pub enum SimError {
    /// A config file line was neither a section header, a key/value pair,
    /// a comment, nor blank.
    #[error("config: malformed line {line}: {text:?}")]
    ConfigSyntax { line: usize, text: String },

    /// A key/value line appeared before any `[section]` header.
    #[error("config: key/value pair before any section header at line {line}")]
    ConfigNoSection { line: usize },

    /// A requested section does not exist.
    #[error("config: no such section {0:?}")]
    ConfigNoSuchSection(String),

    /// A requested key does not exist within an existing section.
    #[error("config: no such key {key:?} in section {section:?}")]
    ConfigNoSuchKey { section: String, key: String },

    /// A key's value could not be parsed as the requested type.
    #[error("config: value {value:?} for key {key:?} is not a valid {expected}")]
    ConfigValueType {
        key: String,
        value: String,
        expected: &'static str,
    },

    /// An `organization` entry was not of the form `count*type`.
    #[error("config: malformed organization entry {0:?}, expected \"count*type\"")]
    ConfigOrganizationSyntax(String),

    /// A component type name named in the config has no known constructor.
    #[error("config: unknown component type {0:?}")]
    UnknownComponentType(String),

    /// A component mapping function name has no known implementation.
    #[error("mapping: unknown mapping function {0:?}")]
    UnknownMappingFunction(String),

    /// The requested address does not decode to any child under the given
    /// mapping function.
    #[error("mapping: address {0:#x} out of range for this component")]
    AddressOutOfRange(u64),

    /// A trace line could not be parsed into a request.
    #[error("trace: malformed line {line}: {text:?}")]
    TraceSyntax { line: usize, text: String },

    /// Failed to open or read a file from disk.
    #[error("io error reading {path:?}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::sync::Arc<std::io::Error>,
    },
}

impl SimError {
    /// Wraps an I/O error with the path that was being read.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        SimError::Io {
            path: path.into(),
            source: std::sync::Arc::new(source),
        }
    }
}

impl PartialEq for SimError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::ConfigSyntax { line: l1, text: t1 },
                Self::ConfigSyntax { line: l2, text: t2 },
            ) => l1 == l2 && t1 == t2,
            (Self::ConfigNoSection { line: l1 }, Self::ConfigNoSection { line: l2 }) => l1 == l2,
            (Self::ConfigNoSuchSection(a), Self::ConfigNoSuchSection(b)) => a == b,
            (
                Self::ConfigNoSuchKey {
                    section: s1,
                    key: k1,
                },
                Self::ConfigNoSuchKey {
                    section: s2,
                    key: k2,
                },
            ) => s1 == s2 && k1 == k2,
            (
                Self::ConfigValueType {
                    key: k1,
                    value: v1,
                    expected: e1,
                },
                Self::ConfigValueType {
                    key: k2,
                    value: v2,
                    expected: e2,
                },
            ) => k1 == k2 && v1 == v2 && e1 == e2,
            (Self::ConfigOrganizationSyntax(a), Self::ConfigOrganizationSyntax(b)) => a == b,
            (Self::UnknownComponentType(a), Self::UnknownComponentType(b)) => a == b,
            (Self::UnknownMappingFunction(a), Self::UnknownMappingFunction(b)) => a == b,
            (Self::AddressOutOfRange(a), Self::AddressOutOfRange(b)) => a == b,
            (
                Self::TraceSyntax { line: l1, text: t1 },
                Self::TraceSyntax { line: l2, text: t2 },
            ) => l1 == l2 && t1 == t2,
            (
                Self::Io {
                    path: p1,
                    source: s1,
                },
                Self::Io {
                    path: p2,
                    source: s2,
                },
            ) => p1 == p2 && s1.kind() == s2.kind() && s1.to_string() == s2.to_string(),
            _ => false,
        }
    }
}

impl Eq for SimError {}
