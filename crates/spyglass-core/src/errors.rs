use thiserror::Error;

use crate::host::HostError;
use crate::parse::ParseError;

/// Failures recovered at the entry, editor or controller boundary.
/// None of these propagate into the host.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InspectError {
    #[error("Exception evaluating {member}: {source}")]
    Evaluation {
        member: String,
        #[source]
        source: HostError,
    },

    #[error("Exception setting {member}: {source}")]
    Write {
        member: String,
        #[source]
        source: HostError,
    },

    #[error("Could not parse input for {target}: {source}")]
    ArgumentParse {
        target: String,
        #[source]
        source: ParseError,
    },

    #[error("Could not reflect a member of {type_name}: {source}")]
    Enumeration {
        type_name: String,
        #[source]
        source: HostError,
    },

    #[error("Inspected object {0} is no longer alive")]
    StaleReference(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("No entry at path {0:?}")]
    NoSuchEntry(Vec<usize>),

    #[error("No open inspector with id {0}")]
    NoSuchInspector(usize),

    #[error("Could not save to {path}: {message}")]
    Save { path: String, message: String },
}

impl InspectError {
    pub fn evaluation(member: &str, source: HostError) -> Self {
        Self::Evaluation {
            member: member.to_string(),
            source,
        }
    }

    pub fn write(member: &str, source: HostError) -> Self {
        Self::Write {
            member: member.to_string(),
            source,
        }
    }

    pub fn argument(target: &str, source: ParseError) -> Self {
        Self::ArgumentParse {
            target: target.to_string(),
            source,
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }
}
