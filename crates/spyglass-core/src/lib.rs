//! # Spyglass Core
//!
//! Live object inspection for a running application, including:
//! - Value classification and member enumeration over a reflection facade
//! - Cache entries for members, collection slots and settings
//! - Nested editors for strings, enums, colors, structs, lists and dictionaries
//! - A recycling cell pool that binds an unbounded item list to a few cells
//! - Inspectors, the tab manager, the clipboard and the config panel
//!
//! Everything talks to the application through [`host::Reflection`]. The
//! in-memory [`host::MemoryHost`] implements it for front ends and tests.

#![warn(clippy::all)]

pub mod cache;
pub mod caches;
pub mod classify;
pub mod complete;
pub mod config;
pub mod context;
pub mod enumerate;
pub mod errors;
pub mod evaluator;
pub mod host;
pub mod inspector;
pub mod ivalue;
pub mod labels;
pub mod parse;
pub mod pool;
pub mod session;

// Re-export commonly used types
pub use cache::{CacheCell, CacheEntry, CellView, EntryAction, EntryKind};
pub use caches::ReflectionCaches;
pub use classify::{ValueClassifier, ValueState};
pub use config::{ConfigError, ConfigInspector, ConfigStore, SpyglassConfig};
pub use context::InspectContext;
pub use enumerate::{Blacklist, MemberDescriptor, MemberEnumerator, MemberKind};
pub use errors::InspectError;
pub use evaluator::{CodeEvaluator, Diagnostics};
pub use host::{HostError, MemoryHost, Reflection, TypeBuilder, TypeRef, Value};
pub use inspector::{InspectTarget, InspectorManager, MemberFilter, ReflectionInspector, ScopeFilter};
pub use ivalue::{EditorInput, EditorKind, EditorPool, InteractiveValue};
pub use parse::ParseError;
pub use pool::{CellPool, CellPoolDataSource, RefreshMode};
pub use session::Spyglass;

/// Spyglass version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Capabilities compiled into this build
pub fn features() -> Vec<&'static str> {
    #[allow(unused_mut)]
    let mut features = vec!["core", "memory-host"];

    #[cfg(debug_assertions)]
    features.push("debug");

    features
}

/// Initialize tracing for Spyglass components. Respects `RUST_LOG` when set.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("spyglass_core=info"));
    // A subscriber installed by the embedding application wins
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Error types for Spyglass operations outside a single entry or controller
#[derive(thiserror::Error, Debug)]
pub enum SpyglassError {
    /// Inspection error
    #[error("Inspection error: {0}")]
    Inspect(#[from] errors::InspectError),

    /// Settings error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Text to value conversion error
    #[error("Parse error: {0}")]
    Parse(#[from] parse::ParseError),

    /// Host reflection error
    #[error("Host error: {0}")]
    Host(#[from] host::HostError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for Spyglass operations
pub type Result<T> = std::result::Result<T, SpyglassError>;
