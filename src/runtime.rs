//! Startup-time registries
//!
//! A [`Runtime`] bundles the format handlers and operations known to the
//! process. The CLI initializes one shared instance exactly once; tests
//! build their own and may mutate them freely.

use std::sync::OnceLock;

use anyhow::Result;

use crate::ops::{register_builtin, OpContext, OperationRegistry};
use crate::storage::FormatRegistry;

/// Registries consulted while resolving and running a command
#[derive(Default)]
pub struct Runtime {
    pub formats: FormatRegistry,
    pub operations: OperationRegistry,
}

impl Runtime {
    /// A runtime with all built-in formats and operations
    pub fn with_builtin() -> Result<Self> {
        let mut operations = OperationRegistry::new();
        register_builtin(&mut operations)?;

        Ok(Self {
            formats: FormatRegistry::with_builtin(),
            operations,
        })
    }

    /// Context handed to operations
    pub fn op_context(&self) -> OpContext<'_> {
        OpContext {
            formats: &self.formats,
        }
    }
}

static GLOBAL: OnceLock<Result<Runtime, String>> = OnceLock::new();

/// The process-wide runtime, built on first use
///
/// Concurrent first callers block until the single initialization finishes.
pub fn global() -> Result<&'static Runtime> {
    GLOBAL
        .get_or_init(|| Runtime::with_builtin().map_err(|e| format!("{:#}", e)))
        .as_ref()
        .map_err(|msg| anyhow::anyhow!("failed to initialize registries: {}", msg))
}
