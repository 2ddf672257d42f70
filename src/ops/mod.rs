//! # Operations
//!
//! Named, introspectable processing steps that `ect run` can invoke.
//!
//! Each [`Operation`] declares ordered [`ParamSpec`]s and an entry point
//! taking keyword [`Bindings`], an [`OpContext`] and a progress
//! [`Monitor`](crate::domain::Monitor).
//!
//! ## Built-in Operations
//!
//! | Name | Tags | Purpose |
//! |------|------|---------|
//! | `read_object` / `write_object` | io | Format-dispatched file I/O |
//! | `read_text` / `write_text` | io | Plain text |
//! | `read_json` / `write_json` | io | JSON |
//! | `read_dataset` / `write_dataset` | io | Dataset containers |
//! | `time_period` | util | Expand a period expression |

mod io;
mod operation;
mod time;

pub use operation::{
    Bindings, OpContext, Operation, OperationFn, OperationRegistry, ParamSpec, ParamType,
    RegistryError,
};

/// Registers all built-in operations
pub fn register_builtin(registry: &mut OperationRegistry) -> anyhow::Result<()> {
    io::register(registry)?;
    time::register(registry)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_operations_are_registered_once() {
        let mut registry = OperationRegistry::new();
        register_builtin(&mut registry).unwrap();

        assert!(registry.lookup("read_object").is_some());
        assert!(registry.lookup("time_period").is_some());
        assert_eq!(registry.len(), 9);

        // A second registration collides with the first
        assert!(register_builtin(&mut registry).is_err());
    }
}
