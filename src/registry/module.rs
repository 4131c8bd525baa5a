//! Processor type registry
//!
//! Maps type names to [`ProcIf`] descriptors. One mutex guards the whole
//! collection. Internal helpers take the held guard as an argument, so a
//! helper can only run while the caller owns the lock.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::processor::ProcIf;

type ModuleGuard<'a> = MutexGuard<'a, Vec<Arc<ProcIf>>>;

/// Registry of processor types
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    proc_ifs: Mutex<Vec<Arc<ProcIf>>>,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty, shareable registry
    pub fn open() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a copy of `proc_if`
    ///
    /// Fails with `Conflict` if a type with the same name exists.
    pub fn register(&self, proc_if: &ProcIf) -> Result<()> {
        let mut guard = self.proc_ifs.lock();
        if lookup_locked(&guard, &proc_if.name).is_some() {
            return Err(Error::Conflict(format!(
                "processor type '{}' already registered",
                proc_if.name
            )));
        }
        guard.push(Arc::new(proc_if.clone()));

        tracing::info!(
            proc_name = %proc_if.name,
            category = %proc_if.category,
            "Processor type registered"
        );
        Ok(())
    }

    /// Remove the type `name`
    ///
    /// Running instances keep their own reference to the descriptor.
    pub fn unregister(&self, name: &str) -> Result<()> {
        let mut guard = self.proc_ifs.lock();
        let pos = guard
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| Error::not_found(format!("processor type '{name}'")))?;
        guard.remove(pos);

        tracing::info!(proc_name = %name, "Processor type unregistered");
        Ok(())
    }

    /// Shared reference to the registered descriptor
    pub fn lookup(&self, name: &str) -> Result<Arc<ProcIf>> {
        let guard = self.proc_ifs.lock();
        lookup_locked(&guard, name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("processor type '{name}'")))
    }

    /// Independent copy of the registered descriptor
    pub fn get_copy(&self, name: &str) -> Result<ProcIf> {
        let guard = self.proc_ifs.lock();
        lookup_locked(&guard, name)
            .map(|p| ProcIf::clone(p))
            .ok_or_else(|| Error::not_found(format!("processor type '{name}'")))
    }

    /// Registered type names, in registration order
    pub fn names(&self) -> Vec<String> {
        self.proc_ifs.lock().iter().map(|p| p.name.clone()).collect()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.proc_ifs.lock().len()
    }

    /// Whether no type is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lookup_locked<'g>(guard: &'g ModuleGuard<'_>, name: &str) -> Option<&'g Arc<ProcIf>> {
    guard.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::bypass;

    #[test]
    fn test_register_lookup() {
        let modules = ModuleRegistry::new();
        modules.register(&bypass::proc_if()).unwrap();

        let found = modules.lookup("bypass").unwrap();
        assert_eq!(found.name, "bypass");
        assert_eq!(modules.names(), vec!["bypass".to_string()]);
    }

    #[test]
    fn test_duplicate_name_conflicts() {
        let modules = ModuleRegistry::new();
        modules.register(&bypass::proc_if()).unwrap();
        let result = modules.register(&bypass::proc_if());
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert_eq!(modules.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let modules = ModuleRegistry::new();
        modules.register(&bypass::proc_if()).unwrap();
        modules.unregister("bypass").unwrap();
        assert!(modules.is_empty());
        assert!(matches!(modules.unregister("bypass"), Err(Error::NotFound(_))));
        assert!(matches!(modules.lookup("bypass"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_get_copy_equals_registered() {
        let modules = ModuleRegistry::new();
        let original = bypass::proc_if();
        modules.register(&original).unwrap();

        let copy = modules.get_copy("bypass").unwrap();
        assert_eq!(copy, original);
        assert_eq!(*modules.lookup("bypass").unwrap(), copy);
    }

    #[test]
    fn test_lookup_outlives_unregister() {
        let modules = ModuleRegistry::new();
        modules.register(&bypass::proc_if()).unwrap();
        let held = modules.lookup("bypass").unwrap();
        modules.unregister("bypass").unwrap();
        assert_eq!(held.name, "bypass");
    }
}
