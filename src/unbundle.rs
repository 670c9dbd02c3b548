//! Lazily-resolvable module tables for unbundled application code.

use std::collections::HashMap;

/// One module's source within an unbundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnbundleModule {
    /// Module name, used in diagnostics.
    pub name: String,
    /// Module source text.
    pub code: String,
}

/// A module table the engine resolves lazily while executing startup code.
///
/// The bridge forwards the table to the executor untouched; which modules
/// get resolved, and when, is entirely the engine's business.
pub trait Unbundle: Send {
    /// Look up a module by numeric id. `None` if the table has no such
    /// module.
    fn module(&self, module_id: u32) -> Option<UnbundleModule>;
}

/// In-memory unbundle backed by a map. Used by tests and small hosts;
/// production hosts typically stream modules from a packaged bundle file.
#[derive(Debug, Default)]
pub struct MapUnbundle {
    modules: HashMap<u32, UnbundleModule>,
}

impl MapUnbundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under an id, replacing any previous entry.
    pub fn insert(&mut self, module_id: u32, name: impl Into<String>, code: impl Into<String>) {
        self.modules.insert(
            module_id,
            UnbundleModule {
                name: name.into(),
                code: code.into(),
            },
        );
    }
}

impl Unbundle for MapUnbundle {
    fn module(&self, module_id: u32) -> Option<UnbundleModule> {
        self.modules.get(&module_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_unbundle_lookup() {
        let mut unbundle = MapUnbundle::new();
        unbundle.insert(0, "main", "module.exports = 1;");

        let module = unbundle.module(0).unwrap();
        assert_eq!(module.name, "main");
        assert!(unbundle.module(1).is_none());
    }
}
