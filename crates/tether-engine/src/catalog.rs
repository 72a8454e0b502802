//! Registered type descriptors

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tether_sdk::TypeDescriptor;

use crate::error::{BridgeError, BridgeResult};
use crate::namespace::NamespaceMapper;

#[derive(Default)]
struct CatalogTable {
    by_native: FxHashMap<String, Arc<TypeDescriptor>>,
    /// Script name -> descriptor, filled on first resolution
    by_script: FxHashMap<String, Arc<TypeDescriptor>>,
}

/// Catalog of registered native types, keyed by native name
#[derive(Default)]
pub struct TypeCatalog {
    table: RwLock<CatalogTable>,
}

impl TypeCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor; each native name registers once
    pub fn register(&self, descriptor: TypeDescriptor) -> BridgeResult<Arc<TypeDescriptor>> {
        let mut table = self.table.write();
        if table.by_native.contains_key(&descriptor.native_name) {
            return Err(BridgeError::invalid(format!(
                "Type is already registered: {}",
                descriptor.native_name
            )));
        }
        let descriptor = Arc::new(descriptor);
        table
            .by_native
            .insert(descriptor.native_name.clone(), descriptor.clone());
        tracing::debug!(
            native_type = %descriptor.native_name,
            members = descriptor.members.len(),
            events = descriptor.events.len(),
            "registered type"
        );
        Ok(descriptor)
    }

    /// Look up a descriptor by native name
    pub fn get(&self, native_name: &str) -> Option<Arc<TypeDescriptor>> {
        self.table.read().by_native.get(native_name).cloned()
    }

    /// Resolve a script-qualified type name
    pub fn resolve(
        &self,
        namespaces: &NamespaceMapper,
        script_name: &str,
    ) -> BridgeResult<Arc<TypeDescriptor>> {
        if let Some(found) = self.table.read().by_script.get(script_name) {
            return Ok(found.clone());
        }

        let native_name = namespaces.resolve_native_name(script_name)?;
        let descriptor = self
            .get(&native_name)
            .ok_or_else(|| BridgeError::ClassNotFound(script_name.to_string()))?;
        self.table
            .write()
            .by_script
            .insert(script_name.to_string(), descriptor.clone());
        Ok(descriptor)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.table.read().by_native.len()
    }

    /// Check if no types are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
