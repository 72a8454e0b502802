//! Live native instances addressable by handle
//!
//! Handles are minted from a monotonically increasing counter and are never
//! reused. The registry keeps a reverse index by object identity so the same
//! native object always crosses the bridge with the same handle.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::json;
use tether_sdk::{NativeError, NativeValue, ObjectRef};

use crate::error::{BridgeError, BridgeResult};
use crate::invoke::ResolvedInvocation;
use crate::marshal::{MarshalError, HANDLE_KEY, TYPE_KEY};
use crate::ScriptValue;

/// Opaque reference to a live native instance: script type plus id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceHandle {
    type_name: String,
    id: u64,
}

impl InstanceHandle {
    /// Create a handle
    pub fn new(type_name: impl Into<String>, id: u64) -> Self {
        Self {
            type_name: type_name.into(),
            id,
        }
    }

    /// Script-qualified type name
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Numeric id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Script representation: `{"type": T, "handle": id}`
    pub fn to_script(&self) -> ScriptValue {
        json!({ TYPE_KEY: self.type_name, HANDLE_KEY: self.id })
    }

    /// Parse the script representation
    pub fn from_script(value: &ScriptValue) -> Result<Self, MarshalError> {
        let map = value
            .as_object()
            .ok_or_else(|| MarshalError::mismatch("instance handle", value))?;
        let type_name = map
            .get(TYPE_KEY)
            .and_then(ScriptValue::as_str)
            .ok_or_else(|| MarshalError::malformed("instance handle", "missing type"))?;
        let id = map
            .get(HANDLE_KEY)
            .and_then(ScriptValue::as_u64)
            .ok_or_else(|| MarshalError::malformed("instance handle", "missing handle"))?;
        Ok(Self::new(type_name, id))
    }
}

impl std::fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.type_name, self.id)
    }
}

/// Lookup failure for a handle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{type_name} #{id} is not a live instance")]
pub struct InstanceNotFound {
    /// Script type named by the handle
    pub type_name: String,
    /// Handle id
    pub id: u64,
}

impl From<&InstanceHandle> for InstanceNotFound {
    fn from(handle: &InstanceHandle) -> Self {
        Self {
            type_name: handle.type_name.clone(),
            id: handle.id,
        }
    }
}

struct InstanceEntry {
    script_type: String,
    object: ObjectRef,
}

#[derive(Default)]
struct InstanceTable {
    entries: FxHashMap<u64, InstanceEntry>,
    by_identity: FxHashMap<usize, u64>,
}

/// Registry of live instances
pub struct InstanceRegistry {
    table: RwLock<InstanceTable>,
    next_id: AtomicU64,
}

impl InstanceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            table: RwLock::new(InstanceTable::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Run a resolved constructor and register the new object.
    ///
    /// The constructor runs outside the registry lock.
    pub fn create(
        &self,
        script_type: &str,
        constructor: ResolvedInvocation,
    ) -> BridgeResult<InstanceHandle> {
        let object = match constructor.call()? {
            NativeValue::Object(object) => object,
            other => {
                return Err(BridgeError::NativeFailure(NativeError::TypeMismatch {
                    expected: script_type.to_string(),
                    got: other.kind().to_string(),
                }))
            }
        };
        Ok(self.register(object, script_type))
    }

    /// Handle for an object, minting one on first sight
    pub fn register(&self, object: ObjectRef, script_type: &str) -> InstanceHandle {
        let identity = object.identity();
        let mut table = self.table.write();
        if let Some(id) = table.by_identity.get(&identity) {
            if let Some(entry) = table.entries.get(id) {
                return InstanceHandle::new(entry.script_type.clone(), *id);
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        table.by_identity.insert(identity, id);
        table.entries.insert(
            id,
            InstanceEntry {
                script_type: script_type.to_string(),
                object,
            },
        );
        tracing::debug!(instance = id, script_type, "registered instance");
        InstanceHandle::new(script_type, id)
    }

    /// Object denoted by a handle
    pub fn resolve(&self, handle: &InstanceHandle) -> Result<ObjectRef, InstanceNotFound> {
        let table = self.table.read();
        table
            .entries
            .get(&handle.id)
            .filter(|entry| entry.script_type == handle.type_name)
            .map(|entry| entry.object.clone())
            .ok_or_else(|| handle.into())
    }

    /// Remove an instance; the handle is invalid afterwards
    pub fn release(&self, handle: &InstanceHandle) -> Result<ObjectRef, InstanceNotFound> {
        let mut table = self.table.write();
        match table.entries.get(&handle.id) {
            Some(entry) if entry.script_type == handle.type_name => {}
            _ => return Err(handle.into()),
        }
        let entry = table
            .entries
            .remove(&handle.id)
            .ok_or_else(|| InstanceNotFound::from(handle))?;
        table.by_identity.remove(&entry.object.identity());
        tracing::debug!(instance = handle.id, script_type = %handle.type_name, "released instance");
        Ok(entry.object)
    }

    /// Number of live instances
    pub fn len(&self) -> usize {
        self.table.read().entries.len()
    }

    /// Check if there are no live instances
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every instance; returns the handles removed
    pub fn clear(&self) -> Vec<InstanceHandle> {
        let mut table = self.table.write();
        table.by_identity.clear();
        let mut handles: Vec<_> = table
            .entries
            .drain()
            .map(|(id, entry)| InstanceHandle::new(entry.script_type, id))
            .collect();
        handles.sort_by_key(InstanceHandle::id);
        handles
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
