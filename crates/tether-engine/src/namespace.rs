//! Script namespace ↔ native prefix mapping
//!
//! Script code names types as `Namespace.Type` (dotted namespace, last
//! segment is the type). Native types are named `prefix::Type` where the
//! prefix is a `::`-separated module path. Mappings are registered once at
//! startup and form a bijection.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tether_sdk::NATIVE_PATH_SEPARATOR;

/// Separator between script namespace and type name
pub const SCRIPT_PATH_SEPARATOR: char = '.';

/// Namespace mapping errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NamespaceError {
    /// Namespace already mapped to a different prefix
    #[error("Namespace '{namespace}' is already mapped to '{existing}'; cannot map it to '{requested}'")]
    Conflict {
        /// Script namespace
        namespace: String,
        /// Prefix it is mapped to
        existing: String,
        /// Prefix requested
        requested: String,
    },

    /// Prefix already mapped from a different namespace
    #[error("Native prefix '{prefix}' is already mapped from namespace '{existing}'")]
    PrefixTaken {
        /// Native prefix
        prefix: String,
        /// Namespace it is mapped from
        existing: String,
    },

    /// Malformed namespace or prefix
    #[error("Invalid namespace mapping: {0}")]
    Invalid(String),

    /// Script name whose namespace has no mapping
    #[error("No namespace mapping for script type: {0}")]
    UnknownNamespace(String),

    /// Native name whose prefix has no mapping
    #[error("No namespace mapping for native type: {0}")]
    UnknownType(String),
}

#[derive(Debug, Default)]
struct NamespaceTable {
    namespaces_to_prefixes: FxHashMap<String, String>,
    prefixes_to_namespaces: FxHashMap<String, String>,
}

/// Bidirectional namespace mapper
#[derive(Debug, Default)]
pub struct NamespaceMapper {
    table: RwLock<NamespaceTable>,
}

impl NamespaceMapper {
    /// Create an empty mapper
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a namespace ↔ prefix mapping.
    ///
    /// Registering an identical mapping again is a no-op.
    pub fn register(&self, namespace: &str, prefix: &str) -> Result<(), NamespaceError> {
        validate_namespace(namespace)?;
        validate_prefix(prefix)?;

        let mut table = self.table.write();
        if let Some(existing) = table.namespaces_to_prefixes.get(namespace) {
            if existing == prefix {
                return Ok(());
            }
            return Err(NamespaceError::Conflict {
                namespace: namespace.to_string(),
                existing: existing.clone(),
                requested: prefix.to_string(),
            });
        }
        if let Some(existing) = table.prefixes_to_namespaces.get(prefix) {
            return Err(NamespaceError::PrefixTaken {
                prefix: prefix.to_string(),
                existing: existing.clone(),
            });
        }

        table
            .namespaces_to_prefixes
            .insert(namespace.to_string(), prefix.to_string());
        table
            .prefixes_to_namespaces
            .insert(prefix.to_string(), namespace.to_string());
        tracing::debug!(namespace, prefix, "registered namespace mapping");
        Ok(())
    }

    /// Resolve a script-qualified type name to its native name
    pub fn resolve_native_name(&self, script_name: &str) -> Result<String, NamespaceError> {
        let (namespace, local) = script_name
            .rsplit_once(SCRIPT_PATH_SEPARATOR)
            .filter(|(ns, local)| !ns.is_empty() && !local.is_empty())
            .ok_or_else(|| NamespaceError::UnknownNamespace(script_name.to_string()))?;

        let table = self.table.read();
        let prefix = table
            .namespaces_to_prefixes
            .get(namespace)
            .ok_or_else(|| NamespaceError::UnknownNamespace(script_name.to_string()))?;
        Ok(format!("{}{}{}", prefix, NATIVE_PATH_SEPARATOR, local))
    }

    /// Resolve a native type name to its script-qualified name.
    ///
    /// The longest registered prefix wins.
    pub fn resolve_script_name(&self, native_name: &str) -> Result<String, NamespaceError> {
        let table = self.table.read();
        table
            .prefixes_to_namespaces
            .iter()
            .filter_map(|(prefix, namespace)| {
                let local = native_name
                    .strip_prefix(prefix.as_str())?
                    .strip_prefix(NATIVE_PATH_SEPARATOR)?;
                (!local.is_empty()).then_some((prefix.len(), namespace, local))
            })
            .max_by_key(|(len, _, _)| *len)
            .map(|(_, namespace, local)| format!("{}{}{}", namespace, SCRIPT_PATH_SEPARATOR, local))
            .ok_or_else(|| NamespaceError::UnknownType(native_name.to_string()))
    }

    /// All registered (namespace, prefix) pairs
    pub fn mappings(&self) -> Vec<(String, String)> {
        let table = self.table.read();
        let mut pairs: Vec<_> = table
            .namespaces_to_prefixes
            .iter()
            .map(|(ns, prefix)| (ns.clone(), prefix.clone()))
            .collect();
        pairs.sort();
        pairs
    }
}

fn validate_namespace(namespace: &str) -> Result<(), NamespaceError> {
    if namespace.is_empty() || namespace.split(SCRIPT_PATH_SEPARATOR).any(str::is_empty) {
        return Err(NamespaceError::Invalid(format!(
            "script namespace '{}' must be non-empty dotted segments",
            namespace
        )));
    }
    Ok(())
}

fn validate_prefix(prefix: &str) -> Result<(), NamespaceError> {
    if prefix.is_empty() || prefix.split(NATIVE_PATH_SEPARATOR).any(str::is_empty) {
        return Err(NamespaceError::Invalid(format!(
            "native prefix '{}' must be non-empty '::' separated segments",
            prefix
        )));
    }
    Ok(())
}

// ============================================================================
// Member Names
// ============================================================================

/// Convert a script member name (camelCase) to its native name (snake_case)
pub fn native_member_name(script_name: &str) -> String {
    let mut out = String::with_capacity(script_name.len() + 4);
    for (i, c) in script_name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a native member name (snake_case) to its script name (camelCase)
pub fn script_member_name(native_name: &str) -> String {
    let mut out = String::with_capacity(native_name.len());
    let mut upper_next = false;
    for c in native_name.chars() {
        if c == '_' && !out.is_empty() {
            upper_next = true;
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
