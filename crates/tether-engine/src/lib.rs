//! Tether Bridge Engine
//!
//! This crate lets script code call into native types registered through
//! `tether-sdk`:
//! - **Namespaces**: script namespace ↔ native prefix mapping (`namespace` module)
//! - **Marshalling**: script values ↔ native values (`marshal` module)
//! - **Invocation**: member selection and calling conventions (`invoke` module)
//! - **Instances**: handle-addressed live objects (`instances` module)
//! - **Events**: script listeners on native events (`events` module)
//! - **Bridge**: the script-facing operation set (`bridge` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_engine::{Bridge, BridgeConfig, Reply};
//!
//! let bridge = Bridge::with_config(&BridgeConfig::parse(CONFIG)?)?;
//! bridge.register_type(widgets::widget_type())?;
//!
//! let widget = bridge.create_instance("Acme.Widgets.Widget", &[json!("main")])?;
//! bridge.invoke_method(
//!     &widget.to_script(),
//!     "resize",
//!     &[json!(640), json!(480)],
//!     Reply::new(|value| println!("resized: {}", value), |e| eprintln!("{}", e)),
//! )?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Script ↔ native call bridge
pub mod bridge;

/// Registered type descriptors
pub mod catalog;

/// Bridge configuration
pub mod config;

/// Error taxonomy
pub mod error;

/// Native event subscriptions
pub mod events;

/// Live instances
pub mod instances;

/// Member selection and invocation
pub mod invoke;

/// Value conversion
pub mod marshal;

/// Namespace mapping
pub mod namespace;

/// Host request envelope
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

/// Script-side value: the JSON-compatible form every value takes in script code
pub type ScriptValue = serde_json::Value;

pub use bridge::{Bridge, EventSink};
pub use catalog::TypeCatalog;
pub use config::{BridgeConfig, ConfigError, NamespaceMapping};
pub use error::{BridgeError, BridgeResult, ErrorCode};
pub use events::{EventBridge, EventSender, Listener, ListenerFn, ListenerToken, SENDER_KEY};
pub use instances::{InstanceHandle, InstanceNotFound, InstanceRegistry};
pub use invoke::{InvocationResolver, Reply, ResolvedInvocation};
pub use marshal::{MarshalError, MarshalResult, Marshaller, HANDLE_KEY, TYPE_KEY, VALUE_KEY};
pub use namespace::{native_member_name, script_member_name, NamespaceError, NamespaceMapper};
pub use request::BridgeRequest;

pub use tether_sdk as sdk;
