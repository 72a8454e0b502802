//! Host-adapter request envelope
//!
//! A host adapter decodes its wire frames into [`BridgeRequest`] and hands
//! them to [`Bridge::dispatch`](crate::Bridge::dispatch). The JSON form is
//! tagged by `"method"`:
//!
//! ```json
//! {"method": "invokeMethod", "instance": {"type": "Acme.Widget", "handle": 3},
//!  "methodName": "resize", "arguments": [640, 480]}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};
use crate::ScriptValue;

/// One script call routed through the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum BridgeRequest {
    /// Read a static property
    GetStaticProperty {
        /// Script-qualified type name
        #[serde(rename = "type")]
        type_name: String,
        /// Property name
        property: String,
    },

    /// Write a static property
    SetStaticProperty {
        /// Script-qualified type name
        #[serde(rename = "type")]
        type_name: String,
        /// Property name
        property: String,
        /// New value
        #[serde(default)]
        value: ScriptValue,
    },

    /// Call a static method
    InvokeStaticMethod {
        /// Script-qualified type name
        #[serde(rename = "type")]
        type_name: String,
        /// Method name
        #[serde(rename = "methodName")]
        method: String,
        /// Script arguments
        #[serde(default)]
        arguments: Vec<ScriptValue>,
    },

    /// Attach a listener to a static event
    AddStaticEventListener {
        /// Script-qualified type name
        #[serde(rename = "type")]
        type_name: String,
        /// Event name
        event: String,
        /// Listener identity
        listener: String,
    },

    /// Detach a listener from a static event
    RemoveStaticEventListener {
        /// Script-qualified type name
        #[serde(rename = "type")]
        type_name: String,
        /// Event name
        event: String,
        /// Listener identity
        listener: String,
    },

    /// Construct an instance
    CreateInstance {
        /// Script-qualified type name
        #[serde(rename = "type")]
        type_name: String,
        /// Constructor arguments
        #[serde(default)]
        arguments: Vec<ScriptValue>,
    },

    /// Release an instance handle
    ReleaseInstance {
        /// Instance handle
        instance: ScriptValue,
    },

    /// Read an instance property
    GetProperty {
        /// Instance handle
        instance: ScriptValue,
        /// Property name
        property: String,
    },

    /// Write an instance property
    SetProperty {
        /// Instance handle
        instance: ScriptValue,
        /// Property name
        property: String,
        /// New value
        #[serde(default)]
        value: ScriptValue,
    },

    /// Call an instance method
    InvokeMethod {
        /// Instance handle
        instance: ScriptValue,
        /// Method name
        #[serde(rename = "methodName")]
        method: String,
        /// Script arguments
        #[serde(default)]
        arguments: Vec<ScriptValue>,
    },

    /// Attach a listener to an instance event
    AddEventListener {
        /// Instance handle
        instance: ScriptValue,
        /// Event name
        event: String,
        /// Listener identity
        listener: String,
    },

    /// Detach a listener from an instance event
    RemoveEventListener {
        /// Instance handle
        instance: ScriptValue,
        /// Event name
        event: String,
        /// Listener identity
        listener: String,
    },
}

impl BridgeRequest {
    /// Decode a request from its script form
    pub fn from_script(value: ScriptValue) -> BridgeResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| BridgeError::invalid(format!("Malformed request: {}", e)))
    }

    /// Decode a request from JSON text
    pub fn parse(text: &str) -> BridgeResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| BridgeError::invalid(format!("Malformed request: {}", e)))
    }

    /// Wire name of the call type
    pub fn method_name(&self) -> &'static str {
        match self {
            BridgeRequest::GetStaticProperty { .. } => "getStaticProperty",
            BridgeRequest::SetStaticProperty { .. } => "setStaticProperty",
            BridgeRequest::InvokeStaticMethod { .. } => "invokeStaticMethod",
            BridgeRequest::AddStaticEventListener { .. } => "addStaticEventListener",
            BridgeRequest::RemoveStaticEventListener { .. } => "removeStaticEventListener",
            BridgeRequest::CreateInstance { .. } => "createInstance",
            BridgeRequest::ReleaseInstance { .. } => "releaseInstance",
            BridgeRequest::GetProperty { .. } => "getProperty",
            BridgeRequest::SetProperty { .. } => "setProperty",
            BridgeRequest::InvokeMethod { .. } => "invokeMethod",
            BridgeRequest::AddEventListener { .. } => "addEventListener",
            BridgeRequest::RemoveEventListener { .. } => "removeEventListener",
        }
    }
}
