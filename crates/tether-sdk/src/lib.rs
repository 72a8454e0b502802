//! Tether SDK - Lightweight SDK for describing native types
//!
//! This crate provides the types a native plugin needs to expose classes,
//! enumerations and events to script code without depending on the full
//! tether-engine.
//!
//! # Example
//!
//! ```ignore
//! use tether_sdk::{CallConvention, MethodDef, TypeBuilder, TypeRef};
//!
//! let logger = TypeBuilder::class("app::Logger")
//!     .method(
//!         MethodDef::new("log")
//!             .as_static()
//!             .param(TypeRef::String)
//!             .convention(CallConvention::THEN_CATCH)
//!             .body(|call| {
//!                 let text: String = call.arg(0)?;
//!                 let done = call.take_completer();
//!                 std::thread::spawn(move || {
//!                     write_log(&text);
//!                     if let Some(done) = done {
//!                         done.complete(());
//!                     }
//!                 });
//!                 Ok(().into())
//!             }),
//!     )
//!     .build();
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod call;
pub mod convert;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod types;
pub mod value;

pub use builder::{EventDef, MethodDef, PropertyDef, TypeBuilder};
pub use call::{CompletionHandle, Completer, NativeCall, NativeFn};
pub use convert::FromNative;
pub use descriptor::{
    CallConvention, CompletionStyle, EnumDescriptor, EventDescriptor, MemberDescriptor,
    MemberKind, SubscribeFn, TypeDescriptor, UnsubscribeFn, NATIVE_PATH_SEPARATOR,
};
pub use error::{NativeError, NativeResult};
pub use event::{EventHandler, EventSource, SubscriptionToken};
pub use types::TypeRef;
pub use value::{EnumValue, NativeValue, ObjectRef};
