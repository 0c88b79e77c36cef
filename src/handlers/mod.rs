//! Handler registry and dispatcher
//!
//! Calls are routed by [`EventKey`] to pluggable [`Handler`]s held in a
//! [`HandlerRegistry`]. Handlers of one family share a protocol instance,
//! and callbacks bound to a key fire after every dispatch to it.
//!
//! ## Key Components
//!
//! - [`HandlerRegistry`] - Key to handler mapping, batch loading, dispatch
//! - [`Handler`] - Trait every handler implements
//! - [`Pipeline`] - Acquire / decode / shape / finalize convention
//! - [`NullHandler`], [`RaiseHandler`] - Built-in placeholder handlers
//! - [`curseforge`] - Handlers for the official CurseForge API
//! - [`cursetools`] - The same handlers pointed at the curse.tools mirror
//!
//! ## Example
//!
//! ```rust,ignore
//! use cursekit::handlers::{BatchOrder, CallArgs, EventKey, HandlerRegistry, curseforge};
//!
//! let registry = HandlerRegistry::new();
//! registry.register_batch([curseforge::handler_map(settings)], BatchOrder::FirstWins)?;
//!
//! let outcome = registry.dispatch(EventKey::ADDON, CallArgs::new().arg(238222)).await?;
//! ```

pub mod curseforge;
pub mod cursetools;
mod default;
mod registry;
mod traits;
pub(crate) mod types;

pub use default::{NullHandler, RaiseHandler};
pub use registry::{
    BatchOrder, Callback, CallbackError, HandlerGroup, HandlerRegistry, RegistryError,
    WeakRegistry,
};
pub use traits::{Handler, HandlerContext, HandlerError, Pipeline, SharedHandler, run};
pub use types::{CallArgs, EventKey, Outcome, Record};
