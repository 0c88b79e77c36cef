pub mod client;
pub mod config;
pub mod formatters;
pub mod handlers;
pub mod observability;
pub mod proto;
pub mod records;

pub use client::{ClientError, CurseClient};
pub use handlers::{CallArgs, EventKey, HandlerRegistry, Outcome};
