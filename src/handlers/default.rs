use async_trait::async_trait;

use super::traits::{Handler, HandlerContext, HandlerError};
use super::types::{CallArgs, EventKey, Outcome};

/// No-op handler bound to every key without an explicit handler
///
/// Ignores its arguments and returns [`Outcome::Empty`]. It is a
/// placeholder: batch loading lets any real handler take its key.
#[derive(Debug, Clone, Default)]
pub struct NullHandler {
    key: Option<EventKey>,
}

impl NullHandler {
    pub const FAMILY: &'static str = "null";

    pub fn new() -> Self {
        Self { key: None }
    }

    /// Null handler declaring `key`, for disabling one event explicitly
    pub fn for_key(key: EventKey) -> Self {
        Self { key: Some(key) }
    }
}

#[async_trait]
impl Handler for NullHandler {
    fn key(&self) -> Option<EventKey> {
        self.key
    }

    fn family(&self) -> &str {
        Self::FAMILY
    }

    fn is_placeholder(&self) -> bool {
        true
    }

    async fn handle(&self, _ctx: &HandlerContext, _args: CallArgs) -> Result<Outcome, HandlerError> {
        Ok(Outcome::Empty)
    }
}

/// Handler that always fails with [`HandlerError::Raised`]
///
/// A louder way to disable a feature than [`NullHandler`].
#[derive(Debug, Clone)]
pub struct RaiseHandler {
    key: EventKey,
}

impl RaiseHandler {
    pub const FAMILY: &'static str = "raise";

    pub fn new(key: EventKey) -> Self {
        Self { key }
    }
}

#[async_trait]
impl Handler for RaiseHandler {
    fn key(&self) -> Option<EventKey> {
        Some(self.key)
    }

    fn family(&self) -> &str {
        Self::FAMILY
    }

    async fn handle(&self, _ctx: &HandlerContext, _args: CallArgs) -> Result<Outcome, HandlerError> {
        Err(HandlerError::Raised)
    }
}
