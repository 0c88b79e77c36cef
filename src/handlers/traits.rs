use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use super::registry::{HandlerRegistry, WeakRegistry};
use super::types::{CallArgs, EventKey, Outcome};
use crate::proto::{Protocol, ProtocolError, SharedProtocol};

/// Handler errors
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("operation not supported: {0}")]
    Unsupported(String),
    #[error("operation not implemented: {0}")]
    NotImplemented(String),
    #[error("handler raised on purpose")]
    Raised,
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("no protocol available for family '{0}'")]
    MissingProtocol(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<serde_json::Error> for HandlerError {
    fn from(value: serde_json::Error) -> Self {
        HandlerError::Decode(value.to_string())
    }
}

/// Everything a handler learns about where it is bound
///
/// Built by the registry at registration time and handed to the handler
/// on start, stop and every dispatch.
#[derive(Clone, Debug)]
pub struct HandlerContext {
    key: EventKey,
    family: String,
    protocol: Option<SharedProtocol>,
    registry: WeakRegistry,
}

impl HandlerContext {
    pub fn new(
        key: EventKey,
        family: impl Into<String>,
        protocol: Option<SharedProtocol>,
        registry: WeakRegistry,
    ) -> Self {
        Self {
            key,
            family: family.into(),
            protocol,
            registry,
        }
    }

    pub fn key(&self) -> EventKey {
        self.key
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn shared_protocol(&self) -> Option<&SharedProtocol> {
        self.protocol.as_ref()
    }

    /// Shared protocol of this handler's family, if it is a `P`
    pub fn protocol<P: Protocol>(&self) -> Option<&P> {
        self.protocol.as_deref()?.as_any().downcast_ref::<P>()
    }

    /// Like [`HandlerContext::protocol`], failing when the family has none
    pub fn require_protocol<P: Protocol>(&self) -> Result<&P, HandlerError> {
        self.protocol::<P>()
            .ok_or_else(|| HandlerError::MissingProtocol(self.family.clone()))
    }

    /// The registry this handler is bound to, while it is still alive
    pub fn registry(&self) -> Option<HandlerRegistry> {
        self.registry.upgrade()
    }
}

/// Pluggable unit implementing the behavior for one event key
///
/// Only [`Handler::family`] and [`Handler::handle`] are required. Handlers
/// that follow the staged convention implement [`Pipeline`] and forward
/// `handle` to [`run`].
#[async_trait]
pub trait Handler: Send + Sync {
    /// Key this handler binds to when registered without an override
    fn key(&self) -> Option<EventKey> {
        None
    }

    /// Grouping label; handlers of one family share a protocol instance
    fn family(&self) -> &str;

    /// Kind of protocol this handler expects to share, if any
    fn protocol_kind(&self) -> Option<&'static str> {
        None
    }

    /// Produce a protocol for the family when none exists yet
    fn make_protocol(&self) -> Result<Option<SharedProtocol>, ProtocolError> {
        Ok(None)
    }

    /// Placeholders never claim a key during batch loading
    fn is_placeholder(&self) -> bool {
        false
    }

    fn on_start(&self, _ctx: &HandlerContext) {}

    fn on_stop(&self, _ctx: &HandlerContext) {}

    async fn handle(&self, ctx: &HandlerContext, args: CallArgs) -> Result<Outcome, HandlerError>;
}

pub type SharedHandler = Arc<dyn Handler>;

/// Staged handler convention: acquire, decode, shape, finalize
///
/// Stages run strictly in that order with no retry.
#[async_trait]
pub trait Pipeline: Send + Sync {
    type Raw: Send;
    type Decoded: Send;

    /// Obtain the raw payload, usually through the shared protocol
    async fn acquire(&self, ctx: &HandlerContext, args: &CallArgs)
    -> Result<Self::Raw, HandlerError>;

    /// Turn the raw payload into a structured intermediate
    fn decode(&self, raw: Self::Raw) -> Result<Self::Decoded, HandlerError>;

    /// Turn the intermediate into the handler's result
    fn shape(&self, decoded: Self::Decoded) -> Result<Outcome, HandlerError>;

    /// Enrich the shaped result (metadata, timestamps)
    fn finalize(&self, _ctx: &HandlerContext, outcome: Outcome) -> Result<Outcome, HandlerError> {
        Ok(outcome)
    }
}

/// Run every stage of `pipeline` in order
pub async fn run<P>(
    pipeline: &P,
    ctx: &HandlerContext,
    args: &CallArgs,
) -> Result<Outcome, HandlerError>
where
    P: Pipeline + ?Sized,
{
    let raw = pipeline.acquire(ctx, args).await?;
    let decoded = pipeline.decode(raw)?;
    let shaped = pipeline.shape(decoded)?;
    pipeline.finalize(ctx, shaped)
}
