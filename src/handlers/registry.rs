use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use thiserror::Error;
use tracing::{debug, warn};

use super::default::NullHandler;
use super::traits::{HandlerContext, HandlerError, SharedHandler};
use super::types::{CallArgs, EventKey, Outcome};
use crate::formatters::SharedFormatter;
use crate::observability::DispatchMetrics;
use crate::proto::{ProtocolError, SharedProtocol};

pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid handler: {0}")]
    InvalidHandlerKind(String),

    #[error("unknown event: {0}")]
    UnknownEvent(EventKey),

    #[error(
        "protocol mismatch for family '{family}': pool holds '{existing}', handler expects '{offered}'"
    )]
    ProtocolMismatch {
        family: String,
        existing: &'static str,
        offered: &'static str,
    },

    #[error("protocol setup failed: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("handler for event {key} failed: {source}")]
    Handler {
        key: EventKey,
        #[source]
        source: HandlerError,
    },

    #[error("callback #{index} for event {key} failed: {source}")]
    Callback {
        key: EventKey,
        index: usize,
        #[source]
        source: CallbackError,
    },
}

/// Function fired after a dispatch, with the outcome and its stored arguments
///
/// Equality is identity: two `Callback`s are equal when they are clones of
/// the same original.
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(&Outcome, &CallArgs) -> Result<(), CallbackError> + Send + Sync>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Outcome, &CallArgs) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    fn call(&self, outcome: &Outcome, args: &CallArgs) -> Result<(), CallbackError> {
        (self.0)(outcome, args)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Callback {}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// One group of a batch load
pub enum HandlerGroup {
    /// Position in the list is the event key
    Sequence(Vec<SharedHandler>),
    /// Explicit key to handler mapping
    Mapping(BTreeMap<EventKey, SharedHandler>),
}

impl From<Vec<SharedHandler>> for HandlerGroup {
    fn from(handlers: Vec<SharedHandler>) -> Self {
        HandlerGroup::Sequence(handlers)
    }
}

impl From<BTreeMap<EventKey, SharedHandler>> for HandlerGroup {
    fn from(handlers: BTreeMap<EventKey, SharedHandler>) -> Self {
        HandlerGroup::Mapping(handlers)
    }
}

/// Which group wins when several supply a handler for one key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchOrder {
    /// Earlier groups pre-empt later ones
    #[default]
    FirstWins,
    /// Later groups override earlier ones
    LastWins,
}

#[derive(Clone)]
struct Binding {
    handler: SharedHandler,
    context: HandlerContext,
}

#[derive(Clone)]
struct CallbackEntry {
    callback: Callback,
    args: CallArgs,
}

struct RegistryState {
    bindings: BTreeMap<EventKey, Binding>,
    protocols: HashMap<String, SharedProtocol>,
    callbacks: HashMap<EventKey, Vec<CallbackEntry>>,
    formatter: Option<SharedFormatter>,
}

struct Shared {
    state: RwLock<RegistryState>,
    null: SharedHandler,
    metrics: DispatchMetrics,
}

/// Registry mapping event keys to handler instances
///
/// Cloning is cheap and yields another handle to the same registry. Every
/// key of the registry's domain is always bound: keys without an explicit
/// handler hold a shared [`NullHandler`], so dispatching a known key never
/// fails for lack of a handler.
///
/// The internal lock is never held while a handler, notification or
/// callback runs; handlers and records may call back into the registry.
#[derive(Clone)]
pub struct HandlerRegistry {
    shared: Arc<Shared>,
}

/// Non-owning back-reference to a [`HandlerRegistry`]
#[derive(Clone, Default)]
pub struct WeakRegistry(Weak<Shared>);

impl WeakRegistry {
    pub fn upgrade(&self) -> Option<HandlerRegistry> {
        self.0.upgrade().map(|shared| HandlerRegistry { shared })
    }
}

impl fmt::Debug for WeakRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.0.strong_count() > 0 {
            "attached"
        } else {
            "detached"
        };
        f.debug_tuple("WeakRegistry").field(&state).finish()
    }
}

impl HandlerRegistry {
    /// Registry whose domain is the built-in event keys
    pub fn new() -> Self {
        Self::with_keys(EventKey::BUILTIN)
    }

    /// Registry whose domain starts as `keys`
    pub fn with_keys(keys: impl IntoIterator<Item = EventKey>) -> Self {
        let null: SharedHandler = Arc::new(NullHandler::new());

        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let registry = WeakRegistry(weak.clone());
            let bindings = keys
                .into_iter()
                .map(|key| (key, placeholder(&null, key, &registry)))
                .collect();

            Shared {
                state: RwLock::new(RegistryState {
                    bindings,
                    protocols: HashMap::new(),
                    callbacks: HashMap::new(),
                    formatter: None,
                }),
                null: null.clone(),
                metrics: DispatchMetrics::new(),
            }
        });

        Self { shared }
    }

    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Arc::downgrade(&self.shared))
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.shared.metrics
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.shared
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.shared
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Every legal event key, in order
    pub fn keys(&self) -> Vec<EventKey> {
        self.read().bindings.keys().copied().collect()
    }

    pub fn contains_key(&self, key: EventKey) -> bool {
        self.read().bindings.contains_key(&key)
    }

    /// Handler currently bound to `key`
    pub fn get_handler(&self, key: EventKey) -> Result<SharedHandler, RegistryError> {
        self.read()
            .bindings
            .get(&key)
            .map(|binding| binding.handler.clone())
            .ok_or(RegistryError::UnknownEvent(key))
    }

    /// Whether `key` holds a real handler rather than the no-op default
    pub fn has_handler(&self, key: EventKey) -> bool {
        self.read()
            .bindings
            .get(&key)
            .is_some_and(|binding| !binding.handler.is_placeholder())
    }

    /// Shared protocol registered for `family`
    pub fn protocol(&self, family: &str) -> Option<SharedProtocol> {
        self.read().protocols.get(family).cloned()
    }

    /// Bind `handler` to `key`, or to the key it declares itself
    ///
    /// The previous occupant is stopped and the new handler started. Fails
    /// without touching the registry when no key can be resolved, the
    /// family name is empty, or the family's shared protocol is of another
    /// kind than the handler expects.
    pub fn register(
        &self,
        handler: SharedHandler,
        key: Option<EventKey>,
    ) -> Result<(), RegistryError> {
        let family = handler.family().to_string();
        if family.is_empty() {
            return Err(RegistryError::InvalidHandlerKind(
                "handler declares an empty family name".to_string(),
            ));
        }

        let key = key.or_else(|| handler.key()).ok_or_else(|| {
            RegistryError::InvalidHandlerKind(format!(
                "handler in family '{family}' declares no event key"
            ))
        })?;

        let existing = self.protocol(&family);
        if let Some(existing) = &existing {
            check_kind(&family, existing, handler.protocol_kind())?;
        }

        // Built outside the lock: the factory may call back into the registry
        let offered = match existing {
            Some(_) => None,
            None => handler.make_protocol()?,
        };

        let (previous, context) = {
            let mut state = self.write();

            // The pool may have changed while the lock was released
            let protocol = match state.protocols.get(&family).cloned() {
                Some(shared) => {
                    check_kind(&family, &shared, handler.protocol_kind())?;
                    Some(shared)
                }
                None => {
                    if let Some(protocol) = &offered {
                        state.protocols.insert(family.clone(), protocol.clone());
                    }
                    offered
                }
            };

            let context = HandlerContext::new(key, family.clone(), protocol, self.downgrade());
            let previous = state.bindings.insert(
                key,
                Binding {
                    handler: handler.clone(),
                    context: context.clone(),
                },
            );

            (previous, context)
        };

        if let Some(previous) = previous {
            previous.handler.on_stop(&previous.context);
        }

        debug!(%key, family = %family, "Handler registered");
        handler.on_start(&context);

        Ok(())
    }

    /// Stop the handler bound to `key` and restore the no-op default
    ///
    /// Returns `false` when there was nothing to remove.
    pub fn unregister(&self, key: EventKey) -> bool {
        let previous = {
            let mut state = self.write();
            let Some(binding) = state.bindings.get_mut(&key) else {
                return false;
            };
            if binding.handler.is_placeholder() {
                return false;
            }

            std::mem::replace(
                binding,
                placeholder(&self.shared.null, key, &self.downgrade()),
            )
        };

        previous.handler.on_stop(&previous.context);
        debug!(%key, family = previous.context.family(), "Handler unregistered");

        true
    }

    /// Register many handlers at once, resolving duplicate keys by priority
    ///
    /// Groups are normalized into one ordered list of (key, handler) pairs.
    /// With [`BatchOrder::FirstWins`] the first group supplying a key claims
    /// it and later handlers for that key are discarded. Placeholder handlers
    /// never claim a key, which lets lower-priority groups fill the gap.
    ///
    /// Returns the number of handlers registered.
    pub fn register_batch<G>(&self, groups: G, order: BatchOrder) -> Result<usize, RegistryError>
    where
        G: IntoIterator,
        G::Item: Into<HandlerGroup>,
    {
        let mut groups: Vec<HandlerGroup> = groups.into_iter().map(Into::into).collect();
        if order == BatchOrder::LastWins {
            groups.reverse();
        }

        let mut claimed = HashSet::new();
        let mut winners = Vec::new();

        for (key, handler) in normalize(groups)? {
            if handler.is_placeholder() || !claimed.insert(key) {
                continue;
            }
            winners.push((key, handler));
        }

        let count = winners.len();
        for (key, handler) in winners {
            self.register(handler, Some(key))?;
        }

        debug!(count, ?order, "Handler batch loaded");
        Ok(count)
    }

    /// Route a call for `key` to its handler
    ///
    /// Records in the outcome receive a weak back-reference to this registry
    /// and the default formatter, when one is set. Callbacks bound to `key`
    /// then run in insertion order; the first one that fails stops the rest
    /// and its error is returned.
    pub async fn dispatch(&self, key: EventKey, args: CallArgs) -> Result<Outcome, RegistryError> {
        let (binding, callbacks, formatter) = {
            let state = self.read();
            let binding = state
                .bindings
                .get(&key)
                .cloned()
                .ok_or(RegistryError::UnknownEvent(key))?;
            let callbacks = state.callbacks.get(&key).cloned().unwrap_or_default();
            (binding, callbacks, state.formatter.clone())
        };

        debug!(%key, family = binding.context.family(), "Dispatching");

        let mut outcome = match binding.handler.handle(&binding.context, args).await {
            Ok(outcome) => outcome,
            Err(source) => {
                self.shared.metrics.dispatch_failed();
                warn!(%key, error = %source, "Handler failed");
                return Err(RegistryError::Handler { key, source });
            }
        };
        self.shared.metrics.dispatched();

        let registry = self.downgrade();
        outcome.for_each_record_mut(|record| {
            record.attach_registry(registry.clone());
            if let Some(formatter) = &formatter {
                record.attach_formatter(formatter.clone());
            }
        });

        for (index, entry) in callbacks.iter().enumerate() {
            entry
                .callback
                .call(&outcome, &entry.args)
                .map_err(|source| RegistryError::Callback { key, index, source })?;
            self.shared.metrics.callback_fired();
        }

        Ok(outcome)
    }

    /// Append `callback` to the callbacks fired after dispatches to `key`
    ///
    /// The same callback may be bound several times with different arguments.
    pub fn bind_callback(&self, key: EventKey, callback: Callback, args: CallArgs) -> Callback {
        self.write()
            .callbacks
            .entry(key)
            .or_default()
            .push(CallbackEntry {
                callback: callback.clone(),
                args,
            });
        callback
    }

    /// Remove callbacks bound to `key`, all of them or only those equal to
    /// `matching`; returns how many were removed
    pub fn clear_callback(&self, key: EventKey, matching: Option<&Callback>) -> usize {
        let mut state = self.write();
        let Some(entries) = state.callbacks.get_mut(&key) else {
            return 0;
        };

        let before = entries.len();
        match matching {
            Some(callback) => entries.retain(|entry| &entry.callback != callback),
            None => entries.clear(),
        }
        let removed = before - entries.len();

        if entries.is_empty() {
            state.callbacks.remove(&key);
        }

        removed
    }

    pub fn callback_count(&self, key: EventKey) -> usize {
        self.read().callbacks.get(&key).map_or(0, Vec::len)
    }

    /// Formatter attached to every record returned from a dispatch
    pub fn set_default_formatter(&self, formatter: Option<SharedFormatter>) {
        self.write().formatter = formatter;
    }

    pub fn default_formatter(&self) -> Option<SharedFormatter> {
        self.read().formatter.clone()
    }

    /// Return to the freshly built state
    ///
    /// Every key keeps existing but is bound to the no-op handler again;
    /// callbacks, shared protocols and the default formatter are dropped.
    /// Removed handlers are not stopped.
    pub fn reset(&self) {
        let registry = self.downgrade();
        let mut state = self.write();

        let keys: Vec<EventKey> = state.bindings.keys().copied().collect();
        state.bindings = keys
            .into_iter()
            .map(|key| (key, placeholder(&self.shared.null, key, &registry)))
            .collect();
        state.protocols.clear();
        state.callbacks.clear();
        state.formatter = None;

        debug!("Registry reset");
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        let bound: BTreeSet<EventKey> = state
            .bindings
            .iter()
            .filter(|(_, binding)| !binding.handler.is_placeholder())
            .map(|(key, _)| *key)
            .collect();

        f.debug_struct("HandlerRegistry")
            .field("keys", &state.bindings.len())
            .field("bound", &bound)
            .field("families", &state.protocols.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn check_kind(
    family: &str,
    existing: &SharedProtocol,
    offered: Option<&'static str>,
) -> Result<(), RegistryError> {
    match offered {
        Some(offered) if existing.kind() != offered => Err(RegistryError::ProtocolMismatch {
            family: family.to_string(),
            existing: existing.kind(),
            offered,
        }),
        _ => Ok(()),
    }
}

fn placeholder(null: &SharedHandler, key: EventKey, registry: &WeakRegistry) -> Binding {
    Binding {
        handler: null.clone(),
        context: HandlerContext::new(key, null.family(), None, registry.clone()),
    }
}

/// Flatten groups into ordered (key, handler) pairs
fn normalize(groups: Vec<HandlerGroup>) -> Result<Vec<(EventKey, SharedHandler)>, RegistryError> {
    let mut pairs = Vec::new();

    for group in groups {
        match group {
            HandlerGroup::Sequence(handlers) => {
                for (index, handler) in handlers.into_iter().enumerate() {
                    let key = u32::try_from(index).map_err(|_| {
                        RegistryError::InvalidHandlerKind(format!(
                            "sequence index {index} does not fit an event key"
                        ))
                    })?;
                    pairs.push((EventKey(key), handler));
                }
            }
            HandlerGroup::Mapping(handlers) => pairs.extend(handlers),
        }
    }

    Ok(pairs)
}
