use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use super::traits::HandlerError;
use crate::formatters::SharedFormatter;
use crate::proto::{ResponseMeta, SharedProtocol};

use super::registry::WeakRegistry;

/// Identifier of one category of operation the registry can route
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventKey(pub u32);

impl EventKey {
    pub const LIST_GAMES: EventKey = EventKey(0);
    pub const GAME: EventKey = EventKey(1);
    pub const LIST_CATEGORY: EventKey = EventKey(2);
    pub const CATEGORY: EventKey = EventKey(3);
    pub const SUB_CATEGORY: EventKey = EventKey(4);
    pub const ADDON: EventKey = EventKey(5);
    pub const ADDON_SEARCH: EventKey = EventKey(6);
    pub const ADDON_DESC: EventKey = EventKey(7);
    pub const ADDON_LIST_FILE: EventKey = EventKey(8);
    pub const ADDON_FILE: EventKey = EventKey(9);
    pub const FILE_DESCRIPTION: EventKey = EventKey(10);

    /// Keys every registry knows about from construction
    pub const BUILTIN: [EventKey; 11] = [
        Self::LIST_GAMES,
        Self::GAME,
        Self::LIST_CATEGORY,
        Self::CATEGORY,
        Self::SUB_CATEGORY,
        Self::ADDON,
        Self::ADDON_SEARCH,
        Self::ADDON_DESC,
        Self::ADDON_LIST_FILE,
        Self::ADDON_FILE,
        Self::FILE_DESCRIPTION,
    ];

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl From<u32> for EventKey {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Arguments passed through the registry to a handler, or stored
/// alongside a callback
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub named: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a named argument
    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Set a named argument from any serializable value
    pub fn named_serialized<T: Serialize>(
        mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self, HandlerError> {
        let value = serde_json::to_value(value)
            .map_err(|e| HandlerError::InvalidArguments(e.to_string()))?;
        self.named.insert(name.into(), value);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Decode the positional argument at `index`
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, HandlerError> {
        let value = self.positional.get(index).ok_or_else(|| {
            HandlerError::InvalidArguments(format!("missing positional argument {index}"))
        })?;

        serde_json::from_value(value.clone()).map_err(|e| {
            HandlerError::InvalidArguments(format!("argument {index}: {e}"))
        })
    }

    /// Decode a named argument, `None` when absent or null
    pub fn get_named<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, HandlerError> {
        match self.named.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| HandlerError::InvalidArguments(format!("argument '{name}': {e}"))),
        }
    }
}

/// Passive data holder produced by handlers
///
/// The capabilities are optional: the registry calls them on every record
/// it returns from a dispatch, and the default implementations ignore them.
pub trait Record: Any + fmt::Debug + Send + Sync {
    /// Weak back-reference to the registry that produced this record
    fn attach_registry(&mut self, _registry: WeakRegistry) {}

    /// Default formatter configured on the registry
    fn attach_formatter(&mut self, _formatter: SharedFormatter) {}

    /// Metadata about the request that produced this record
    fn attach_meta(&mut self, _meta: &ResponseMeta) {}

    /// Protocol of the handler family, for records that fetch files later
    fn attach_protocol(&mut self, _protocol: &SharedProtocol) {}
}

impl dyn Record {
    pub fn is<T: Record>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }

    pub fn downcast_ref<T: Record>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }

    pub fn downcast<T: Record>(self: Box<Self>) -> Result<Box<T>, Box<dyn Record>> {
        if self.is::<T>() {
            let any: Box<dyn Any> = self;
            // Checked above
            Ok(any.downcast::<T>().unwrap_or_else(|_| unreachable!()))
        } else {
            Err(self)
        }
    }
}

/// Result of one dispatch
#[derive(Debug, Default)]
pub enum Outcome {
    /// What the no-op handler produces
    #[default]
    Empty,
    Record(Box<dyn Record>),
    Records(Vec<Box<dyn Record>>),
    Value(Value),
}

impl Outcome {
    pub fn record(record: impl Record) -> Self {
        Outcome::Record(Box::new(record))
    }

    pub fn records<T: Record>(records: impl IntoIterator<Item = T>) -> Self {
        Outcome::Records(
            records
                .into_iter()
                .map(|r| Box::new(r) as Box<dyn Record>)
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Outcome::Empty)
    }

    /// Short name of the variant, for error messages and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Empty => "empty",
            Outcome::Record(_) => "record",
            Outcome::Records(_) => "records",
            Outcome::Value(_) => "value",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Outcome::Empty => 0,
            Outcome::Record(_) | Outcome::Value(_) => 1,
            Outcome::Records(records) => records.len(),
        }
    }

    /// Visit every record held by this outcome
    pub fn for_each_record_mut(&mut self, mut f: impl FnMut(&mut dyn Record)) {
        match self {
            Outcome::Record(record) => f(record.as_mut()),
            Outcome::Records(records) => {
                for record in records.iter_mut() {
                    f(record.as_mut());
                }
            }
            Outcome::Empty | Outcome::Value(_) => {}
        }
    }

    pub fn as_record<T: Record>(&self) -> Option<&T> {
        match self {
            Outcome::Record(record) => record.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Take the single record out as `T`
    ///
    /// `Ok(None)` for an empty outcome; the outcome is handed back when it
    /// holds anything else.
    pub fn into_record<T: Record>(self) -> Result<Option<T>, Outcome> {
        match self {
            Outcome::Empty => Ok(None),
            Outcome::Record(record) => match record.downcast::<T>() {
                Ok(record) => Ok(Some(*record)),
                Err(record) => Err(Outcome::Record(record)),
            },
            other => Err(other),
        }
    }

    /// Take every record out as `T`; empty outcomes give an empty list
    pub fn into_records<T: Record>(self) -> Result<Vec<T>, Outcome> {
        match self {
            Outcome::Empty => Ok(Vec::new()),
            Outcome::Record(record) => match record.downcast::<T>() {
                Ok(record) => Ok(vec![*record]),
                Err(record) => Err(Outcome::Record(record)),
            },
            Outcome::Records(records) => {
                if records.iter().all(|r| r.is::<T>()) {
                    Ok(records
                        .into_iter()
                        .filter_map(|r| r.downcast::<T>().ok())
                        .map(|r| *r)
                        .collect())
                } else {
                    Err(Outcome::Records(records))
                }
            }
            other => Err(other),
        }
    }
}
