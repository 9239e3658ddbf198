use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::level_filters::LevelFilter;
use tracing::Level;

use crate::error::StoreError;
use crate::store::Store;

/// Value of an [`Attr`]: either a plain JSON value or a nested group.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Value(Value),
    Group(Vec<Attr>),
}

/// A key/value attribute attached to a log record.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub key: String,
    pub value: AttrValue,
}

impl Attr {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Attr {
            key: key.into(),
            value: AttrValue::Value(value.into()),
        }
    }

    pub fn group(key: impl Into<String>, attrs: Vec<Attr>) -> Self {
        Attr {
            key: key.into(),
            value: AttrValue::Group(attrs),
        }
    }
}

/// A leveled event as produced by the logging front end.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub level: Level,
    pub message: String,
    pub attrs: Vec<Attr>,
}

impl Record {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Record {
            level,
            message: message.into(),
            attrs: Vec::new(),
        }
    }

    pub fn with_attr(mut self, attr: Attr) -> Self {
        self.attrs.push(attr);
        self
    }
}

/// Writes [`Record`]s into a [`Store`], with their attributes as context.
///
/// Attributes are flattened into a single JSON object: nested groups
/// become dotted keys (`http.status`). Handlers derived with
/// [`with_attrs`](StoreHandler::with_attrs) and
/// [`with_group`](StoreHandler::with_group) share the store and the
/// scratch map of the handler they came from.
#[derive(Clone)]
pub struct StoreHandler {
    store: Arc<Store>,
    level: LevelFilter,
    bound: Vec<(String, Value)>,
    groups: Vec<String>,
    scratch: Arc<Mutex<Map<String, Value>>>,
}

impl StoreHandler {
    /// Handler that accepts `DEBUG` and more severe records.
    pub fn new(store: Arc<Store>) -> Self {
        StoreHandler {
            store,
            level: LevelFilter::DEBUG,
            bound: Vec::new(),
            groups: Vec::new(),
            scratch: Arc::new(Mutex::new(Map::new())),
        }
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn enabled(&self, level: &Level) -> bool {
        *level <= self.level
    }

    /// New handler that adds `attrs` to every record it handles.
    ///
    /// The attributes are qualified by the groups open at this point.
    pub fn with_attrs(&self, attrs: Vec<Attr>) -> Self {
        let mut derived = self.clone();
        let prefix = self.prefix();
        for attr in &attrs {
            flatten_into(&prefix, attr, &mut |key: String, value: Value| {
                derived.bound.push((key, value))
            });
        }
        derived
    }

    /// New handler whose later attributes are nested under `name`.
    ///
    /// An empty name leaves the handler unchanged.
    pub fn with_group(&self, name: impl Into<String>) -> Self {
        let mut derived = self.clone();
        let name = name.into();
        if !name.is_empty() {
            derived.groups.push(name);
        }
        derived
    }

    /// Persist `record` through the matching `*_with_context` store call.
    ///
    /// Level mapping: `TRACE`→trace, `DEBUG`→debug, `INFO`→info,
    /// `WARN`→warning, `ERROR`→error, anything else→fatal.
    pub async fn handle(&self, record: Record) -> Result<(), StoreError> {
        let context = self.compute_attrs(&record);
        let message = record.message.as_str();

        if record.level == Level::TRACE {
            self.store.trace_with_context(message, &context).await
        } else if record.level == Level::DEBUG {
            self.store.debug_with_context(message, &context).await
        } else if record.level == Level::INFO {
            self.store.info_with_context(message, &context).await
        } else if record.level == Level::WARN {
            self.store.warning_with_context(message, &context).await
        } else if record.level == Level::ERROR {
            self.store.error_with_context(message, &context).await
        } else {
            self.store.fatal_with_context(message, &context).await
        }
    }

    fn prefix(&self) -> String {
        self.groups.iter().fold(String::new(), |mut acc, group| {
            acc.push_str(group);
            acc.push('.');
            acc
        })
    }

    fn compute_attrs(&self, record: &Record) -> Map<String, Value> {
        let mut scratch = self.scratch.lock().unwrap_or_else(PoisonError::into_inner);

        for (key, value) in &self.bound {
            scratch.insert(key.clone(), value.clone());
        }
        let prefix = self.prefix();
        for attr in &record.attrs {
            flatten_into(&prefix, attr, &mut |key: String, value: Value| {
                scratch.insert(key, value);
            });
        }

        std::mem::take(&mut *scratch)
    }
}

fn flatten_into(prefix: &str, attr: &Attr, emit: &mut dyn FnMut(String, Value)) {
    match &attr.value {
        AttrValue::Value(value) => emit(format!("{}{}", prefix, attr.key), value.clone()),
        // An unnamed group inlines its members.
        AttrValue::Group(members) if attr.key.is_empty() => {
            for member in members {
                flatten_into(prefix, member, emit);
            }
        }
        AttrValue::Group(members) => {
            let nested = format!("{}{}.", prefix, attr.key);
            for member in members {
                flatten_into(&nested, member, emit);
            }
        }
    }
}
