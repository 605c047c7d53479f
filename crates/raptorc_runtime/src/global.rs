use std::collections::BTreeMap;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::value::Value;

/// The global namespace shared by every script run on one runtime.
#[derive(Default)]
pub struct GlobalObject {
    properties: RwLock<AHashMap<String, Value>>,
}

impl GlobalObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.properties.read().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.properties.read().contains_key(name)
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.properties.write().insert(name.into(), value);
    }

    /// Define `name` as `undefined` unless it already exists.
    pub fn declare(&self, name: &str) {
        let mut properties = self.properties.write();
        if !properties.contains_key(name) {
            properties.insert(name.to_string(), Value::Undefined);
        }
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.properties.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.properties.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every property rendered with [`Value::render`], ordered by name.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.properties
            .read()
            .iter()
            .map(|(name, value)| (name.clone(), value.render()))
            .collect()
    }

    /// Drop every property. Closures stored in globals capture the global
    /// scope, so this is what releases them.
    pub fn clear(&self) {
        let drained: Vec<Value> = self.properties.write().drain().map(|(_, v)| v).collect();
        drop(drained);
    }
}
