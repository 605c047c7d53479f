use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::global::GlobalObject;
use crate::value::Value;

enum Bindings {
    Declarative(RwLock<AHashMap<String, Value>>),
    Object(Arc<GlobalObject>),
}

/// A link in the lexical scope chain.
pub struct Scope {
    bindings: Bindings,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    /// Top-level scope whose bindings are the global object's properties.
    pub fn global(global: Arc<GlobalObject>) -> Arc<Scope> {
        Arc::new(Scope {
            bindings: Bindings::Object(global),
            parent: None,
        })
    }

    pub fn declarative(parent: Arc<Scope>) -> Arc<Scope> {
        Arc::new(Scope {
            bindings: Bindings::Declarative(RwLock::new(AHashMap::new())),
            parent: Some(parent),
        })
    }

    pub fn parent(&self) -> Option<&Arc<Scope>> {
        self.parent.as_ref()
    }

    fn get_own(&self, name: &str) -> Option<Value> {
        match &self.bindings {
            Bindings::Declarative(vars) => vars.read().get(name).cloned(),
            Bindings::Object(global) => global.get(name),
        }
    }

    fn set_own_if_present(&self, name: &str, value: &Value) -> bool {
        match &self.bindings {
            Bindings::Declarative(vars) => match vars.write().get_mut(name) {
                Some(slot) => {
                    *slot = value.clone();
                    true
                }
                None => false,
            },
            Bindings::Object(global) => {
                if global.has(name) {
                    global.set(name, value.clone());
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Resolve `name` through the chain, innermost first.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(value) = current.get_own(name) {
                return Some(value);
            }
            scope = current.parent.as_deref();
        }
        None
    }

    /// Assign to the nearest existing binding. Returns false when `name` is
    /// not bound anywhere on the chain.
    pub fn assign(&self, name: &str, value: &Value) -> bool {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if current.set_own_if_present(name, value) {
                return true;
            }
            scope = current.parent.as_deref();
        }
        false
    }

    /// Bind `name` in this scope, replacing any existing binding.
    pub fn define(&self, name: &str, value: Value) {
        match &self.bindings {
            Bindings::Declarative(vars) => {
                vars.write().insert(name.to_string(), value);
            }
            Bindings::Object(global) => global.set(name, value),
        }
    }

    /// `var` semantics: bind `name` to `undefined` in this scope unless it
    /// is already bound here.
    pub fn declare(&self, name: &str) {
        match &self.bindings {
            Bindings::Declarative(vars) => {
                vars.write()
                    .entry(name.to_string())
                    .or_insert(Value::Undefined);
            }
            Bindings::Object(global) => global.declare(name),
        }
    }

    /// The global object at the root of the chain, if the chain has one.
    pub fn global_object(&self) -> Option<&Arc<GlobalObject>> {
        let mut scope = self;
        loop {
            match (&scope.bindings, &scope.parent) {
                (Bindings::Object(global), _) => return Some(global),
                (Bindings::Declarative(_), Some(parent)) => scope = parent,
                (Bindings::Declarative(_), None) => return None,
            }
        }
    }
}
