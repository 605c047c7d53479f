use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use raptorc_config::RuntimeConfig;
use tracing::{trace, warn};

use crate::error::{ErrorKind, RuntimeError};
use crate::global::GlobalObject;
use crate::scope::Scope;
use crate::value::Value;

/// A global object plus the limits scripts run under.
pub struct Runtime {
    global: Arc<GlobalObject>,
    config: RuntimeConfig,
    depth: AtomicUsize,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            global: Arc::new(GlobalObject::new()),
            config,
            depth: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn global_object(&self) -> &Arc<GlobalObject> {
        &self.global
    }

    /// A fresh top-level scope over this runtime's global object.
    pub fn create_global_scope(&self) -> Arc<Scope> {
        Scope::global(Arc::clone(&self.global))
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.global.get(name)
    }

    pub fn global_snapshot(&self) -> BTreeMap<String, String> {
        self.global.snapshot()
    }

    pub(crate) fn enter_call(&self) -> Result<CallGuard<'_>, RuntimeError> {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = CallGuard { runtime: self };
        if depth > self.config.max_call_depth {
            warn!(limit = self.config.max_call_depth, "call depth limit reached");
            return Err(RuntimeError::new(
                ErrorKind::RangeError,
                "Maximum call stack size exceeded",
            ));
        }
        Ok(guard)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // Closures in globals capture a scope over the global object.
        trace!(globals = self.global.len(), "releasing runtime globals");
        self.global.clear();
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("globals", &self.global.len())
            .field("config", &self.config)
            .finish()
    }
}

pub(crate) struct CallGuard<'a> {
    runtime: &'a Runtime,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.runtime.depth.fetch_sub(1, Ordering::SeqCst);
    }
}
