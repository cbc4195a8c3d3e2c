//! A priority-ordered, panic-isolated event callback registry.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

use serde_json::Value;
use tracing::warn;

/// Lifecycle events hooks can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Fired immediately before a tool call executes.
    ToolBeforeExecute,
    /// Fired immediately after a tool call executes (whether it succeeded
    /// or failed).
    ToolAfterExecute,
    /// Fired once, when a tool is registered with the server.
    ToolRegistered,
    /// Fired when a project becomes the active one.
    ProjectActivated,
    /// Fired when the server's operating mode changes.
    ModeChanged,
}

/// Mutable context threaded through a chain of hooks for one event.
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    /// Free-form key/value data hooks can read and write.
    pub data: HashMap<String, Value>,
}

impl HookContext {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

type Callback = Box<dyn Fn(HookContext) -> HookContext + Send + Sync>;

/// A single registered hook.
pub struct Hook {
    /// The hook's callback.
    callback: Callback,
    /// Lower runs first; ties preserve registration order (a stable sort).
    pub priority: i32,
    /// A human-readable name, used in logs when a hook panics.
    pub name: String,
    /// Disabled hooks are skipped without being removed.
    pub enabled: bool,
}

impl Hook {
    /// Creates an enabled hook.
    #[must_use]
    pub fn new(name: impl Into<String>, priority: i32, callback: impl Fn(HookContext) -> HookContext + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            priority,
            name: name.into(),
            enabled: true,
        }
    }
}

/// Registry of hooks, keyed by the event they fire on plus a global list
/// that runs for every event.
#[derive(Default)]
pub struct HookRegistry {
    global: Mutex<Vec<Hook>>,
    by_event: Mutex<HashMap<HookEvent, Vec<Hook>>>,
}

impl HookRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook that fires for every event.
    pub fn register_global(&self, hook: Hook) {
        self.global.lock().unwrap().push(hook);
    }

    /// Registers a hook that fires only for `event`.
    pub fn register(&self, event: HookEvent, hook: Hook) {
        self.by_event.lock().unwrap().entry(event).or_default().push(hook);
    }

    /// Runs every enabled hook for `event` (global hooks plus this event's
    /// own), in ascending priority order (registration order preserved for
    /// ties), threading `context` through the chain.
    ///
    /// A panicking hook is caught, logged, and skipped — it does not abort
    /// the remaining chain or poison the registry.
    pub fn trigger(&self, event: HookEvent, mut context: HookContext) -> HookContext {
        let global = self.global.lock().unwrap();
        let by_event = self.by_event.lock().unwrap();

        let mut ordered: Vec<&Hook> = global.iter().collect();
        if let Some(specific) = by_event.get(&event) {
            ordered.extend(specific.iter());
        }
        ordered.sort_by_key(|h| h.priority);

        for hook in ordered {
            if !hook.enabled {
                continue;
            }
            let name = hook.name.clone();
            let callback = &hook.callback;
            match catch_unwind(AssertUnwindSafe(|| callback(context.clone()))) {
                Ok(next) => context = next,
                Err(_) => {
                    warn!(hook = %name, "hook panicked, skipping");
                }
            }
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hooks_run_in_priority_order() {
        let registry = HookRegistry::new();
        registry.register(
            HookEvent::ToolBeforeExecute,
            Hook::new("second", 10, |mut ctx| {
                ctx.data.insert("order".to_string(), Value::String("second".to_string()));
                ctx
            }),
        );
        registry.register(
            HookEvent::ToolBeforeExecute,
            Hook::new("first", 0, |mut ctx| {
                ctx.data.insert("order".to_string(), Value::String("first-then-second".to_string()));
                ctx
            }),
        );
        let result = registry.trigger(HookEvent::ToolBeforeExecute, HookContext::new());
        assert_eq!(
            result.data.get("order").and_then(Value::as_str),
            Some("second")
        );
    }

    #[test]
    fn test_panicking_hook_does_not_abort_chain() {
        let registry = HookRegistry::new();
        registry.register(
            HookEvent::ToolBeforeExecute,
            Hook::new("boom", 0, |_ctx| panic!("deliberate")),
        );
        registry.register(
            HookEvent::ToolBeforeExecute,
            Hook::new("survivor", 1, |mut ctx| {
                ctx.data.insert("ran".to_string(), Value::Bool(true));
                ctx
            }),
        );
        let result = registry.trigger(HookEvent::ToolBeforeExecute, HookContext::new());
        assert_eq!(result.data.get("ran"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_disabled_hook_is_skipped() {
        let registry = HookRegistry::new();
        let mut hook = Hook::new("disabled", 0, |mut ctx| {
            ctx.data.insert("ran".to_string(), Value::Bool(true));
            ctx
        });
        hook.enabled = false;
        registry.register(HookEvent::ToolBeforeExecute, hook);
        let result = registry.trigger(HookEvent::ToolBeforeExecute, HookContext::new());
        assert!(result.data.get("ran").is_none());
    }
}
