//! Observer Hooks
//!
//! Callbacks invoked with the cache key on hit, miss, dedupe and error.

use std::fmt;
use std::sync::Arc;

/// Callback receiving the cache key of the event.
pub type Hook = Arc<dyn Fn(&str) + Send + Sync>;

/// Optional observers; return values are not consumed.
#[derive(Clone, Default)]
pub struct Hooks {
    pub on_hit: Option<Hook>,
    pub on_miss: Option<Hook>,
    pub on_dedupe: Option<Hook>,
    pub on_error: Option<Hook>,
}

impl Hooks {
    pub fn hit(&self, key: &str) {
        Self::emit(&self.on_hit, key);
    }

    pub fn miss(&self, key: &str) {
        Self::emit(&self.on_miss, key);
    }

    pub fn dedupe(&self, key: &str) {
        Self::emit(&self.on_dedupe, key);
    }

    pub fn error(&self, key: &str) {
        Self::emit(&self.on_error, key);
    }

    fn emit(hook: &Option<Hook>, key: &str) {
        if let Some(hook) = hook {
            hook(key);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_hit", &self.on_hit.is_some())
            .field("on_miss", &self.on_miss.is_some())
            .field("on_dedupe", &self.on_dedupe.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_only_registered_hooks_fire() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hooks = Hooks {
            on_hit: Some(Arc::new(move |key: &str| {
                sink.lock().unwrap().push(key.to_string())
            })),
            ..Default::default()
        };

        hooks.hit("k1");
        hooks.miss("k2");
        hooks.error("k3");

        assert_eq!(*seen.lock().unwrap(), vec!["k1".to_string()]);
    }
}
