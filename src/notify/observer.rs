//! Observer-based notifications for configuration changes.

use crate::core::ConfigSnapshot;
use crate::error::ConfigError;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// A callback receiving the full configuration snapshot after every change.
pub type Observer = Arc<dyn Fn(&ConfigSnapshot) + Send + Sync>;

/// Ordered registry of configuration observers.
///
/// Observers are notified in registration order. The same callback may be
/// registered more than once; there is no removal.
///
/// # Examples
///
/// ```rust
/// use confwatch::core::ConfigSnapshot;
/// use confwatch::notify::ObserverRegistry;
///
/// let registry = ObserverRegistry::new();
/// registry.register(|snapshot: &ConfigSnapshot| {
///     println!("{} files loaded", snapshot.len());
/// });
///
/// let failures = registry.notify_all(&ConfigSnapshot::default());
/// assert!(failures.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    observers: Arc<RwLock<Vec<Observer>>>,
}

impl ObserverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observer and return the stored callback.
    pub fn register<F>(&self, callback: F) -> Observer
    where
        F: Fn(&ConfigSnapshot) + Send + Sync + 'static,
    {
        let observer: Observer = Arc::new(callback);
        self.observers.write().push(Arc::clone(&observer));
        observer
    }

    /// Call every observer, in registration order, with the same snapshot.
    ///
    /// A panicking observer does not stop the others. Each panic is logged and
    /// returned as a [`ConfigError::ObserverError`].
    pub fn notify_all(&self, snapshot: &ConfigSnapshot) -> Vec<ConfigError> {
        // Observers may register more observers; don't hold the lock while calling them.
        let observers = self.observers.read().clone();

        let mut failures = Vec::new();
        for (index, observer) in observers.iter().enumerate() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| observer(snapshot))) {
                let message = panic_message(payload.as_ref());
                error!(observer = index, "Configuration observer panicked: {}", message);
                failures.push(ConfigError::ObserverError(format!(
                    "observer #{index} panicked: {message}"
                )));
            }
        }
        failures
    }

    /// Get the number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// Whether no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
