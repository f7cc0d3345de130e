//! Observable Feedback
//!
//! Reactive values using `tokio::sync::watch` for multi-subscriber notifications.
//! Every mutable attribute a driver exposes (mute, volume level, hook state, online
//! status, ...) is an `Observable` so the host can bind to it without polling.
//!
//! # Example
//!
//! ```rust,ignore
//! let muted = Observable::new("muted", false).with_description("Mic 1 mute");
//!
//! let mut rx = muted.subscribe();
//! tokio::spawn(async move {
//!     while rx.changed().await.is_ok() {
//!         println!("muted: {}", *rx.borrow());
//!     }
//! });
//!
//! muted.set(true);
//! ```

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;

/// Metadata for an observable value.
#[derive(Debug, Clone, Default)]
pub struct ObservableMetadata {
    /// Value name (unique within its owner).
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
}

/// A value that notifies subscribers whenever it is written.
///
/// Clones share the same channel and metadata. `set` always notifies, even when
/// the new value equals the old one.
pub struct Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The watch channel sender (holds current value)
    sender: watch::Sender<T>,
    metadata: Arc<RwLock<ObservableMetadata>>,
}

impl<T: Clone + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("name", &self.metadata.read().name)
            .field("value", &*self.sender.borrow())
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

impl<T> Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new observable with an initial value.
    pub fn new(name: impl Into<String>, initial_value: T) -> Self {
        let (sender, _) = watch::channel(initial_value);
        Self {
            sender,
            metadata: Arc::new(RwLock::new(ObservableMetadata {
                name: name.into(),
                description: None,
            })),
        }
    }

    /// Add a description to this observable.
    pub fn with_description(self, description: impl Into<String>) -> Self {
        self.metadata.write().description = Some(description.into());
        self
    }

    /// Get the current value (clone).
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Get the value name.
    pub fn name(&self) -> String {
        self.metadata.read().name.clone()
    }

    /// Snapshot of name and description.
    pub fn metadata(&self) -> ObservableMetadata {
        self.metadata.read().clone()
    }

    /// Set a new value, notifying all subscribers.
    pub fn set(&self, value: T) {
        self.sender.send_replace(value);
    }

    /// Modify the value in place, notifying all subscribers.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        self.sender.send_modify(f);
    }

    /// Subscribe to value changes.
    ///
    /// ```rust,ignore
    /// let mut rx = observable.subscribe();
    /// while rx.changed().await.is_ok() {
    ///     let value = rx.borrow().clone();
    /// }
    /// ```
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observable_basic() {
        let obs = Observable::new("volume_level", 0u16);
        assert_eq!(obs.get(), 0);
        assert_eq!(obs.name(), "volume_level");

        obs.set(42_020);
        assert_eq!(obs.get(), 42_020);
    }

    #[test]
    fn test_observable_description() {
        let obs = Observable::new("muted", false).with_description("Mic 1 mute");
        assert_eq!(obs.metadata().description.as_deref(), Some("Mic 1 mute"));
    }

    #[test]
    fn test_clones_share_value() {
        let obs = Observable::new("dial_string", String::new());
        let other = obs.clone();
        other.update(|s| s.push('5'));
        assert_eq!(obs.get(), "5");
    }

    #[tokio::test]
    async fn test_observable_subscription() {
        let obs = Observable::new("off_hook", false);
        let mut rx = obs.subscribe();

        obs.set(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_same_value_still_notifies() {
        let obs = Observable::new("muted", true);
        let mut rx = obs.subscribe();
        rx.mark_unchanged();

        obs.set(true);
        assert!(rx.has_changed().unwrap());
    }
}
