//! Feedback fields tagged by who may write them.
//!
//! [`Confirmed`] fields are set when the unit reports a value. The one local
//! write is [`Confirmed::retract`], which clears a report that a user action
//! has made stale (an answered or rejected call is no longer incoming).
//! [`Local`] fields are edited by user actions and never by inbound parsing.
//! Both expose the same read side, so hosts bind to them identically.

use dsp_core::observable::Observable;

/// A value the response pipeline sets, retracted locally only when an action
/// invalidates it.
pub struct Confirmed<T: Clone + Send + Sync + 'static>(Observable<T>);

/// A value only local user actions update.
pub struct Local<T: Clone + Send + Sync + 'static>(Observable<T>);

macro_rules! read_side {
    ($wrapper:ident) => {
        impl<T: Clone + Send + Sync + 'static> $wrapper<T> {
            pub fn new(name: impl Into<String>, initial: T) -> Self {
                Self(Observable::new(name, initial))
            }

            pub fn with_description(self, description: impl Into<String>) -> Self {
                Self(self.0.with_description(description))
            }

            pub fn get(&self) -> T {
                self.0.get()
            }

            pub fn subscribe(&self) -> tokio::sync::watch::Receiver<T> {
                self.0.subscribe()
            }

            pub fn observable(&self) -> &Observable<T> {
                &self.0
            }
        }

        impl<T: Clone + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for $wrapper<T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_tuple(stringify!($wrapper)).field(&self.0.get()).finish()
            }
        }
    };
}

read_side!(Confirmed);
read_side!(Local);

impl<T: Clone + Send + Sync + 'static> Confirmed<T> {
    /// Record a value reported by the unit.
    pub(crate) fn confirm(&self, value: T) {
        self.0.set(value);
    }

    /// Replace a reported value that a local action has made stale.
    pub(crate) fn retract(&self, value: T) {
        tracing::trace!(name = %self.0.name(), "reported value retracted");
        self.0.set(value);
    }
}

impl<T: Clone + Send + Sync + 'static> Local<T> {
    pub(crate) fn edit<F: FnOnce(&mut T)>(&self, f: F) {
        self.0.update(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmed_and_local() {
        let hook = Confirmed::new("off_hook", false);
        hook.confirm(true);
        assert!(hook.get());

        let dial = Local::new("dial_string", String::new());
        dial.edit(|s| s.push_str("555"));
        assert_eq!(dial.get(), "555");
        assert_eq!(dial.observable().name(), "dial_string");
    }

    #[tokio::test]
    async fn test_retract_notifies_subscribers() {
        let incoming = Confirmed::new("incoming_call", false);
        incoming.confirm(true);
        let mut rx = incoming.subscribe();
        rx.mark_unchanged();

        incoming.retract(false);
        assert!(rx.has_changed().unwrap());
        assert!(!incoming.get());
    }
}
