//! Reactive cells backing the crate's observable state.
//!
//! Connection state in this crate is mutated in exactly one place (the
//! session task) but read from many: the service accessors, the peer
//! models in the registry, and whatever the embedding daemon watches. A
//! [`Property`] wraps a `tokio::sync::watch` channel so those readers can
//! either snapshot the value or stream every change, while writes that
//! don't alter the value stay silent — a peer re-reporting the same state
//! never wakes a watcher.

use std::fmt;

use futures::stream::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Boxed change stream, for holding watches of different properties in one
/// place.
pub type PropertyStream<T> = Box<dyn Stream<Item = T> + Send + Unpin>;

/// An observable value: snapshot with [`get`](Self::get), follow with
/// [`watch`](Self::watch).
///
/// Cloning a `Property` clones the handle, not the value; all clones see
/// the same cell. The session holds the writing clone of every property
/// the service exposes (`devices`, `scanning`, `running`, `capabilities`,
/// `local_address`) and of every field on a peer device.
#[derive(Clone)]
pub struct Property<T: Clone + Send + Sync + 'static> {
    tx: watch::Sender<T>,
    rx: watch::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> Property<T> {
    /// Creates a cell holding `initial`.
    #[doc(hidden)]
    pub fn new(initial: T) -> Self {
        let (tx, rx) = watch::channel(initial);
        Self { tx, rx }
    }

    /// Replaces the value; watchers wake only if it actually changed.
    #[doc(hidden)]
    pub fn set(&self, value: T)
    where
        T: PartialEq,
    {
        self.tx.send_if_modified(|current| {
            if *current == value {
                return false;
            }

            *current = value;
            true
        });
    }

    /// The value right now.
    pub fn get(&self) -> T {
        self.rx.borrow().clone()
    }

    /// A stream of values: the current one first, then one per change.
    pub fn watch(&self) -> impl Stream<Item = T> + Send + 'static {
        WatchStream::new(self.rx.clone())
    }
}

impl<T: Clone + Send + Sync + fmt::Debug + 'static> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Property({:?})", self.get())
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    #[test]
    fn get_reflects_the_latest_set() {
        let state = Property::new("idle");

        state.set("association");

        assert_eq!(state.get(), "association");
    }

    #[tokio::test]
    async fn watch_yields_current_then_changes() {
        let scanning = Property::new(false);
        let mut stream = scanning.watch();

        assert_eq!(stream.next().await, Some(false));

        scanning.set(true);

        assert_eq!(stream.next().await, Some(true));
    }

    #[tokio::test]
    async fn redundant_set_stays_silent() {
        let scanning = Property::new(false);
        let mut stream = scanning.watch();

        assert_eq!(stream.next().await, Some(false));

        scanning.set(false);

        let woke =
            tokio::time::timeout(tokio::time::Duration::from_millis(10), stream.next()).await;
        assert!(woke.is_err());
    }

    #[test]
    fn clones_share_the_cell() {
        let local = Property::new(Option::<u8>::None);
        let writer = local.clone();

        writer.set(Some(7));

        assert_eq!(local.get(), Some(7));
    }
}
