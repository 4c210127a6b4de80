//! Seams shared by the crate's watchers and peer models.

use std::sync::Arc;

/// A watcher that arms background listeners after construction.
///
/// The supplicant watcher implements this: building it is cheap and
/// infallible, while `start_monitoring` is where the bus-name and
/// hostnamed subscriptions actually happen and can fail. Keeping the two
/// steps apart lets `setup()` report subscription errors to the caller
/// instead of burying them in a constructor.
pub trait ServiceMonitoring {
    /// Error produced while arming the listeners.
    type Error;

    /// Subscribes the watcher's signal sources and spawns its tasks.
    ///
    /// # Errors
    /// Returns error if a subscription could not be established; already
    /// spawned tasks keep running.
    #[allow(async_fn_in_trait)]
    async fn start_monitoring(&self) -> Result<(), Self::Error>;
}

/// A model fetched from the supplicant, either once or kept live.
///
/// [`NetworkDevice`](crate::core::device::NetworkDevice) implements this:
/// `get` reads the peer's properties at one point in time, `get_live`
/// additionally arms a property monitor so the returned handle tracks the
/// peer until its cancellation token fires. The registry only ever holds
/// live models; snapshots are for one-shot queries.
pub trait Reactive {
    /// Error produced while fetching or arming the monitor.
    type Error;
    /// What a one-shot fetch needs (connection and object path).
    type Context<'a>;
    /// What a live fetch needs on top (cancellation, notifier).
    type LiveContext<'a>;

    /// Reads the model once, without monitoring.
    ///
    /// # Errors
    /// Returns error if the remote object is gone or the bus call fails.
    #[allow(async_fn_in_trait)]
    async fn get(context: Self::Context<'_>) -> Result<Self, Self::Error>
    where
        Self: Sized;

    /// Reads the model and keeps it updated until cancelled.
    ///
    /// # Errors
    /// Returns error if the remote object is gone or the bus call fails.
    #[allow(async_fn_in_trait)]
    async fn get_live(context: Self::LiveContext<'_>) -> Result<Arc<Self>, Self::Error>
    where
        Self: Sized;
}
