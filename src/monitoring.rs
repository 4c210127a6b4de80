//! Lifecycle watchers: supplicant bus-name presence and hostnamed state.
//!
//! The watcher never touches connection state itself; it reports
//! appearances, disappearances and hostname changes to the session, which
//! promotes or tears down the supplicant link accordingly.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use zbus::{Connection, fdo::DBusProxy, names::BusName};

use crate::{
    error::Error,
    proxy::hostname::HostnameProxy,
    session::events::SessionEvent,
    traits::ServiceMonitoring,
    types::{SUPPLICANT_SERVICE, device::Chassis},
};

pub(crate) struct SupplicantWatcher {
    zbus_connection: Connection,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    cancellation_token: CancellationToken,
}

impl SupplicantWatcher {
    pub(crate) fn new(
        zbus_connection: Connection,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            zbus_connection,
            events_tx,
            cancellation_token,
        }
    }
}

impl ServiceMonitoring for SupplicantWatcher {
    type Error = Error;

    async fn start_monitoring(&self) -> Result<(), Self::Error> {
        monitor_supplicant_name(self).await?;
        monitor_hostname(self).await
    }
}

async fn monitor_supplicant_name(watcher: &SupplicantWatcher) -> Result<(), Error> {
    let dbus_proxy = DBusProxy::new(&watcher.zbus_connection).await?;

    let mut name_owner_changed = match dbus_proxy.receive_name_owner_changed().await {
        Ok(stream) => stream,
        Err(error) => {
            warn!(error = %error, "cannot subscribe to NameOwnerChanged");
            return Ok(());
        }
    };

    let supplicant = BusName::try_from(SUPPLICANT_SERVICE).map_err(zbus::Error::from)?;
    let already_present = dbus_proxy
        .name_has_owner(supplicant.clone())
        .await
        .unwrap_or(false);
    if already_present {
        let _ = watcher.events_tx.send(SessionEvent::ServiceAppeared);
    }

    let cancellation_token = watcher.cancellation_token.clone();
    let events_tx = watcher.events_tx.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    debug!("supplicant name monitoring cancelled");
                    return;
                }
                Some(signal) = name_owner_changed.next() => {
                    let Ok(args) = signal.args() else {
                        continue;
                    };
                    if args.name != supplicant {
                        continue;
                    }

                    let event = if args.new_owner.is_some() {
                        SessionEvent::ServiceAppeared
                    } else {
                        SessionEvent::ServiceVanished
                    };
                    let _ = events_tx.send(event);
                }
            }
        }
    });

    Ok(())
}

async fn monitor_hostname(watcher: &SupplicantWatcher) -> Result<(), Error> {
    let hostname_proxy = match HostnameProxy::new(&watcher.zbus_connection).await {
        Ok(proxy) => proxy,
        Err(error) => {
            warn!(error = %error, "hostnamed unavailable; device name will stay empty");
            return Ok(());
        }
    };

    let (hostname, chassis) = current_hostname(&hostname_proxy).await;
    let _ = watcher
        .events_tx
        .send(SessionEvent::HostnameChanged { hostname, chassis });

    let cancellation_token = watcher.cancellation_token.clone();
    let events_tx = watcher.events_tx.clone();

    tokio::spawn(async move {
        let mut hostname_changed = hostname_proxy.receive_hostname_changed().await;
        let mut pretty_changed = hostname_proxy.receive_pretty_hostname_changed().await;
        let mut static_changed = hostname_proxy.receive_static_hostname_changed().await;
        let mut chassis_changed = hostname_proxy.receive_chassis_changed().await;

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    debug!("hostname monitoring cancelled");
                    return;
                }
                Some(_) = hostname_changed.next() => {
                    send_hostname(&hostname_proxy, &events_tx).await;
                }
                Some(_) = pretty_changed.next() => {
                    send_hostname(&hostname_proxy, &events_tx).await;
                }
                Some(_) = static_changed.next() => {
                    send_hostname(&hostname_proxy, &events_tx).await;
                }
                Some(_) = chassis_changed.next() => {
                    send_hostname(&hostname_proxy, &events_tx).await;
                }
                else => {
                    debug!("hostname property streams ended");
                    return;
                }
            }
        }
    });

    Ok(())
}

async fn send_hostname(
    proxy: &HostnameProxy<'_>,
    events_tx: &mpsc::UnboundedSender<SessionEvent>,
) {
    let (hostname, chassis) = current_hostname(proxy).await;
    let _ = events_tx.send(SessionEvent::HostnameChanged { hostname, chassis });
}

/// Pretty hostname first, then static, then transient.
async fn current_hostname(proxy: &HostnameProxy<'_>) -> (String, Chassis) {
    let (pretty, static_name, transient, chassis) = tokio::join!(
        proxy.pretty_hostname(),
        proxy.static_hostname(),
        proxy.hostname(),
        proxy.chassis(),
    );

    let hostname = [pretty, static_name, transient]
        .into_iter()
        .flatten()
        .find(|name| !name.is_empty())
        .unwrap_or_default();

    let chassis = chassis.unwrap_or_else(|error| {
        warn!(error = %error, "cannot fetch chassis");
        String::new()
    });

    (hostname, Chassis::from(chassis.as_str()))
}
