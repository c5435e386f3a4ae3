//! Connectivity monitoring.
//!
//! Raw platform signals are noisy: interfaces flap, captive portals report a
//! link with no route. [`NetworkMonitor`] only publishes a state once it has
//! been stable for the debounce window, and only publishes `Online` after a
//! [`ConnectivityProbe`] confirms the backend is actually reachable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const PROBE_TIMEOUT_SECS: u64 = 4;

/// Published connectivity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkState {
    Online,
    Offline,
}

impl NetworkState {
    #[must_use]
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for NetworkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confirms that a transport to the backend actually exists.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Probe that issues a `HEAD` request; any HTTP response counts as reachable.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = normalize_text_option(Some(url.into()))
            .filter(|url| is_http_url(url))
            .ok_or_else(|| {
                Error::InvalidInput("health URL must include http:// or https://".to_string())
            })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()
            .map_err(|error| Error::InvalidInput(format!("Failed to construct HTTP client: {error}")))?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn is_reachable(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(_) => true,
            Err(error) => {
                tracing::debug!("Connectivity probe to {} failed: {error}", self.url);
                false
            }
        }
    }
}

/// Probe with a fixed, switchable answer.
#[derive(Debug, Default)]
pub struct StaticProbe {
    online: AtomicBool,
}

impl StaticProbe {
    #[must_use]
    pub const fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn is_reachable(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Debounced, probe-confirmed connectivity state.
pub struct NetworkMonitor {
    probe: Arc<dyn ConnectivityProbe>,
    debounce: Duration,
    state: watch::Sender<NetworkState>,
}

impl NetworkMonitor {
    /// Create a monitor that starts `Offline` until told otherwise.
    pub fn new(probe: Arc<dyn ConnectivityProbe>, debounce: Duration) -> Self {
        let (state, _) = watch::channel(NetworkState::Offline);
        Self {
            probe,
            debounce,
            state,
        }
    }

    #[must_use]
    pub fn current(&self) -> NetworkState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    /// Subscribe to published transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.state.subscribe()
    }

    /// Probe immediately, bypassing the debounce window.
    pub async fn check_now(&self) -> NetworkState {
        let state = if self.probe.is_reachable().await {
            NetworkState::Online
        } else {
            NetworkState::Offline
        };
        self.publish(state);
        state
    }

    /// Consume raw platform signals until the sender is dropped.
    ///
    /// Every signal restarts the debounce window; the last signal seen once
    /// the window elapses quietly is the one acted on.
    pub async fn run(&self, mut signals: mpsc::Receiver<NetworkState>) {
        while let Some(mut candidate) = signals.recv().await {
            let closed = loop {
                match tokio::time::timeout(self.debounce, signals.recv()).await {
                    Ok(Some(signal)) => candidate = signal,
                    Ok(None) => break true,
                    Err(_) => break false,
                }
            };

            self.settle(candidate).await;
            if closed {
                break;
            }
        }
        tracing::debug!("Network signal source closed");
    }

    async fn settle(&self, signal: NetworkState) {
        match signal {
            NetworkState::Offline => self.publish(NetworkState::Offline),
            NetworkState::Online => {
                if self.probe.is_reachable().await {
                    self.publish(NetworkState::Online);
                } else {
                    tracing::debug!("Link reported up but backend is unreachable");
                    self.publish(NetworkState::Offline);
                }
            }
        }
    }

    fn publish(&self, next: NetworkState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            tracing::info!("Connectivity changed: {next:?}");
        }
    }
}

impl std::fmt::Debug for NetworkMonitor {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("NetworkMonitor")
            .field("state", &self.current())
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(online: bool, debounce_ms: u64) -> (Arc<StaticProbe>, NetworkMonitor) {
        let probe = Arc::new(StaticProbe::new(online));
        let monitor = NetworkMonitor::new(probe.clone(), Duration::from_millis(debounce_ms));
        (probe, monitor)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn check_now_publishes_probe_result() {
        let (probe, monitor) = monitor(true, 10);
        assert_eq!(monitor.current(), NetworkState::Offline);

        assert_eq!(monitor.check_now().await, NetworkState::Online);
        assert!(monitor.is_online());

        probe.set_online(false);
        assert_eq!(monitor.check_now().await, NetworkState::Offline);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn flapping_signals_settle_on_last_value() {
        let (_probe, monitor) = monitor(true, 50);
        let mut updates = monitor.subscribe();
        let (tx, rx) = mpsc::channel(8);

        for signal in [
            NetworkState::Online,
            NetworkState::Offline,
            NetworkState::Online,
        ] {
            tx.send(signal).await.unwrap();
        }
        drop(tx);

        monitor.run(rx).await;

        assert!(updates.has_changed().unwrap());
        assert_eq!(*updates.borrow_and_update(), NetworkState::Online);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transient_offline_is_never_published() {
        let (_probe, monitor) = monitor(true, 50);
        monitor.check_now().await;
        let updates = monitor.subscribe();
        let (tx, rx) = mpsc::channel(8);

        tx.send(NetworkState::Offline).await.unwrap();
        tx.send(NetworkState::Online).await.unwrap();
        drop(tx);

        monitor.run(rx).await;

        assert!(!updates.has_changed().unwrap());
        assert!(monitor.is_online());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn online_signal_requires_reachable_backend() {
        let (_probe, monitor) = monitor(false, 10);
        let (tx, rx) = mpsc::channel(8);

        tx.send(NetworkState::Online).await.unwrap();
        drop(tx);

        monitor.run(rx).await;
        assert_eq!(monitor.current(), NetworkState::Offline);
    }
}
