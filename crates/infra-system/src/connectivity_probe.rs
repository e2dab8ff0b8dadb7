// Connectivity probe
// Periodic TCP reachability check feeding the connectivity channel
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use nexus_core::application::ShutdownToken;
use nexus_core::port::ConnectivityPublisher;

const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(15);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Declares the device online when `target` accepts a TCP connection
pub struct TcpConnectivityProbe {
    publisher: ConnectivityPublisher,
    target: String,
    interval: Duration,
    timeout: Duration,
}

impl TcpConnectivityProbe {
    /// `target` is a `host:port` pair, e.g. `generativelanguage.googleapis.com:443`
    pub fn new(publisher: ConnectivityPublisher, target: impl Into<String>) -> Self {
        Self {
            publisher,
            target: target.into(),
            interval: DEFAULT_PROBE_INTERVAL,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// One reachability check (does not publish)
    pub async fn check(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(addr = %self.target, error = %e, "Connectivity probe failed");
                false
            }
            Err(_) => {
                debug!(addr = %self.target, "Connectivity probe timed out");
                false
            }
        }
    }

    /// Probe once and publish; returns the observed state
    pub async fn probe_once(&self) -> bool {
        let online = self.check().await;
        if self.publisher.set_online(online) {
            if online {
                info!(addr = %self.target, "Connectivity restored");
            } else {
                warn!(addr = %self.target, "Connectivity lost");
            }
        }
        online
    }

    /// Probe until shutdown
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            addr = %self.target,
            interval_secs = self.interval.as_secs(),
            "Connectivity probe started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    info!("Connectivity probe shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.probe_once().await;
                }
            }
        }
    }
}
