use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{net::TcpStream, sync::watch};

use crate::CONTENT_CHECK_TIMEOUT_SECS;

#[async_trait]
pub trait ReachabilityCheck: Send + Sync {
    /// `Err` means the check itself could not run; the last known state stays.
    async fn check(&self) -> Result<bool, String>;
}

/// Reachability by opening a TCP connection to the content host.
pub struct TcpReachability {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpReachability {
    pub fn for_url(url: &reqwest::Url, timeout: Duration) -> Result<Self, String> {
        let host = url
            .host_str()
            .ok_or_else(|| format!("URL has no host: {url}"))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| format!("URL has no port: {url}"))?;
        Ok(Self {
            host,
            port,
            timeout,
        })
    }
}

#[async_trait]
impl ReachabilityCheck for TcpReachability {
    async fn check(&self) -> Result<bool, String> {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(error)) => {
                log::debug!("[Net] {}:{} unreachable: {error}", self.host, self.port);
                Ok(false)
            }
            Err(_) => Ok(false),
        }
    }
}

/// Polls a reachability check and publishes the latest online flag. Starts optimistic (`true`).
pub struct ConnectivityMonitor {
    checker: Arc<dyn ReachabilityCheck>,
    interval: Duration,
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(checker: Arc<dyn ReachabilityCheck>, interval: Duration) -> Self {
        let (state, _) = watch::channel(true);
        Self {
            checker,
            interval,
            state,
        }
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Returns the subscription and the polling future. The caller spawns the
    /// future; dropping the subscription ends it.
    pub fn mount(
        self: &Arc<Self>,
    ) -> (ConnectivitySubscription, impl Future<Output = ()> + Send + 'static) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let subscription = ConnectivitySubscription {
            stop: stop_tx,
            online: self.state.subscribe(),
        };
        let monitor = Arc::clone(self);
        (subscription, async move { monitor.run(stop_rx).await })
    }

    async fn run(&self, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        log::debug!("[Net] connectivity polling every {:?}", self.interval);

        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => self.poll_once().await,
            }
        }
        log::debug!("[Net] connectivity polling stopped");
    }

    async fn poll_once(&self) {
        match self.checker.check().await {
            Ok(online) => {
                self.state.send_if_modified(|current| {
                    if *current == online {
                        return false;
                    }
                    log::info!("[Net] online={online}");
                    *current = online;
                    true
                });
            }
            Err(error) => {
                log::debug!(
                    "[Net] connectivity check failed, keeping online={}: {error}",
                    self.is_online()
                );
            }
        }
    }
}

/// Live connectivity feed; polling stops when this is dropped.
pub struct ConnectivitySubscription {
    stop: watch::Sender<bool>,
    online: watch::Receiver<bool>,
}

impl ConnectivitySubscription {
    pub fn receiver(&self) -> watch::Receiver<bool> {
        self.online.clone()
    }
}

impl Drop for ConnectivitySubscription {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}

/// Requests the content document once. Only transport failures count as a
/// failed load; any HTTP status means the page rendered something.
pub async fn check_content(
    client: &reqwest::Client,
    url: &reqwest::Url,
    user_agent: &str,
) -> Result<(), String> {
    client
        .get(url.clone())
        .header(reqwest::header::USER_AGENT, user_agent)
        .timeout(Duration::from_secs(CONTENT_CHECK_TIMEOUT_SECS))
        .send()
        .await
        .map(|response| {
            log::debug!("[Render] content check HTTP {}", response.status().as_u16());
        })
        .map_err(|error| format!("Content request failed: {error}"))
}
