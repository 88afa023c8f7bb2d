//! Registration-token lifecycle around the push backend.
//!
//! The provider owns the only token cell in the process. Every operation is
//! best-effort: failures are logged, remembered in `last_error`, and turned
//! into `None`/`false`, never returned to the caller.
//!
//! Writes to the cell are fenced by an epoch taken when an operation starts.
//! A result is committed only if no later operation started in the meantime,
//! so overlapping refreshes settle on the most recently initiated one.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};

use crate::{
    core::redact_token, truncate_message, BackendEvent, InboundMessage, NavigationIntent,
    NotificationChannel, NotificationHost, Platform, PushBackend, TOKEN_UPLOAD_TIMEOUT_SECS,
};

pub struct TokenProvider {
    backend: Arc<dyn PushBackend>,
    notifier: Arc<dyn NotificationHost>,
    platform: Platform,
    uploader: Option<TokenUploader>,
    intents: Option<mpsc::UnboundedSender<NavigationIntent>>,
    token: watch::Sender<Option<String>>,
    latest_epoch: Mutex<u64>,
    /// Outcome of the latest permission request, for diagnostics only. Every
    /// request asks the platform again.
    last_permission_result: AtomicBool,
    initialized: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl TokenProvider {
    pub fn new(
        backend: Arc<dyn PushBackend>,
        notifier: Arc<dyn NotificationHost>,
        platform: Platform,
    ) -> Self {
        let (token, _) = watch::channel(None);
        Self {
            backend,
            notifier,
            platform,
            uploader: None,
            intents: None,
            token,
            latest_epoch: Mutex::new(0),
            last_permission_result: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub fn with_uploader(mut self, uploader: TokenUploader) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Navigation intents extracted from tapped notifications are sent here.
    pub fn with_intents(mut self, intents: mpsc::UnboundedSender<NavigationIntent>) -> Self {
        self.intents = Some(intents);
        self
    }

    pub fn current_token(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    pub fn watch_token(&self) -> watch::Receiver<Option<String>> {
        self.token.subscribe()
    }

    pub fn last_permission_result(&self) -> bool {
        self.last_permission_result.load(Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|guard| guard.clone())
    }

    pub fn subscribe_backend(&self) -> broadcast::Receiver<BackendEvent> {
        self.backend.subscribe()
    }

    pub async fn request_permission(&self) -> bool {
        let result = if self.platform == Platform::Ios {
            self.notifier
                .prompt_permission()
                .await
                .map(|status| status.is_granted())
        } else {
            match self.notifier.check_permission().await {
                Ok(status) if status.is_granted() => Ok(true),
                Ok(_) => self
                    .notifier
                    .prompt_permission()
                    .await
                    .map(|status| status.is_granted()),
                Err(error) => Err(error),
            }
        };

        match result {
            Ok(granted) => {
                log::info!("[Fcm] notification permission granted={granted}");
                self.last_permission_result.store(granted, Ordering::SeqCst);
                granted
            }
            Err(error) => {
                self.record_error(&format!("permission request failed: {error}"));
                self.last_permission_result.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// Cached token, or a single backend fetch when the cache is empty.
    pub async fn get_token(&self) -> Option<String> {
        if let Some(token) = self.current_token() {
            return Some(token);
        }
        self.fetch_and_store().await
    }

    /// Always fetches, replacing whatever is cached.
    pub async fn refresh_token(&self) -> Option<String> {
        self.fetch_and_store().await
    }

    /// Invalidates the token with the backend. The cache is cleared even when
    /// the backend call fails.
    pub async fn delete_token(&self) {
        let epoch = self.begin();
        match self.backend.delete_token().await {
            Ok(()) => log::info!("[Fcm] token deleted"),
            Err(error) => self.record_error(&format!("token deletion failed: {error}")),
        }
        self.commit(epoch, None);
    }

    /// Startup sequence. Returns whether push delivery is active afterwards.
    /// Permission denial stops the sequence early and is not an error.
    pub async fn initialize(&self) -> bool {
        if self.is_initialized() {
            log::debug!("[Fcm] already initialized");
            return true;
        }

        if let Err(error) = self.backend.ready().await {
            self.record_error(&format!("push backend not ready: {error}"));
            return false;
        }
        log::info!("[Fcm] push backend ready");

        if let Err(error) = self.notifier.set_badge_count(0).await {
            log::warn!("[Fcm] failed to reset badge count: {error}");
        }

        if self.platform.is_android() {
            if let Err(error) = self
                .notifier
                .ensure_channel(&NotificationChannel::default_channel())
                .await
            {
                log::warn!("[Fcm] failed to ensure default channel: {error}");
            }
        }

        if !self.request_permission().await {
            log::info!("[Fcm] notification permission denied; push disabled");
            return false;
        }

        if let Err(error) = self.backend.ensure_registered().await {
            log::warn!("[Fcm] device registration check failed (continuing): {error}");
        }
        if let Err(error) = self.backend.install_background_handler().await {
            log::warn!("[Fcm] failed to install background handler: {error}");
        }

        self.fetch_and_store().await;

        match self.backend.initial_notification().await {
            Ok(Some(message)) => {
                log::info!("[Fcm] launched from notification");
                self.open_notification(&message);
            }
            Ok(None) => {}
            Err(error) => log::warn!("[Fcm] failed to read initial notification: {error}"),
        }

        self.initialized.store(true, Ordering::SeqCst);
        log::info!("[Fcm] initialized");
        true
    }

    /// Consumes backend events until `stop` flips to true or the backend closes.
    pub async fn run_listeners(
        self: Arc<Self>,
        mut events: broadcast::Receiver<BackendEvent>,
        mut stop: watch::Receiver<bool>,
    ) {
        log::debug!("[Fcm] listeners started");
        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                event = events.recv() => {
                    match event {
                        Ok(event) => self.handle_event(event).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            log::warn!("[Fcm] listener lagged, skipped {skipped} events");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
        log::debug!("[Fcm] listeners stopped");
    }

    pub async fn handle_event(&self, event: BackendEvent) {
        match event {
            BackendEvent::TokenRefreshed(token) => {
                log::info!("[Fcm] token refreshed by backend: {}", redact_token(&token));
                let epoch = self.begin();
                if self.commit(epoch, Some(token.clone())) {
                    self.upload(&token).await;
                }
            }
            BackendEvent::ForegroundMessage(message) => {
                log::info!("[Fcm] foreground message received");
                let local = message.to_local_notification();
                if let Err(error) = self.notifier.show_local(&local).await {
                    log::error!("[Fcm] failed to show local notification: {error}");
                }
            }
            BackendEvent::NotificationOpened(message) => {
                log::info!("[Fcm] app opened from background notification");
                self.open_notification(&message);
            }
            BackendEvent::BackgroundMessage(_) => {
                log::debug!("[Fcm] background message received; platform presents it");
            }
        }
    }

    fn open_notification(&self, message: &InboundMessage) {
        let Some(link) = message.link() else {
            log::debug!("[Fcm] notification carries no link: {:?}", message.data);
            return;
        };
        let url = match reqwest::Url::parse(link) {
            Ok(url) => url,
            Err(error) => {
                log::warn!("[Fcm] ignoring notification link {link:?}: {error}");
                return;
            }
        };
        if let Some(intents) = &self.intents {
            if intents.send(NavigationIntent { url }).is_err() {
                log::warn!("[Fcm] navigation intent dropped; no receiver");
            }
        }
    }

    async fn fetch_and_store(&self) -> Option<String> {
        let epoch = self.begin();
        match self.backend.fetch_token().await {
            Ok(token) => {
                log::info!("[Fcm] token fetched: {}", redact_token(&token));
                if self.commit(epoch, Some(token.clone())) {
                    self.upload(&token).await;
                    Some(token)
                } else {
                    self.current_token()
                }
            }
            Err(error) => {
                self.record_error(&format!("token fetch failed: {error}"));
                if self.commit(epoch, None) {
                    None
                } else {
                    self.current_token()
                }
            }
        }
    }

    fn begin(&self) -> u64 {
        match self.latest_epoch.lock() {
            Ok(mut latest) => {
                *latest = latest.wrapping_add(1);
                *latest
            }
            Err(_) => 0,
        }
    }

    fn commit(&self, epoch: u64, token: Option<String>) -> bool {
        let Ok(latest) = self.latest_epoch.lock() else {
            log::error!("[Fcm] token epoch lock poisoned");
            return false;
        };
        if *latest != epoch {
            log::debug!("[Fcm] discarding result of superseded token operation");
            return false;
        }
        self.token.send_replace(token);
        true
    }

    async fn upload(&self, token: &str) {
        let Some(uploader) = &self.uploader else {
            return;
        };
        if let Err(error) = uploader.upload(token).await {
            log::error!("[Fcm] failed to send token to server: {error}");
        }
    }

    fn record_error(&self, message: &str) {
        log::error!("[Fcm] {message}");
        if let Ok(mut last_error) = self.last_error.lock() {
            *last_error = Some(truncate_message(message, 300));
        }
    }
}

#[derive(Serialize)]
struct TokenUploadBody<'a> {
    token: &'a str,
}

/// Forwards tokens to the application server.
pub struct TokenUploader {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl TokenUploader {
    pub fn new(endpoint: reqwest::Url) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TOKEN_UPLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|error| format!("Failed to build HTTP client: {error}"))?;
        Ok(Self { client, endpoint })
    }

    pub async fn upload(&self, token: &str) -> Result<(), String> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&TokenUploadBody { token })
            .send()
            .await
            .map_err(|error| format!("Token upload request failed: {error}"))?;

        let status = response.status();
        if status.is_success() {
            log::info!("[Fcm] token sent to server: {}", redact_token(token));
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unable to read response body>".to_string());
        Err(format!(
            "Token upload failed (HTTP {}): {}",
            status.as_u16(),
            truncate_message(&body, 200)
        ))
    }
}
