//! Seam between the token provider and the push-messaging SDK.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::InboundMessage;

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push backend request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("push backend rejected the request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("device is not registered with the push backend")]
    NotRegistered,
    #[error("push messaging is not available: {0}")]
    Unavailable(String),
    #[error("platform notification call failed: {0}")]
    Platform(String),
}

pub type PushResult<T> = Result<T, PushError>;

/// Events the backend raises on its own schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    TokenRefreshed(String),
    /// Delivered while the app is in the foreground.
    ForegroundMessage(InboundMessage),
    /// The user tapped a notification while the app was in the background.
    NotificationOpened(InboundMessage),
    /// Delivered while the app is in the background; presentation is the platform's job.
    BackgroundMessage(InboundMessage),
}

#[async_trait]
pub trait PushBackend: Send + Sync {
    async fn ready(&self) -> PushResult<()>;

    async fn ensure_registered(&self) -> PushResult<()>;

    async fn install_background_handler(&self) -> PushResult<()>;

    async fn fetch_token(&self) -> PushResult<String>;

    async fn delete_token(&self) -> PushResult<()>;

    /// Message whose tap cold-started the app, consumed once.
    async fn initial_notification(&self) -> PushResult<Option<InboundMessage>>;

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent>;
}

/// Backend used when no push project is configured.
pub struct DisabledBackend {
    events: broadcast::Sender<BackendEvent>,
}

impl DisabledBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1);
        Self { events }
    }
}

impl Default for DisabledBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushBackend for DisabledBackend {
    async fn ready(&self) -> PushResult<()> {
        Err(PushError::Unavailable(
            "no push backend configured".to_string(),
        ))
    }

    async fn ensure_registered(&self) -> PushResult<()> {
        self.ready().await
    }

    async fn install_background_handler(&self) -> PushResult<()> {
        Ok(())
    }

    async fn fetch_token(&self) -> PushResult<String> {
        Err(PushError::Unavailable(
            "no push backend configured".to_string(),
        ))
    }

    async fn delete_token(&self) -> PushResult<()> {
        Ok(())
    }

    async fn initial_notification(&self) -> PushResult<Option<InboundMessage>> {
        Ok(None)
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.events.subscribe()
    }
}
