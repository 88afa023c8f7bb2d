//! In-memory collaborators for unit tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};

use crate::{
    BackendEvent, InboundMessage, LocalNotification, NotificationChannel, NotificationHost,
    PermissionStatus, PushBackend, PushError, PushResult,
};

struct PlannedFetch {
    result: Result<String, String>,
    gate: Option<Arc<Notify>>,
}

pub(crate) struct FakeBackend {
    fetches: Mutex<VecDeque<PlannedFetch>>,
    events: broadcast::Sender<BackendEvent>,
    initial: Mutex<Option<InboundMessage>>,
    unready: AtomicBool,
    delete_fails: AtomicBool,
    fetch_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    register_calls: AtomicUsize,
    background_installs: AtomicUsize,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            fetches: Mutex::new(VecDeque::new()),
            events,
            initial: Mutex::new(None),
            unready: AtomicBool::new(false),
            delete_fails: AtomicBool::new(false),
            fetch_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            register_calls: AtomicUsize::new(0),
            background_installs: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_tokens<const N: usize>(tokens: [&str; N]) -> Self {
        let backend = Self::new();
        for token in tokens {
            backend.push(Ok(token.to_string()), None);
        }
        backend
    }

    fn push(&self, result: Result<String, String>, gate: Option<Arc<Notify>>) {
        self.fetches
            .lock()
            .expect("fetch plan lock")
            .push_back(PlannedFetch { result, gate });
    }

    pub(crate) fn push_fetch_error(&self, reason: &str) {
        self.push(Err(reason.to_string()), None);
    }

    pub(crate) fn push_gated_token(&self, token: &str, gate: Arc<Notify>) {
        self.push(Ok(token.to_string()), Some(gate));
    }

    pub(crate) fn set_unready(&self) {
        self.unready.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_delete(&self) {
        self.delete_fails.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_initial_notification(&self, message: InboundMessage) {
        *self.initial.lock().expect("initial lock") = Some(message);
    }

    pub(crate) fn emit(&self, event: BackendEvent) {
        let _ = self.events.send(event);
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn background_installs(&self) -> usize {
        self.background_installs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushBackend for FakeBackend {
    async fn ready(&self) -> PushResult<()> {
        if self.unready.load(Ordering::SeqCst) {
            return Err(PushError::Unavailable("fake backend offline".to_string()));
        }
        Ok(())
    }

    async fn ensure_registered(&self) -> PushResult<()> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn install_background_handler(&self) -> PushResult<()> {
        self.background_installs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_token(&self) -> PushResult<String> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let planned = self.fetches.lock().expect("fetch plan lock").pop_front();
        let Some(planned) = planned else {
            return Err(PushError::NotRegistered);
        };
        if let Some(gate) = planned.gate {
            gate.notified().await;
        }
        planned.result.map_err(PushError::Unavailable)
    }

    async fn delete_token(&self) -> PushResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.delete_fails.load(Ordering::SeqCst) {
            return Err(PushError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn initial_notification(&self) -> PushResult<Option<InboundMessage>> {
        Ok(self.initial.lock().expect("initial lock").take())
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.events.subscribe()
    }
}

pub(crate) struct FakeNotifier {
    status: Mutex<PermissionStatus>,
    grant_on_prompt: AtomicBool,
    permission_fails: AtomicBool,
    prompts: AtomicUsize,
    badge_resets: AtomicUsize,
    channels: AtomicUsize,
    shown: Mutex<Vec<LocalNotification>>,
}

impl FakeNotifier {
    pub(crate) fn with_status(status: PermissionStatus) -> Self {
        Self {
            status: Mutex::new(status),
            grant_on_prompt: AtomicBool::new(false),
            permission_fails: AtomicBool::new(false),
            prompts: AtomicUsize::new(0),
            badge_resets: AtomicUsize::new(0),
            channels: AtomicUsize::new(0),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn granted() -> Self {
        Self::with_status(PermissionStatus::Granted)
    }

    pub(crate) fn set_status(&self, status: PermissionStatus) {
        *self.status.lock().expect("status lock") = status;
    }

    pub(crate) fn grant_on_prompt(&self) {
        self.grant_on_prompt.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_permission(&self) {
        self.permission_fails.store(true, Ordering::SeqCst);
    }

    pub(crate) fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub(crate) fn badge_resets(&self) -> usize {
        self.badge_resets.load(Ordering::SeqCst)
    }

    pub(crate) fn channels_created(&self) -> usize {
        self.channels.load(Ordering::SeqCst)
    }

    pub(crate) fn shown(&self) -> Vec<LocalNotification> {
        self.shown.lock().expect("shown lock").clone()
    }
}

#[async_trait]
impl NotificationHost for FakeNotifier {
    async fn check_permission(&self) -> PushResult<PermissionStatus> {
        if self.permission_fails.load(Ordering::SeqCst) {
            return Err(PushError::Platform("permission service crashed".to_string()));
        }
        Ok(*self.status.lock().expect("status lock"))
    }

    async fn prompt_permission(&self) -> PushResult<PermissionStatus> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        if self.permission_fails.load(Ordering::SeqCst) {
            return Err(PushError::Platform("permission service crashed".to_string()));
        }
        let mut status = self.status.lock().expect("status lock");
        if self.grant_on_prompt.load(Ordering::SeqCst) {
            *status = PermissionStatus::Granted;
        }
        Ok(*status)
    }

    async fn show_local(&self, notification: &LocalNotification) -> PushResult<()> {
        self.shown
            .lock()
            .expect("shown lock")
            .push(notification.clone());
        Ok(())
    }

    async fn set_badge_count(&self, count: u32) -> PushResult<()> {
        if count == 0 {
            self.badge_resets.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn ensure_channel(&self, _channel: &NotificationChannel) -> PushResult<()> {
        self.channels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
