//! Decides between the remote page and the fallback screen and pushes the
//! token into the page after loads and token changes.
//!
//! `RenderHost` is a plain state machine; `drive_render_host` feeds it from the
//! connectivity and token channels and applies its actions to a `WebSurface`.

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::{
    back::{handle_back, BackOutcome, NavigationHistory},
    bridge, NavigationIntent, Platform, ANDROID_USER_AGENT, IOS_USER_AGENT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayState {
    Content,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Mounted,
    LoadFinished(reqwest::Url),
    /// The content request behind `ShowContent { navigation, .. }` could not complete.
    LoadFailed { navigation: u64, reason: String },
    Connectivity(bool),
    TokenChanged(Option<String>),
    Back,
    Intent(reqwest::Url),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAction {
    /// Load the remote page. `navigation` tags failures reported for this load.
    ShowContent { url: reqwest::Url, navigation: u64 },
    ShowFallback,
    Eval(String),
    GoBack,
    ExitDefault,
    Navigate(reqwest::Url),
}

pub fn user_agent_for(platform: Platform) -> &'static str {
    match platform {
        Platform::Ios => IOS_USER_AGENT,
        _ => ANDROID_USER_AGENT,
    }
}

pub struct RenderHost {
    content_url: reqwest::Url,
    online: bool,
    load_error: bool,
    token: Option<String>,
    display: Option<DisplayState>,
    content_loaded: bool,
    pending_intent: Option<reqwest::Url>,
    navigation: u64,
    history: NavigationHistory,
}

impl RenderHost {
    pub fn new(content_url: reqwest::Url) -> Self {
        Self {
            content_url,
            online: true,
            load_error: false,
            token: None,
            display: None,
            content_loaded: false,
            pending_intent: None,
            navigation: 0,
            history: NavigationHistory::default(),
        }
    }

    pub fn display(&self) -> Option<DisplayState> {
        self.display
    }

    pub fn has_load_error(&self) -> bool {
        self.load_error
    }

    pub fn history_depth(&self) -> usize {
        self.history.depth()
    }

    pub fn handle(&mut self, event: HostEvent) -> Vec<HostAction> {
        match event {
            HostEvent::Mounted => self.reconcile(),
            HostEvent::Connectivity(online) => {
                self.online = online;
                self.reconcile_if_mounted()
            }
            HostEvent::LoadFailed { navigation, reason } => {
                self.on_load_failed(navigation, reason)
            }
            HostEvent::LoadFinished(url) => self.on_load_finished(url),
            HostEvent::TokenChanged(token) => {
                self.token = token;
                if self.display == Some(DisplayState::Content) && self.content_loaded {
                    self.delivery().into_iter().collect()
                } else {
                    Vec::new()
                }
            }
            HostEvent::Back => self.on_back(),
            HostEvent::Intent(url) => self.on_intent(url),
        }
    }

    /// History starts at the first content load after `ShowContent`; from then
    /// on every load counts, including pages on other origins (login
    /// providers, payment pages). Only content-origin pages get the bridge.
    fn on_load_finished(&mut self, url: reqwest::Url) -> Vec<HostAction> {
        if self.display != Some(DisplayState::Content) {
            return Vec::new();
        }
        let on_content = self.is_content_origin(&url);
        if self.history.is_empty() && !on_content {
            return Vec::new();
        }
        self.history.record_load(&url);
        self.content_loaded = on_content;
        if !on_content {
            log::debug!("[Render] left content origin: {url}");
            return Vec::new();
        }
        log::debug!("[Render] content loaded: {url}");

        let mut actions = vec![HostAction::Eval(bridge::setup_script())];
        actions.extend(self.delivery());
        actions
    }

    fn on_load_failed(&mut self, navigation: u64, reason: String) -> Vec<HostAction> {
        if self.display != Some(DisplayState::Content) || navigation != self.navigation {
            log::debug!("[Render] ignoring stale load failure #{navigation}: {reason}");
            return Vec::new();
        }
        if !self.history.is_empty() {
            log::debug!("[Render] page already loaded, ignoring load failure: {reason}");
            return Vec::new();
        }
        log::warn!("[Render] content failed to load: {reason}");
        self.load_error = true;
        self.reconcile()
    }

    fn on_back(&mut self) -> Vec<HostAction> {
        if self.display != Some(DisplayState::Content) {
            return vec![HostAction::ExitDefault];
        }
        let outcome = handle_back(self.history.depth());
        log::debug!("[Back] depth={} -> {outcome:?}", self.history.depth());
        match outcome {
            BackOutcome::Consumed => {
                self.history.begin_back();
                vec![HostAction::GoBack]
            }
            BackOutcome::Default => vec![HostAction::ExitDefault],
        }
    }

    fn on_intent(&mut self, url: reqwest::Url) -> Vec<HostAction> {
        if !self.is_content_origin(&url) {
            log::warn!("[Render] ignoring navigation outside the content origin: {url}");
            return Vec::new();
        }
        if self.display == Some(DisplayState::Content) {
            return vec![HostAction::Navigate(url)];
        }
        self.pending_intent = Some(url);
        Vec::new()
    }

    fn delivery(&self) -> Option<HostAction> {
        bridge::delivery_script(self.token.as_deref()).map(HostAction::Eval)
    }

    fn is_content_origin(&self, url: &reqwest::Url) -> bool {
        url.origin() == self.content_url.origin()
    }

    fn reconcile_if_mounted(&mut self) -> Vec<HostAction> {
        if self.display.is_none() {
            return Vec::new();
        }
        self.reconcile()
    }

    fn reconcile(&mut self) -> Vec<HostAction> {
        let desired = if self.online && !self.load_error {
            DisplayState::Content
        } else {
            DisplayState::Fallback
        };
        if self.display == Some(desired) {
            return Vec::new();
        }

        log::info!("[Render] display -> {desired:?}");
        self.display = Some(desired);
        self.content_loaded = false;
        match desired {
            DisplayState::Content => {
                self.history.reset();
                self.navigation += 1;
                let url = self
                    .pending_intent
                    .take()
                    .unwrap_or_else(|| self.content_url.clone());
                vec![HostAction::ShowContent {
                    url,
                    navigation: self.navigation,
                }]
            }
            DisplayState::Fallback => vec![HostAction::ShowFallback],
        }
    }
}

/// The embedded browser view the host drives.
pub trait WebSurface: Send {
    /// Opens the remote page and reports a failed load as
    /// `HostEvent::LoadFailed` carrying `navigation`.
    fn show_content(&self, url: &reqwest::Url, navigation: u64) -> Result<(), String>;

    /// In-content navigation to a page on the content origin.
    fn navigate(&self, url: &reqwest::Url) -> Result<(), String>;

    fn show_fallback(&self) -> Result<(), String>;

    fn eval(&self, script: &str) -> Result<(), String>;

    fn go_back(&self) -> Result<(), String>;

    /// Platform default for an unhandled back action.
    fn exit_default(&self) -> Result<(), String>;
}

pub fn apply_actions<S: WebSurface + ?Sized>(surface: &S, actions: Vec<HostAction>) {
    for action in actions {
        let result = match &action {
            HostAction::ShowContent { url, navigation } => surface.show_content(url, *navigation),
            HostAction::Navigate(url) => surface.navigate(url),
            HostAction::ShowFallback => surface.show_fallback(),
            HostAction::Eval(script) => surface.eval(script),
            HostAction::GoBack => surface.go_back(),
            HostAction::ExitDefault => surface.exit_default(),
        };
        if let Err(error) = result {
            log::warn!("[Render] failed to apply {action:?}: {error}");
        }
    }
}

/// Channels feeding a mounted render host.
pub struct HostInputs {
    pub online: watch::Receiver<bool>,
    pub token: watch::Receiver<Option<String>>,
    pub events: mpsc::UnboundedReceiver<HostEvent>,
    pub intents: mpsc::UnboundedReceiver<NavigationIntent>,
    pub stop: watch::Receiver<bool>,
}

pub async fn drive_render_host<S: WebSurface>(mut host: RenderHost, surface: S, inputs: HostInputs) {
    let HostInputs {
        mut online,
        mut token,
        mut events,
        mut intents,
        mut stop,
    } = inputs;

    host.online = *online.borrow_and_update();
    host.token = token.borrow_and_update().clone();
    apply_actions(&surface, host.handle(HostEvent::Mounted));

    let mut online_open = true;
    let mut token_open = true;
    let mut intents_open = true;
    loop {
        let actions = tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
                continue;
            }
            changed = online.changed(), if online_open => {
                if changed.is_err() {
                    online_open = false;
                    continue;
                }
                let value = *online.borrow_and_update();
                host.handle(HostEvent::Connectivity(value))
            }
            changed = token.changed(), if token_open => {
                if changed.is_err() {
                    token_open = false;
                    continue;
                }
                let value = token.borrow_and_update().clone();
                host.handle(HostEvent::TokenChanged(value))
            }
            intent = intents.recv(), if intents_open => match intent {
                Some(intent) => host.handle(HostEvent::Intent(intent.url)),
                None => {
                    intents_open = false;
                    continue;
                }
            },
            event = events.recv() => match event {
                Some(event) => host.handle(event),
                None => break,
            },
        };
        apply_actions(&surface, actions);
    }
    log::debug!("[Render] host unmounted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn content() -> reqwest::Url {
        reqwest::Url::parse("https://m.fittner.co.kr/").expect("url")
    }

    fn page(path: &str) -> reqwest::Url {
        content().join(path).expect("url")
    }

    fn mounted(token: Option<&str>) -> RenderHost {
        let mut host = RenderHost::new(content());
        host.handle(HostEvent::TokenChanged(token.map(str::to_string)));
        assert_eq!(
            host.handle(HostEvent::Mounted),
            vec![show(content(), 1)]
        );
        host
    }

    fn show(url: reqwest::Url, navigation: u64) -> HostAction {
        HostAction::ShowContent { url, navigation }
    }

    fn failed(navigation: u64, reason: &str) -> HostEvent {
        HostEvent::LoadFailed {
            navigation,
            reason: reason.to_string(),
        }
    }

    fn kakao() -> reqwest::Url {
        reqwest::Url::parse("https://accounts.kakao.com/login").expect("url")
    }

    fn eval_scripts(actions: &[HostAction]) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|action| match action {
                HostAction::Eval(script) => Some(script.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn cold_start_load_delivers_cached_token() {
        let mut host = mounted(Some("T1"));
        let actions = host.handle(HostEvent::LoadFinished(content()));
        let scripts = eval_scripts(&actions);
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[0], bridge::setup_script());
        assert!(scripts[1].contains(r#"onNativeFcmToken("T1")"#));
    }

    #[test]
    fn load_without_token_only_runs_setup() {
        let mut host = mounted(None);
        let actions = host.handle(HostEvent::LoadFinished(content()));
        assert_eq!(actions, vec![HostAction::Eval(bridge::setup_script())]);
    }

    #[test]
    fn refreshed_token_replaces_old_one_in_all_later_deliveries() {
        let mut host = mounted(Some("T1"));
        host.handle(HostEvent::LoadFinished(content()));

        let actions = host.handle(HostEvent::TokenChanged(Some("T2".to_string())));
        let scripts = eval_scripts(&actions);
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].contains(r#"("T2")"#));

        let actions = host.handle(HostEvent::LoadFinished(page("/shop")));
        let joined = eval_scripts(&actions).join("\n");
        assert!(joined.contains(r#"("T2")"#));
        assert!(!joined.contains(r#"("T1")"#));
    }

    #[test]
    fn token_waits_for_content_load() {
        let mut host = mounted(None);
        assert!(host
            .handle(HostEvent::TokenChanged(Some("T1".to_string())))
            .is_empty());
        let actions = host.handle(HostEvent::LoadFinished(content()));
        assert!(eval_scripts(&actions)[1].contains(r#"("T1")"#));
    }

    #[test]
    fn cleared_token_sends_nothing() {
        let mut host = mounted(Some("T1"));
        host.handle(HostEvent::LoadFinished(content()));
        assert!(host.handle(HostEvent::TokenChanged(None)).is_empty());
    }

    #[test]
    fn connectivity_toggles_between_fallback_and_content() {
        let mut host = mounted(None);
        assert_eq!(
            host.handle(HostEvent::Connectivity(false)),
            vec![HostAction::ShowFallback]
        );
        assert_eq!(host.display(), Some(DisplayState::Fallback));
        assert!(host.handle(HostEvent::Connectivity(false)).is_empty());
        assert_eq!(
            host.handle(HostEvent::Connectivity(true)),
            vec![show(content(), 2)]
        );
        assert_eq!(host.display(), Some(DisplayState::Content));
    }

    #[test]
    fn load_error_pins_fallback_regardless_of_connectivity() {
        let mut host = mounted(Some("T1"));
        assert_eq!(
            host.handle(failed(1, "dns")),
            vec![HostAction::ShowFallback]
        );
        assert!(host.has_load_error());
        assert!(host.handle(HostEvent::Connectivity(false)).is_empty());
        assert!(host.handle(HostEvent::Connectivity(true)).is_empty());
        assert_eq!(host.display(), Some(DisplayState::Fallback));
    }

    #[test]
    fn fresh_host_recovers_from_load_error() {
        let mut host = mounted(None);
        host.handle(failed(1, "reset"));
        assert!(host.has_load_error());
        let remounted = mounted(None);
        assert_eq!(remounted.display(), Some(DisplayState::Content));
        assert!(!remounted.has_load_error());
    }

    #[test]
    fn offline_mount_starts_on_fallback() {
        let mut host = RenderHost::new(content());
        assert!(host.handle(HostEvent::Connectivity(false)).is_empty());
        assert_eq!(
            host.handle(HostEvent::Mounted),
            vec![HostAction::ShowFallback]
        );
    }

    #[test]
    fn fallback_page_loads_do_not_touch_the_bridge() {
        let mut host = mounted(Some("T1"));
        host.handle(HostEvent::Connectivity(false));
        let fallback = reqwest::Url::parse("fallback://localhost/").expect("url");
        assert!(host.handle(HostEvent::LoadFinished(fallback)).is_empty());
        assert!(host
            .handle(HostEvent::TokenChanged(Some("T2".to_string())))
            .is_empty());
    }

    #[test]
    fn failure_from_an_earlier_navigation_is_ignored() {
        let mut host = mounted(None);
        host.handle(HostEvent::Connectivity(false));
        assert_eq!(
            host.handle(HostEvent::Connectivity(true)),
            vec![show(content(), 2)]
        );
        host.handle(HostEvent::LoadFinished(content()));
        assert!(host.handle(failed(1, "timeout")).is_empty());
        assert!(!host.has_load_error());
        assert_eq!(host.display(), Some(DisplayState::Content));
    }

    #[test]
    fn failure_after_page_loaded_is_ignored() {
        let mut host = mounted(None);
        host.handle(HostEvent::LoadFinished(content()));
        assert!(host.handle(failed(1, "timeout")).is_empty());
        assert!(!host.has_load_error());
    }

    #[test]
    fn foreign_origin_pages_get_no_bridge() {
        let mut host = mounted(Some("T1"));
        assert!(host.handle(HostEvent::LoadFinished(kakao())).is_empty());
        host.handle(HostEvent::LoadFinished(content()));
        assert!(host.handle(HostEvent::LoadFinished(kakao())).is_empty());
        assert!(host
            .handle(HostEvent::TokenChanged(Some("T2".to_string())))
            .is_empty());
    }

    #[test]
    fn back_from_foreign_origin_page_goes_back() {
        let mut host = mounted(None);
        host.handle(HostEvent::LoadFinished(content()));
        host.handle(HostEvent::LoadFinished(kakao()));
        assert_eq!(host.history_depth(), 1);
        assert_eq!(host.handle(HostEvent::Back), vec![HostAction::GoBack]);
    }

    #[test]
    fn history_stays_in_step_across_foreign_origin_round_trips() {
        let mut host = mounted(None);
        host.handle(HostEvent::LoadFinished(content()));
        host.handle(HostEvent::LoadFinished(kakao()));
        host.handle(HostEvent::LoadFinished(page("/done")));
        assert_eq!(host.handle(HostEvent::Back), vec![HostAction::GoBack]);
        host.handle(HostEvent::LoadFinished(kakao()));
        host.handle(HostEvent::LoadFinished(page("/done2")));
        assert_eq!(host.history_depth(), 2);
        assert_eq!(host.handle(HostEvent::Back), vec![HostAction::GoBack]);
    }

    #[test]
    fn back_steps_through_history_then_exits() {
        let mut host = mounted(None);
        host.handle(HostEvent::LoadFinished(content()));
        assert_eq!(host.handle(HostEvent::Back), vec![HostAction::ExitDefault]);

        host.handle(HostEvent::LoadFinished(page("/shop")));
        assert_eq!(host.history_depth(), 1);
        assert_eq!(host.handle(HostEvent::Back), vec![HostAction::GoBack]);
        host.handle(HostEvent::LoadFinished(content()));
        assert_eq!(host.history_depth(), 0);
        assert_eq!(host.handle(HostEvent::Back), vec![HostAction::ExitDefault]);
    }

    #[test]
    fn back_on_fallback_uses_default() {
        let mut host = mounted(None);
        host.handle(HostEvent::Connectivity(false));
        assert_eq!(host.handle(HostEvent::Back), vec![HostAction::ExitDefault]);
    }

    #[test]
    fn intents_navigate_within_origin_only() {
        let mut host = mounted(None);
        assert_eq!(
            host.handle(HostEvent::Intent(page("/event/7"))),
            vec![HostAction::Navigate(page("/event/7"))]
        );
        let foreign = reqwest::Url::parse("https://evil.example.com/").expect("url");
        assert!(host.handle(HostEvent::Intent(foreign)).is_empty());
    }

    #[test]
    fn intent_during_fallback_is_applied_when_content_returns() {
        let mut host = mounted(None);
        host.handle(HostEvent::Connectivity(false));
        assert!(host.handle(HostEvent::Intent(page("/event/7"))).is_empty());
        assert_eq!(
            host.handle(HostEvent::Connectivity(true)),
            vec![show(page("/event/7"), 2)]
        );
    }

    #[test]
    fn user_agent_depends_on_platform() {
        assert_eq!(user_agent_for(Platform::Ios), IOS_USER_AGENT);
        assert_eq!(user_agent_for(Platform::Android), ANDROID_USER_AGENT);
        assert_ne!(IOS_USER_AGENT, ANDROID_USER_AGENT);
    }

    #[derive(Clone, Default)]
    struct RecordingSurface {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingSurface {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }

        fn record(&self, call: String) -> Result<(), String> {
            self.calls.lock().expect("calls lock").push(call);
            Ok(())
        }
    }

    impl WebSurface for RecordingSurface {
        fn show_content(&self, url: &reqwest::Url, navigation: u64) -> Result<(), String> {
            self.record(format!("content #{navigation} {url}"))
        }

        fn navigate(&self, url: &reqwest::Url) -> Result<(), String> {
            self.record(format!("navigate {url}"))
        }

        fn show_fallback(&self) -> Result<(), String> {
            self.record("fallback".to_string())
        }

        fn eval(&self, script: &str) -> Result<(), String> {
            self.record(format!("eval {script}"))
        }

        fn go_back(&self) -> Result<(), String> {
            self.record("back".to_string())
        }

        fn exit_default(&self) -> Result<(), String> {
            self.record("exit".to_string())
        }
    }

    #[tokio::test]
    async fn driver_follows_channels_until_stopped() {
        let surface = RecordingSurface::default();
        let (online_tx, online_rx) = watch::channel(true);
        let (token_tx, token_rx) = watch::channel(Some("T1".to_string()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (_intents_tx, intents_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);

        let driver = tokio::spawn(drive_render_host(
            RenderHost::new(content()),
            surface.clone(),
            HostInputs {
                online: online_rx,
                token: token_rx,
                events: events_rx,
                intents: intents_rx,
                stop: stop_rx,
            },
        ));

        events_tx
            .send(HostEvent::LoadFinished(content()))
            .expect("driver alive");
        tokio::task::yield_now().await;
        token_tx.send_replace(Some("T2".to_string()));
        tokio::task::yield_now().await;
        online_tx.send_replace(false);
        tokio::task::yield_now().await;
        stop_tx.send(true).expect("driver alive");
        driver.await.expect("driver exits");

        let calls = surface.calls();
        assert_eq!(calls[0], "content #1 https://m.fittner.co.kr/");
        assert!(calls[1].starts_with("eval (function () {"));
        assert!(calls[2].contains(r#"("T1")"#));
        assert!(calls[3].contains(r#"("T2")"#));
        assert_eq!(calls[4], "fallback");
        assert_eq!(calls.len(), 5);
    }
}
