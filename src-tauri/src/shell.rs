//! Tauri runtime wiring: window, fallback scheme, tray, and the background
//! tasks that feed the render host.

use std::{
    fs,
    sync::{Arc, Mutex},
    time::Duration,
};

#[cfg(desktop)]
use tauri::menu::{Menu, MenuItem};
#[cfg(desktop)]
use tauri::tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent};
use tauri::webview::PageLoadEvent;
use tauri::{App, AppHandle, Emitter, Manager, WebviewUrl, WebviewWindow, Wry};
use tokio::sync::{mpsc, watch};

use crate::{
    connectivity::check_content, document_start_script, drive_render_host, fallback_url,
    init_logging, read_settings, snapshot_token, ui_shell, user_agent_for, ConnectivityMonitor,
    ConnectivitySubscription, DisabledBackend, FallbackView, FirebaseConfig, FirebaseRestBackend,
    HostEvent, HostInputs, NotificationHost, Platform, PushBackend, RenderHost, ShellSettings,
    TauriNotificationHost, TcpReachability, TokenProvider, TokenUploader, WebSurface,
    FALLBACK_SCHEME, MAIN_WINDOW_LABEL, TOKEN_STATUS_EVENT,
};
#[cfg(desktop)]
use crate::TRAY_ID;

struct ShellState {
    provider: Arc<TokenProvider>,
    host_events: mpsc::UnboundedSender<HostEvent>,
    stop_tx: watch::Sender<bool>,
    connectivity: Mutex<Option<ConnectivitySubscription>>,
    #[cfg(desktop)]
    status_item: Mutex<Option<MenuItem<Wry>>>,
}

impl ShellState {
    fn shutdown(&self) {
        let _ = self.stop_tx.send(true);
        if let Ok(mut connectivity) = self.connectivity.lock() {
            connectivity.take();
        }
    }
}

/// The main webview as seen by the render host.
struct TauriSurface {
    window: WebviewWindow<Wry>,
    events: mpsc::UnboundedSender<HostEvent>,
    client: reqwest::Client,
    user_agent: &'static str,
    fallback: reqwest::Url,
}

impl WebSurface for TauriSurface {
    fn show_content(&self, url: &reqwest::Url, navigation: u64) -> Result<(), String> {
        self.navigate(url)?;

        // The webview reports no load errors, so a side request decides whether
        // the page could be reached at all.
        let client = self.client.clone();
        let events = self.events.clone();
        let user_agent = self.user_agent;
        let url = url.clone();
        tauri::async_runtime::spawn(async move {
            if let Err(error) = check_content(&client, &url, user_agent).await {
                let _ = events.send(HostEvent::LoadFailed {
                    navigation,
                    reason: error,
                });
            }
        });
        Ok(())
    }

    fn navigate(&self, url: &reqwest::Url) -> Result<(), String> {
        self.window
            .navigate(url.clone())
            .map_err(|error| format!("Failed to open {url}: {error}"))
    }

    fn show_fallback(&self) -> Result<(), String> {
        self.window
            .navigate(self.fallback.clone())
            .map_err(|error| format!("Failed to show fallback: {error}"))
    }

    fn eval(&self, script: &str) -> Result<(), String> {
        self.window
            .eval(script)
            .map_err(|error| format!("Script injection failed: {error}"))
    }

    fn go_back(&self) -> Result<(), String> {
        self.eval("history.back(); true;")
    }

    fn exit_default(&self) -> Result<(), String> {
        ui_shell::leave_main_window(&self.window)
    }
}

fn build_backend(
    settings: &ShellSettings,
    config: Option<FirebaseConfig>,
) -> Result<(Arc<dyn PushBackend>, Option<Arc<FirebaseRestBackend>>), String> {
    if !settings.notifications_enabled {
        log::info!("[Shell] notifications disabled in settings");
        return Ok((Arc::new(DisabledBackend::new()), None));
    }
    match config {
        Some(config) => {
            let backend = Arc::new(FirebaseRestBackend::new(
                config,
                settings.push_subscription.clone(),
            )?);
            Ok((backend.clone(), Some(backend)))
        }
        None => {
            log::warn!("[Shell] no push backend configuration; push disabled");
            Ok((Arc::new(DisabledBackend::new()), None))
        }
    }
}

fn load_settings(app: &App) -> Result<ShellSettings, String> {
    let config_dir = app
        .path()
        .app_config_dir()
        .map_err(|error| format!("Failed to resolve app config dir: {error}"))?;
    fs::create_dir_all(&config_dir)
        .map_err(|error| format!("Failed to create config directory: {error}"))?;
    let settings_path = config_dir.join("settings.json");
    log::debug!("[Shell] settings file path = {settings_path:?}");
    read_settings(&settings_path)
}

pub(crate) fn emit_token_status(app: &AppHandle) {
    let Some(state) = app.try_state::<ShellState>() else {
        return;
    };
    let diag = snapshot_token(&state.provider);

    #[cfg(desktop)]
    if let Ok(status_item) = state.status_item.lock() {
        if let Some(item) = status_item.as_ref() {
            let _ = item.set_text(diag.status_label());
        }
    }

    let _ = app.emit(TOKEN_STATUS_EVENT, diag.clone());
    if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
        let _ = window.emit(TOKEN_STATUS_EVENT, diag);
    }
}

#[cfg(desktop)]
fn run_token_action(app: &AppHandle, action: &str) {
    let Some(state) = app.try_state::<ShellState>() else {
        return;
    };
    let provider = state.provider.clone();
    let app = app.clone();
    let action = action.to_string();
    tauri::async_runtime::spawn(async move {
        match action.as_str() {
            "refresh_token" => {
                provider.refresh_token().await;
            }
            "delete_token" => provider.delete_token().await,
            "request_permission" => {
                provider.request_permission().await;
            }
            _ => {}
        }
        emit_token_status(&app);
    });
}

#[cfg(desktop)]
fn send_host_event(app: &AppHandle, event: HostEvent) {
    if let Some(state) = app.try_state::<ShellState>() {
        if state.host_events.send(event).is_err() {
            log::warn!("[Shell] render host is not running");
        }
    }
}

#[cfg(desktop)]
fn build_tray(app: &App) -> tauri::Result<MenuItem<Wry>> {
    let status_item = MenuItem::with_id(app, "token_status", "Push: Starting", false, None::<&str>)?;
    let open_item = MenuItem::with_id(app, "open", "Open Fittner", true, None::<&str>)?;
    let refresh_item = MenuItem::with_id(app, "refresh_token", "Refresh Token", true, None::<&str>)?;
    let delete_item =
        MenuItem::with_id(app, "delete_token", "Delete Token (Logout)", true, None::<&str>)?;
    let permission_item = MenuItem::with_id(
        app,
        "request_permission",
        "Request Permission",
        true,
        None::<&str>,
    )?;
    let back_item = MenuItem::with_id(app, "back", "Back", true, None::<&str>)?;
    let quit_item = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?;
    let menu = Menu::with_items(
        app,
        &[
            &status_item,
            &open_item,
            &refresh_item,
            &delete_item,
            &permission_item,
            &back_item,
            &quit_item,
        ],
    )?;

    let mut tray_builder = TrayIconBuilder::with_id(TRAY_ID)
        .menu(&menu)
        .show_menu_on_left_click(false)
        .on_tray_icon_event(|tray, event| {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            } = event
            {
                ui_shell::toggle_main_window(tray.app_handle());
            }
        })
        .on_menu_event(|app, event| match event.id().as_ref() {
            "open" => ui_shell::show_main_window(app),
            "refresh_token" | "delete_token" | "request_permission" => {
                run_token_action(app, event.id().as_ref())
            }
            "back" => send_host_event(app, HostEvent::Back),
            "quit" => {
                if let Some(state) = app.try_state::<ShellState>() {
                    state.shutdown();
                }
                app.exit(0);
            }
            _ => {}
        });
    if let Some(icon) = ui_shell::tray_icon().or_else(|| app.default_window_icon().cloned()) {
        tray_builder = tray_builder.icon(icon);
    }
    tray_builder.build(app)?;
    Ok(status_item)
}

fn setup(app: &mut App, firebase: Option<FirebaseConfig>) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("[Shell] setup: starting");

    let settings = load_settings(app).unwrap_or_else(|error| {
        log::error!("[Shell] {error}; using defaults");
        ShellSettings::default()
    });
    let content_url = settings.content_url()?;
    let platform = Platform::current();
    let user_agent = user_agent_for(platform);

    let (backend, rest_backend) = build_backend(&settings, firebase)?;
    let notifier: Arc<dyn NotificationHost> =
        Arc::new(TauriNotificationHost::new(app.handle().clone()));
    let (intents_tx, intents_rx) = mpsc::unbounded_channel();
    let mut provider = TokenProvider::new(backend, notifier, platform).with_intents(intents_tx);
    if let Some(endpoint) = settings.token_endpoint()? {
        provider = provider.with_uploader(TokenUploader::new(endpoint)?);
    }
    let provider = Arc::new(provider);

    let checker = TcpReachability::for_url(
        &content_url,
        Duration::from_millis(settings.connectivity_timeout_ms),
    )?;
    let monitor = Arc::new(ConnectivityMonitor::new(
        Arc::new(checker),
        Duration::from_millis(settings.connectivity_poll_ms),
    ));
    let (subscription, poll) = monitor.mount();
    let online = subscription.receiver();
    tauri::async_runtime::spawn(poll);

    let (host_events_tx, host_events_rx) = mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = watch::channel(false);

    let page_events = host_events_tx.clone();
    let builder = tauri::WebviewWindowBuilder::new(
        app,
        MAIN_WINDOW_LABEL,
        WebviewUrl::App("index.html".into()),
    )
    .user_agent(user_agent)
    .initialization_script(&document_start_script(
        &content_url.origin().ascii_serialization(),
    ))
    .on_page_load(move |_window, payload| {
        if payload.event() == PageLoadEvent::Finished {
            let _ = page_events.send(HostEvent::LoadFinished(payload.url().clone()));
        }
    });
    #[cfg(desktop)]
    let builder = builder
        .title("Fittner")
        .inner_size(420.0, 860.0)
        .min_inner_size(360.0, 560.0);
    let window = builder.build()?;

    let fallback = reqwest::Url::parse(&fallback_url())?;
    let client = reqwest::Client::builder()
        .build()
        .map_err(|error| format!("Failed to build HTTP client: {error}"))?;
    let surface = TauriSurface {
        window,
        events: host_events_tx.clone(),
        client,
        user_agent,
        fallback,
    };
    let inputs = HostInputs {
        online,
        token: provider.watch_token(),
        events: host_events_rx,
        intents: intents_rx,
        stop: stop_rx.clone(),
    };
    tauri::async_runtime::spawn(drive_render_host(
        RenderHost::new(content_url),
        surface,
        inputs,
    ));

    app.manage(ShellState {
        provider: provider.clone(),
        host_events: host_events_tx,
        stop_tx,
        connectivity: Mutex::new(Some(subscription)),
        #[cfg(desktop)]
        status_item: Mutex::new(None),
    });

    #[cfg(desktop)]
    {
        let status_item = build_tray(app)?;
        let state = app.state::<ShellState>();
        if let Ok(mut lock) = state.status_item.lock() {
            *lock = Some(status_item);
        }
    }

    let listener_provider = provider.clone();
    let backend_events = provider.subscribe_backend();
    tauri::async_runtime::spawn(listener_provider.run_listeners(backend_events, stop_rx.clone()));

    if let Some(rest_backend) = rest_backend {
        let refresh_stop = stop_rx.clone();
        tauri::async_runtime::spawn(async move {
            rest_backend.run_refresh_loop(refresh_stop).await;
        });
    }

    let status_app = app.handle().clone();
    let mut token_rx = provider.watch_token();
    let mut status_stop = stop_rx;
    tauri::async_runtime::spawn(async move {
        loop {
            tokio::select! {
                changed = status_stop.changed() => {
                    if changed.is_err() || *status_stop.borrow() {
                        break;
                    }
                }
                changed = token_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    emit_token_status(&status_app);
                }
            }
        }
    });

    let init_app = app.handle().clone();
    tauri::async_runtime::spawn(async move {
        let active = provider.initialize().await;
        log::info!("[Shell] push initialization finished (active={active})");
        emit_token_status(&init_app);
    });

    ui_shell::show_main_window(app.handle());
    Ok(())
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    init_logging();
    log::info!("[Shell] fittner-shell starting (pid={})", std::process::id());

    let firebase = match FirebaseConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            log::error!("[Shell] {error}");
            std::process::exit(1);
        }
    };

    tauri::Builder::default()
        .plugin(tauri_plugin_notification::init())
        .register_uri_scheme_protocol(FALLBACK_SCHEME, |_ctx, _request| {
            let html = FallbackView::default().to_html().into_bytes();
            tauri::http::Response::builder()
                .header(tauri::http::header::CONTENT_TYPE, "text/html; charset=utf-8")
                .body(html)
                .unwrap_or_else(|_| tauri::http::Response::new(Vec::new()))
        })
        .setup(move |app| setup(app, firebase))
        .on_window_event(ui_shell::handle_window_event)
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
