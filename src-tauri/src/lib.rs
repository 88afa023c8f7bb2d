mod back;
mod backend;
mod bridge;
mod connectivity;
mod consts;
pub mod core;
mod diagnostics;
mod fallback;
mod firebase;
mod model;
mod notifications;
mod render_host;
mod settings;
mod token;

#[cfg(feature = "shell")]
pub mod shell;
#[cfg(feature = "shell")]
mod ui_shell;

#[cfg(test)]
mod testing;

pub use back::{handle_back, BackOutcome, NavigationHistory};
pub use backend::{BackendEvent, DisabledBackend, PushBackend, PushError, PushResult};
pub use bridge::{delivery_script, document_start_script, setup_script};
pub use connectivity::{
    check_content, ConnectivityMonitor, ConnectivitySubscription, ReachabilityCheck,
    TcpReachability,
};
pub use consts::*;
pub use crate::core::{init_logging, truncate_message, unix_now_secs};
pub use diagnostics::{snapshot_token, TokenDiagnostics};
pub use fallback::{fallback_url, FallbackView};
pub use firebase::FirebaseRestBackend;
pub use model::{
    Importance, InboundMessage, LocalNotification, NavigationIntent, NotificationChannel,
    PermissionStatus, Platform, WebPushSubscription,
};
pub use notifications::NotificationHost;
#[cfg(feature = "shell")]
pub use notifications::TauriNotificationHost;
pub use render_host::{
    apply_actions, drive_render_host, user_agent_for, DisplayState, HostAction, HostEvent,
    HostInputs, RenderHost, WebSurface,
};
pub use settings::{normalize_content_url, read_settings, FirebaseConfig, ShellSettings};
pub use token::{TokenProvider, TokenUploader};
