use async_trait::async_trait;

use crate::{LocalNotification, NotificationChannel, PermissionStatus, PushResult};

/// Platform notification surface: permission dialogs, local display, badge, channels.
#[async_trait]
pub trait NotificationHost: Send + Sync {
    async fn check_permission(&self) -> PushResult<PermissionStatus>;

    /// May show the system dialog if the user has not decided yet.
    async fn prompt_permission(&self) -> PushResult<PermissionStatus>;

    async fn show_local(&self, notification: &LocalNotification) -> PushResult<()>;

    async fn set_badge_count(&self, count: u32) -> PushResult<()>;

    /// Idempotent; platforms without channels treat it as a no-op.
    async fn ensure_channel(&self, channel: &NotificationChannel) -> PushResult<()>;
}

#[cfg(feature = "shell")]
pub use tauri_host::TauriNotificationHost;

#[cfg(feature = "shell")]
mod tauri_host {
    use async_trait::async_trait;
    #[cfg(not(any(target_os = "android", target_os = "ios")))]
    use tauri::Manager;
    use tauri::{AppHandle, Runtime};
    use tauri_plugin_notification::{NotificationExt, PermissionState};

    use super::NotificationHost;
    #[cfg(not(any(target_os = "android", target_os = "ios")))]
    use crate::MAIN_WINDOW_LABEL;
    use crate::{LocalNotification, NotificationChannel, PermissionStatus, PushError, PushResult};

    pub struct TauriNotificationHost<R: Runtime> {
        app: AppHandle<R>,
    }

    impl<R: Runtime> TauriNotificationHost<R> {
        pub fn new(app: AppHandle<R>) -> Self {
            Self { app }
        }
    }

    fn map_permission(state: PermissionState) -> PermissionStatus {
        match state {
            PermissionState::Granted => PermissionStatus::Granted,
            PermissionState::Denied => PermissionStatus::Denied,
            _ => PermissionStatus::NotDetermined,
        }
    }

    #[async_trait]
    impl<R: Runtime> NotificationHost for TauriNotificationHost<R> {
        async fn check_permission(&self) -> PushResult<PermissionStatus> {
            self.app
                .notification()
                .permission_state()
                .map(map_permission)
                .map_err(|error| PushError::Platform(format!("permission check failed: {error}")))
        }

        async fn prompt_permission(&self) -> PushResult<PermissionStatus> {
            self.app
                .notification()
                .request_permission()
                .map(map_permission)
                .map_err(|error| {
                    PushError::Platform(format!("permission request failed: {error}"))
                })
        }

        async fn show_local(&self, notification: &LocalNotification) -> PushResult<()> {
            self.app
                .notification()
                .builder()
                .title(&notification.title)
                .body(&notification.body)
                .show()
                .map_err(|error| PushError::Platform(format!("notification dispatch failed: {error}")))
        }

        /// Mobile badges follow the delivered notifications; only desktop windows carry one.
        #[cfg_attr(any(target_os = "android", target_os = "ios"), allow(unused_variables))]
        async fn set_badge_count(&self, count: u32) -> PushResult<()> {
            #[cfg(not(any(target_os = "android", target_os = "ios")))]
            {
                if let Some(window) = self.app.get_webview_window(MAIN_WINDOW_LABEL) {
                    let badge = (count > 0).then_some(i64::from(count));
                    window.set_badge_count(badge).map_err(|error| {
                        PushError::Platform(format!("badge update failed: {error}"))
                    })?;
                }
            }
            Ok(())
        }

        #[cfg_attr(not(target_os = "android"), allow(unused_variables))]
        async fn ensure_channel(&self, channel: &NotificationChannel) -> PushResult<()> {
            #[cfg(target_os = "android")]
            {
                use tauri_plugin_notification::{Channel, Importance};

                let importance = match channel.importance {
                    crate::Importance::Max => Importance::High,
                    crate::Importance::High => Importance::High,
                    crate::Importance::Default => Importance::Default,
                };
                // The plugin takes an on/off vibration flag, not a pattern.
                let built = Channel::builder(channel.id.clone(), channel.name.clone())
                    .importance(importance)
                    .vibration(channel.vibrates())
                    .lights(true)
                    .light_color(channel.light_color.clone())
                    .build();
                self.app
                    .notification()
                    .create_channel(built)
                    .map_err(|error| {
                        PushError::Platform(format!("channel creation failed: {error}"))
                    })?;
            }
            Ok(())
        }
    }
}
