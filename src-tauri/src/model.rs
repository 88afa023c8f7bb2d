use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    DEFAULT_CHANNEL_ID, DEFAULT_CHANNEL_LIGHT_COLOR, DEFAULT_CHANNEL_NAME,
    DEFAULT_CHANNEL_VIBRATION, LOCAL_NOTIFICATION_DEFAULT_BODY, LOCAL_NOTIFICATION_DEFAULT_TITLE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Macos,
    Windows,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "ios") {
            Platform::Ios
        } else if cfg!(target_os = "android") {
            Platform::Android
        } else if cfg!(target_os = "macos") {
            Platform::Macos
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }

    pub fn is_android(self) -> bool {
        self == Platform::Android
    }
}

/// Answer from the platform notification-permission system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    /// iOS quiet delivery; counts as granted.
    Provisional,
    Denied,
    NotDetermined,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        matches!(self, PermissionStatus::Granted | PermissionStatus::Provisional)
    }
}

/// Browser push subscription FCM binds a registration token to. Messages for
/// the token are delivered to `endpoint` by the platform push service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPushSubscription {
    pub endpoint: String,
    /// base64url client auth secret.
    pub auth: String,
    /// base64url P-256 public key of the subscription.
    pub p256dh: String,
    /// VAPID key the subscription was created with; FCM's default key when absent.
    #[serde(default)]
    pub application_server_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl InboundMessage {
    pub fn to_local_notification(&self) -> LocalNotification {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        };
        LocalNotification {
            title: non_empty(&self.title)
                .unwrap_or_else(|| LOCAL_NOTIFICATION_DEFAULT_TITLE.to_string()),
            body: non_empty(&self.body).unwrap_or_else(|| LOCAL_NOTIFICATION_DEFAULT_BODY.to_string()),
            data: self.data.clone(),
        }
    }

    /// Link carried in the data payload, `url` first then `link`.
    pub fn link(&self) -> Option<&str> {
        ["url", "link"]
            .iter()
            .filter_map(|key| self.data.get(*key))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }
}

/// A notification shown immediately by the device itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalNotification {
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Importance {
    Default,
    High,
    Max,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub importance: Importance,
    pub vibration_pattern: Vec<u64>,
    pub light_color: String,
    pub show_badge: bool,
}

impl NotificationChannel {
    pub fn default_channel() -> Self {
        Self {
            id: DEFAULT_CHANNEL_ID.to_string(),
            name: DEFAULT_CHANNEL_NAME.to_string(),
            importance: Importance::Max,
            vibration_pattern: DEFAULT_CHANNEL_VIBRATION.to_vec(),
            light_color: DEFAULT_CHANNEL_LIGHT_COLOR.to_string(),
            show_badge: true,
        }
    }

    /// A pattern with any non-zero segment vibrates at all.
    pub fn vibrates(&self) -> bool {
        self.vibration_pattern.iter().any(|&millis| millis > 0)
    }
}

/// Where the view should go after a notification tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationIntent {
    pub url: reqwest::Url,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(title: Option<&str>, body: Option<&str>, data: &[(&str, &str)]) -> InboundMessage {
        InboundMessage {
            title: title.map(str::to_string),
            body: body.map(str::to_string),
            data: data
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn local_notification_falls_back_to_default_texts() {
        let local = message(None, Some("  "), &[("k", "v")]).to_local_notification();
        assert_eq!(local.title, LOCAL_NOTIFICATION_DEFAULT_TITLE);
        assert_eq!(local.body, LOCAL_NOTIFICATION_DEFAULT_BODY);
        assert_eq!(local.data.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn local_notification_keeps_provided_texts() {
        let local = message(Some("Sale"), Some("50% off"), &[]).to_local_notification();
        assert_eq!(local.title, "Sale");
        assert_eq!(local.body, "50% off");
    }

    #[test]
    fn link_prefers_url_over_link() {
        let msg = message(None, None, &[("link", "https://b"), ("url", "https://a")]);
        assert_eq!(msg.link(), Some("https://a"));
        let msg = message(None, None, &[("url", " "), ("link", "https://b")]);
        assert_eq!(msg.link(), Some("https://b"));
        assert_eq!(message(None, None, &[]).link(), None);
    }

    #[test]
    fn provisional_counts_as_granted() {
        assert!(PermissionStatus::Granted.is_granted());
        assert!(PermissionStatus::Provisional.is_granted());
        assert!(!PermissionStatus::Denied.is_granted());
        assert!(!PermissionStatus::NotDetermined.is_granted());
    }

    #[test]
    fn default_channel_matches_delivery_requirements() {
        let channel = NotificationChannel::default_channel();
        assert_eq!(channel.id, "default");
        assert_eq!(channel.importance, Importance::Max);
        assert_eq!(channel.vibration_pattern, vec![0, 250, 250, 250]);
        assert!(channel.vibrates());
        assert!(channel.show_badge);
    }

    #[test]
    fn silent_patterns_do_not_vibrate() {
        let mut channel = NotificationChannel::default_channel();
        channel.vibration_pattern = vec![0, 0];
        assert!(!channel.vibrates());
        channel.vibration_pattern.clear();
        assert!(!channel.vibrates());
    }
}
