pub const CONTENT_URL: &str = "https://m.fittner.co.kr/";

pub const CONNECTIVITY_POLL_MS: u64 = 1000;
pub const CONNECTIVITY_TIMEOUT_MS: u64 = 800;
pub const CONTENT_CHECK_TIMEOUT_SECS: u64 = 10;
pub const TOKEN_UPLOAD_TIMEOUT_SECS: u64 = 15;

pub const NATIVE_TOKEN_RECEIVER: &str = "onNativeFcmToken";
pub const NATIVE_TOKEN_EVENT: &str = "fcm-token";
pub const VIEWPORT_CONTENT: &str =
    "width=device-width, initial-scale=1, maximum-scale=1, user-scalable=0";

pub const IOS_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1";
pub const ANDROID_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 14; Mobile) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36";

pub const DEFAULT_CHANNEL_ID: &str = "default";
pub const DEFAULT_CHANNEL_NAME: &str = "default";
pub const DEFAULT_CHANNEL_VIBRATION: [u64; 4] = [0, 250, 250, 250];
pub const DEFAULT_CHANNEL_LIGHT_COLOR: &str = "#FF231F7C";

pub const LOCAL_NOTIFICATION_DEFAULT_TITLE: &str = "새 메시지";
pub const LOCAL_NOTIFICATION_DEFAULT_BODY: &str = "메시지 내용";

pub const FALLBACK_TITLE: &str = "인터넷 연결 없음";
pub const FALLBACK_MESSAGE: &str = "인터넷 연결을 확인하고 다시 시도해주세요.";
pub const FALLBACK_SCHEME: &str = "fallback";

pub const FIS_API_BASE: &str = "https://firebaseinstallations.googleapis.com/v1";
pub const FIS_AUTH_VERSION: &str = "FIS_v2";
pub const FIS_SDK_VERSION: &str = "w:0.6.4";
/// Installation auth tokens closer than this to expiry are regenerated before use.
pub const FIS_REFRESH_MARGIN_SECS: u64 = 3600;
pub const FIS_IDLE_RECHECK_SECS: u64 = 60;
pub const FCM_API_BASE: &str = "https://fcmregistrations.googleapis.com/v1";
pub const FCM_AUTH_SCHEME: &str = "FIS";
/// Registration tokens are re-validated with FCM after a week.
pub const FCM_TOKEN_REFRESH_SECS: u64 = 7 * 24 * 60 * 60;

pub const MAIN_WINDOW_LABEL: &str = "main";
pub const TRAY_ID: &str = "main-tray";
pub const TOKEN_STATUS_EVENT: &str = "token-status";
