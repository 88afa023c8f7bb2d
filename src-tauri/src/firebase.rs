//! Push backend on the Firebase REST APIs.
//!
//! A Firebase installation identifies the device; its auth token is a bearer
//! credential and stays inside this module. The FCM registrations endpoint
//! binds the configured web push subscription to that installation and issues
//! the registration token handed to the page. Registrations are re-validated
//! weekly, and a changed token is broadcast the way a mobile SDK reports a
//! backend-initiated refresh.
//!
//! Messages for the token go from the platform push service to the
//! subscription endpoint, never through this backend. It raises no message
//! events, has no background handler to install and has no initial
//! notification to report.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, Mutex};

use crate::{
    truncate_message, unix_now_secs, BackendEvent, FirebaseConfig, InboundMessage, PushBackend,
    PushError, PushResult, WebPushSubscription, FCM_API_BASE, FCM_AUTH_SCHEME,
    FCM_TOKEN_REFRESH_SECS, FIS_API_BASE, FIS_AUTH_VERSION, FIS_IDLE_RECHECK_SECS,
    FIS_REFRESH_MARGIN_SECS, FIS_SDK_VERSION,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateInstallationWire<'a> {
    fid: &'a str,
    auth_version: &'a str,
    app_id: &'a str,
    sdk_version: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstallationWire {
    fid: String,
    refresh_token: String,
    auth_token: AuthTokenWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthTokenWire {
    token: String,
    expires_in: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAuthTokenWire<'a> {
    installation: InstallationInfoWire<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InstallationInfoWire<'a> {
    sdk_version: &'a str,
}

#[derive(Debug, Serialize)]
struct RegistrationRequestWire<'a> {
    web: WebRegistrationWire<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebRegistrationWire<'a> {
    endpoint: &'a str,
    auth: &'a str,
    p256dh: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    application_pub_key: Option<&'a str>,
}

impl<'a> From<&'a WebPushSubscription> for RegistrationRequestWire<'a> {
    fn from(subscription: &'a WebPushSubscription) -> Self {
        Self {
            web: WebRegistrationWire {
                endpoint: &subscription.endpoint,
                auth: &subscription.auth,
                p256dh: &subscription.p256dh,
                application_pub_key: subscription.application_server_key.as_deref(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistrationWire {
    token: String,
}

#[derive(Debug, Clone)]
struct Installation {
    fid: String,
    refresh_token: String,
    auth_token: String,
    expires_at: u64,
}

#[derive(Debug, Clone)]
struct Registration {
    token: String,
    issued_at: u64,
}

#[derive(Debug, Default)]
struct BackendState {
    installation: Option<Installation>,
    registration: Option<Registration>,
}

pub struct FirebaseRestBackend {
    config: FirebaseConfig,
    subscription: Option<WebPushSubscription>,
    fis_base: String,
    fcm_base: String,
    client: reqwest::Client,
    state: Mutex<BackendState>,
    events: broadcast::Sender<BackendEvent>,
}

impl FirebaseRestBackend {
    pub fn new(
        config: FirebaseConfig,
        subscription: Option<WebPushSubscription>,
    ) -> Result<Self, String> {
        Self::with_api_bases(config, subscription, FIS_API_BASE, FCM_API_BASE)
    }

    pub fn with_api_bases(
        config: FirebaseConfig,
        subscription: Option<WebPushSubscription>,
        fis_base: &str,
        fcm_base: &str,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|error| format!("Failed to build HTTP client: {error}"))?;
        let (events, _) = broadcast::channel(16);
        Ok(Self {
            config,
            subscription,
            fis_base: fis_base.trim_end_matches('/').to_string(),
            fcm_base: fcm_base.trim_end_matches('/').to_string(),
            client,
            state: Mutex::new(BackendState::default()),
            events,
        })
    }

    fn installations_url(&self) -> String {
        format!(
            "{}/projects/{}/installations",
            self.fis_base, self.config.project_id
        )
    }

    fn registrations_url(&self) -> String {
        format!(
            "{}/projects/{}/registrations",
            self.fcm_base, self.config.project_id
        )
    }

    fn subscription(&self) -> PushResult<&WebPushSubscription> {
        self.subscription.as_ref().ok_or_else(|| {
            PushError::Unavailable("no web push subscription configured".to_string())
        })
    }

    /// Re-validates the registration whenever it falls due, until `stop` flips to true.
    pub async fn run_refresh_loop(&self, mut stop: watch::Receiver<bool>) {
        loop {
            let delay = self.next_refresh_delay().await;
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(delay) => {
                    match self.refresh_due_registration().await {
                        Ok(Some(token)) => {
                            let _ = self.events.send(BackendEvent::TokenRefreshed(token));
                        }
                        Ok(None) => {}
                        Err(error) => log::warn!("[Fcm] scheduled token refresh failed: {error}"),
                    }
                }
            }
        }
        log::debug!("[Fcm] refresh loop stopped");
    }

    async fn next_refresh_delay(&self) -> Duration {
        let state = self.state.lock().await;
        let Some(registration) = state.registration.as_ref() else {
            return Duration::from_secs(FIS_IDLE_RECHECK_SECS);
        };
        Duration::from_secs(registration_refresh_delay_secs(
            registration.issued_at,
            unix_now_secs(),
        ))
    }

    /// `Some` only when FCM answered the update with a different token.
    async fn refresh_due_registration(&self) -> PushResult<Option<String>> {
        let mut state = self.state.lock().await;
        let Some(previous) = state
            .registration
            .as_ref()
            .filter(|registration| registration_is_due(registration.issued_at, unix_now_secs()))
            .map(|registration| registration.token.clone())
        else {
            return Ok(None);
        };
        let token = self.register(&mut state).await?;
        Ok((token != previous).then_some(token))
    }

    async fn create_installation(&self) -> PushResult<Installation> {
        let fid = generate_fid();
        log::info!("[Fcm] registering installation");
        let response = self
            .client
            .post(self.installations_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&CreateInstallationWire {
                fid: &fid,
                auth_version: FIS_AUTH_VERSION,
                app_id: &self.config.app_id,
                sdk_version: FIS_SDK_VERSION,
            })
            .send()
            .await?;
        let wire: InstallationWire = ensure_success(response).await?.json().await?;
        Ok(Installation {
            fid: wire.fid,
            refresh_token: wire.refresh_token,
            auth_token: wire.auth_token.token,
            expires_at: unix_now_secs().saturating_add(parse_expires_in(&wire.auth_token.expires_in)),
        })
    }

    /// Installation auth token with at least the refresh margin left.
    async fn auth_token(&self, installation: &mut Installation) -> PushResult<String> {
        if unix_now_secs().saturating_add(FIS_REFRESH_MARGIN_SECS) < installation.expires_at {
            return Ok(installation.auth_token.clone());
        }
        let url = format!(
            "{}/{}/authTokens:generate",
            self.installations_url(),
            installation.fid
        );
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .header(
                "Authorization",
                format!("{FIS_AUTH_VERSION} {}", installation.refresh_token),
            )
            .json(&GenerateAuthTokenWire {
                installation: InstallationInfoWire {
                    sdk_version: FIS_SDK_VERSION,
                },
            })
            .send()
            .await?;
        let wire: AuthTokenWire = ensure_success(response).await?.json().await?;
        installation.auth_token = wire.token;
        installation.expires_at = unix_now_secs().saturating_add(parse_expires_in(&wire.expires_in));
        Ok(installation.auth_token.clone())
    }

    /// Updates the current registration, or creates one when there is none or
    /// FCM no longer accepts the old token.
    async fn register(&self, state: &mut BackendState) -> PushResult<String> {
        let subscription = self.subscription()?;
        if state.installation.is_none() {
            state.installation = Some(self.create_installation().await?);
        }
        let installation = state.installation.as_mut().ok_or(PushError::NotRegistered)?;
        let auth_token = self.auth_token(installation).await?;

        if let Some(previous) = state.registration.take() {
            log::info!("[Fcm] updating registration");
            match self
                .send_registration(Some(&previous.token), &auth_token, subscription)
                .await
            {
                Ok(token) => {
                    state.registration = Some(Registration {
                        token: token.clone(),
                        issued_at: unix_now_secs(),
                    });
                    return Ok(token);
                }
                Err(PushError::Rejected { status, .. }) => {
                    log::warn!("[Fcm] registration update rejected (HTTP {status}); registering again");
                }
                Err(error) => {
                    state.registration = Some(previous);
                    return Err(error);
                }
            }
        }

        log::info!("[Fcm] creating registration");
        let token = self
            .send_registration(None, &auth_token, subscription)
            .await?;
        state.registration = Some(Registration {
            token: token.clone(),
            issued_at: unix_now_secs(),
        });
        Ok(token)
    }

    async fn send_registration(
        &self,
        existing: Option<&str>,
        auth_token: &str,
        subscription: &WebPushSubscription,
    ) -> PushResult<String> {
        let request = match existing {
            Some(token) => self
                .client
                .patch(format!("{}/{token}", self.registrations_url())),
            None => self.client.post(self.registrations_url()),
        };
        let response = request
            .header("x-goog-api-key", &self.config.api_key)
            .header(
                "x-goog-firebase-installations-auth",
                format!("{FCM_AUTH_SCHEME} {auth_token}"),
            )
            .json(&RegistrationRequestWire::from(subscription))
            .send()
            .await?;
        let wire: RegistrationWire = ensure_success(response).await?.json().await?;
        if wire.token.is_empty() {
            return Err(PushError::Unavailable(
                "push backend returned an empty registration token".to_string(),
            ));
        }
        Ok(wire.token)
    }
}

#[async_trait]
impl PushBackend for FirebaseRestBackend {
    async fn ready(&self) -> PushResult<()> {
        if self.config.project_id.is_empty() || self.config.api_key.is_empty() {
            return Err(PushError::Unavailable(
                "push backend project is not configured".to_string(),
            ));
        }
        self.subscription()?;
        Ok(())
    }

    async fn ensure_registered(&self) -> PushResult<()> {
        let mut state = self.state.lock().await;
        if state.installation.is_none() {
            state.installation = Some(self.create_installation().await?);
        }
        Ok(())
    }

    /// Background delivery belongs to the platform push service; nothing to install.
    async fn install_background_handler(&self) -> PushResult<()> {
        Ok(())
    }

    async fn fetch_token(&self) -> PushResult<String> {
        let mut state = self.state.lock().await;
        if let Some(registration) = state.registration.as_ref() {
            if !registration_is_due(registration.issued_at, unix_now_secs()) {
                return Ok(registration.token.clone());
            }
        }
        self.register(&mut state).await
    }

    /// Deletes the FCM registration. The installation is kept, so the next
    /// fetch issues a new token for the same device.
    async fn delete_token(&self) -> PushResult<()> {
        let mut state = self.state.lock().await;
        let Some(registration) = state.registration.take() else {
            return Ok(());
        };
        let installation = state.installation.as_mut().ok_or(PushError::NotRegistered)?;
        let auth_token = self.auth_token(installation).await?;
        let response = self
            .client
            .delete(format!("{}/{}", self.registrations_url(), registration.token))
            .header("x-goog-api-key", &self.config.api_key)
            .header(
                "x-goog-firebase-installations-auth",
                format!("{FCM_AUTH_SCHEME} {auth_token}"),
            )
            .send()
            .await?;
        ensure_success(response).await?;
        log::info!("[Fcm] registration deleted");
        Ok(())
    }

    /// Taps are handled by the platform push service, so there is never one to report.
    async fn initial_notification(&self) -> PushResult<Option<InboundMessage>> {
        Ok(None)
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.events.subscribe()
    }
}

async fn ensure_success(response: reqwest::Response) -> PushResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unable to read response body>".to_string());
    Err(PushError::Rejected {
        status: status.as_u16(),
        body: truncate_message(&body, 200),
    })
}

/// 17 random bytes with the `0111` header nibble, base64url, first 22 chars.
fn generate_fid() -> String {
    let mut bytes: [u8; 17] = rand::random();
    bytes[0] = 0b0111_0000 | (bytes[0] & 0b0000_1111);
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
    encoded.chars().take(22).collect()
}

/// `"604800s"` -> 604800; anything unparsable counts as already expired.
fn parse_expires_in(raw: &str) -> u64 {
    raw.trim().trim_end_matches('s').parse::<f64>().map_or(0, |secs| secs.max(0.0) as u64)
}

fn registration_is_due(issued_at: u64, now: u64) -> bool {
    now >= issued_at.saturating_add(FCM_TOKEN_REFRESH_SECS)
}

fn registration_refresh_delay_secs(issued_at: u64, now: u64) -> u64 {
    issued_at
        .saturating_add(FCM_TOKEN_REFRESH_SECS)
        .saturating_sub(now)
        .max(1)
}
