use serde::Serialize;

use crate::{core::redact_token, TokenProvider};

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct TokenDiagnostics {
    pub initialized: bool,
    /// Latest permission answer, not a live query.
    pub last_permission_result: bool,
    pub token_present: bool,
    /// Redacted; the full token never leaves the provider through here.
    pub token: Option<String>,
    pub last_error: Option<String>,
}

impl TokenDiagnostics {
    pub fn status_label(&self) -> String {
        if !self.initialized && self.last_error.is_some() {
            return "Push: Error".to_string();
        }
        if !self.last_permission_result {
            return "Push: No Permission".to_string();
        }
        match &self.token {
            Some(token) => format!("Push: {token}"),
            None => "Push: No Token".to_string(),
        }
    }
}

pub fn snapshot_token(provider: &TokenProvider) -> TokenDiagnostics {
    let token = provider.current_token();
    TokenDiagnostics {
        initialized: provider.is_initialized(),
        last_permission_result: provider.last_permission_result(),
        token_present: token.is_some(),
        token: token.as_deref().map(redact_token),
        last_error: provider.last_error(),
    }
}
