use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Credential proving a signed-in user. Issued by the login flow and handed
/// to every API call explicitly.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    token: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    pub fn with_ttl(token: impl Into<String>, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(now + ttl),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Sessions without an expiry never expire locally; the server may still reject them.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_blank(&self) -> bool {
        self.token.trim().is_empty()
    }
}

// Keep the token out of logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Missing,
    Expired,
    Present,
}

impl CredentialStatus {
    pub fn of(session: Option<&Session>, now: DateTime<Utc>) -> Self {
        match session {
            None => CredentialStatus::Missing,
            Some(session) if session.is_blank() => CredentialStatus::Missing,
            Some(session) if session.is_expired(now) => CredentialStatus::Expired,
            Some(_) => CredentialStatus::Present,
        }
    }
}
