use serde::Serialize;

/// Whether the client holds a verified credential.
///
/// The credential and the linked flag only exist on `Authenticated`, so a
/// reader can never see one without the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum AuthStatus {
    /// Bootstrap has not finished.
    Unknown,
    Unauthenticated,
    Authenticated {
        credential: String,
        linked: bool,
    },
}

impl AuthStatus {
    /// Variant name without the credential, for logs and display.
    pub fn label(&self) -> &'static str {
        match self {
            AuthStatus::Unknown => "unknown",
            AuthStatus::Unauthenticated => "unauthenticated",
            AuthStatus::Authenticated { .. } => "authenticated",
        }
    }
}

/// Internal state owned by the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub status: AuthStatus,
    pub refreshing: bool,
    /// Bumped whenever `set_tokens` or `logout` replaces the credential.
    /// Async results started under an older generation are dropped.
    pub generation: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: AuthStatus::Unknown,
            refreshing: false,
            generation: 0,
        }
    }
}

impl SessionState {
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status.clone(),
            refreshing: self.refreshing,
        }
    }

    pub fn credential(&self) -> Option<&str> {
        match self.status {
            AuthStatus::Authenticated { ref credential, .. } => Some(credential),
            _ => None,
        }
    }
}

/// Read-only view of the session published to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: AuthStatus,
    pub refreshing: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        SessionState::default().snapshot()
    }
}

impl SessionSnapshot {
    pub fn status(&self) -> &AuthStatus {
        &self.status
    }

    /// Bearer credential for protected calls, if authenticated.
    pub fn credential(&self) -> Option<&str> {
        match self.status {
            AuthStatus::Authenticated { ref credential, .. } => Some(credential),
            _ => None,
        }
    }

    /// None until bootstrap has decided.
    pub fn is_authenticated(&self) -> Option<bool> {
        match self.status {
            AuthStatus::Unknown => None,
            AuthStatus::Unauthenticated => Some(false),
            AuthStatus::Authenticated { .. } => Some(true),
        }
    }

    /// Always false unless authenticated.
    pub fn linked(&self) -> bool {
        matches!(self.status, AuthStatus::Authenticated { linked: true, .. })
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    /// `Authorization` header value for protected calls.
    pub fn authorization_header(&self) -> Option<String> {
        self.credential().map(|c| format!("Bearer {}", c))
    }
}
