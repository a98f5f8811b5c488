use std::sync::Arc;

use tokio::sync::{watch, OnceCell};

use crate::api::AuthClient;
use crate::auth::CredentialStore;

use super::manager::SessionManager;
use super::state::{AuthStatus, SessionSnapshot};

/// Single injection point for session state.
///
/// Consumers receive a provider (or a `SessionContext` taken from it) and
/// never touch the manager's internals. `mount` bootstraps the session the
/// first time it is called; later calls, from any task, wait for that same
/// bootstrap instead of starting another.
pub struct SessionProvider<C, S> {
    manager: SessionManager<C, S>,
    mounted: Arc<OnceCell<()>>,
}

impl<C, S> Clone for SessionProvider<C, S> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            mounted: Arc::clone(&self.mounted),
        }
    }
}

impl<C, S> SessionProvider<C, S>
where
    C: AuthClient,
    S: CredentialStore + 'static,
{
    pub fn new(manager: SessionManager<C, S>) -> Self {
        Self {
            manager,
            mounted: Arc::new(OnceCell::new()),
        }
    }

    /// Bootstrap once, then hand out the settled context.
    pub async fn mount(&self) -> SessionContext<C, S> {
        self.mounted
            .get_or_init(|| async {
                self.manager.bootstrap().await;
            })
            .await;
        self.context()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.initialized()
    }

    /// Context for the current snapshot. Before `mount` resolves the
    /// status reads as undetermined.
    pub fn context(&self) -> SessionContext<C, S> {
        SessionContext {
            snapshot: self.manager.snapshot(),
            manager: self.manager.clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.manager.subscribe()
    }

    pub fn manager(&self) -> &SessionManager<C, S> {
        &self.manager
    }
}

/// What a consumer sees: one consistent snapshot plus the actions it may
/// take. Take a new context after an action to observe its result.
pub struct SessionContext<C, S> {
    snapshot: SessionSnapshot,
    manager: SessionManager<C, S>,
}

impl<C, S> SessionContext<C, S>
where
    C: AuthClient,
    S: CredentialStore + 'static,
{
    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }

    pub fn status(&self) -> &AuthStatus {
        self.snapshot.status()
    }

    pub fn credential(&self) -> Option<&str> {
        self.snapshot.credential()
    }

    pub fn is_authenticated(&self) -> Option<bool> {
        self.snapshot.is_authenticated()
    }

    pub fn linked(&self) -> bool {
        self.snapshot.linked()
    }

    pub fn is_refreshing(&self) -> bool {
        self.snapshot.is_refreshing()
    }

    /// Client for calls the session does not make itself.
    pub fn client(&self) -> &C {
        self.manager.client()
    }

    pub async fn set_tokens(&self, credential: Option<String>) {
        self.manager.set_tokens(credential).await;
    }

    pub fn logout(&self) {
        self.manager.logout();
    }

    pub async fn refresh(&self) -> Option<String> {
        self.manager.refresh().await
    }

    /// Fresh context reflecting any change since this one was taken.
    pub fn reload(&self) -> Self {
        Self {
            snapshot: self.manager.snapshot(),
            manager: self.manager.clone(),
        }
    }
}
