//! The session manager drives the state machine.
//!
//! Events are applied under one lock; store writes happen inside the same
//! critical section, before the new snapshot is published, so the persisted
//! slot never lags a credential consumers can see. Network calls and
//! backoff sleeps run outside the lock and come back as further events.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::api::{AuthClient, Verification};
use crate::auth::CredentialStore;

use super::machine::{transition, Effect, Event, Transition};
use super::retry::{refresh_with_retry, RefreshFailure, RetryPolicy};
use super::state::{SessionSnapshot, SessionState};

/// A running refresh sequence. Every concurrent caller awaits `result`;
/// `task` stops the sequence once the session it serves is replaced.
struct RefreshFlight {
    result: Shared<BoxFuture<'static, Option<String>>>,
    task: AbortHandle,
}

struct Core {
    state: SessionState,
    inflight: Option<RefreshFlight>,
}

struct Inner<C, S> {
    client: C,
    store: S,
    policy: RetryPolicy,
    core: Mutex<Core>,
    updates: watch::Sender<SessionSnapshot>,
}

/// Owner of the process-wide session.
/// Clone is cheap - clones share the same session.
pub struct SessionManager<C, S> {
    inner: Arc<Inner<C, S>>,
}

impl<C, S> Clone for SessionManager<C, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, S> SessionManager<C, S>
where
    C: AuthClient,
    S: CredentialStore + 'static,
{
    pub fn new(client: C, store: S) -> Self {
        Self::with_policy(client, store, RetryPolicy::default())
    }

    pub fn with_policy(client: C, store: S, policy: RetryPolicy) -> Self {
        let state = SessionState::default();
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            inner: Arc::new(Inner {
                client,
                store,
                policy,
                core: Mutex::new(Core {
                    state,
                    inflight: None,
                }),
                updates,
            }),
        }
    }

    /// Current published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.updates.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.updates.subscribe()
    }

    pub fn client(&self) -> &C {
        &self.inner.client
    }

    /// Restore the persisted credential and settle on authenticated or
    /// unauthenticated. Never trusts the stored value without verifying it.
    pub async fn bootstrap(&self) -> SessionSnapshot {
        let restored = self.inner.store.load();
        debug!(found = restored.is_some(), "Bootstrapping session");
        self.drive(Event::Restored(restored)).await;
        self.snapshot()
    }

    /// Adopt a new credential (or drop it with `None`). The credential is
    /// published optimistically, then verified; rejection logs out.
    pub async fn set_tokens(&self, credential: Option<String>) {
        self.drive(Event::TokensSet(credential)).await;
    }

    /// Clear the credential from memory and the store. Idempotent.
    pub fn logout(&self) {
        let pending = self.inner.apply(Event::LoggedOut);
        debug_assert!(pending.is_empty());
    }

    /// Obtain a fresh credential through the refresh protocol.
    ///
    /// Only one refresh sequence runs at a time: a call made while one is in
    /// flight waits for that sequence and gets its result. Returns `None`
    /// when the session could not be renewed (the session is then logged
    /// out) or was replaced while the refresh ran. Replacing the session
    /// stops the running sequence, so a later call never overlaps it.
    pub async fn refresh(&self) -> Option<String> {
        let result = {
            let mut core = self.inner.lock_core();
            let joined = core.inflight.as_ref().map(|flight| flight.result.clone());
            if let Some(result) = joined {
                debug!("Joining in-flight refresh");
                result
            } else {
                self.inner.apply_locked(&mut core, Event::RefreshStarted);
                let generation = core.state.generation;
                let task = tokio::spawn(Inner::run_refresh(Arc::clone(&self.inner), generation));
                let abort = task.abort_handle();
                let result = async move {
                    task.await.unwrap_or_else(|e| {
                        debug!(cancelled = e.is_cancelled(), "Refresh task ended early");
                        None
                    })
                }
                .boxed()
                .shared();
                core.inflight = Some(RefreshFlight {
                    result: result.clone(),
                    task: abort,
                });
                result
            }
        };
        result.await
    }

    /// Apply an event and run its async effects until nothing is left.
    async fn drive(&self, event: Event) {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            for effect in self.inner.apply(event) {
                match effect {
                    Effect::Verify {
                        credential,
                        origin,
                        generation,
                    } => {
                        let verification = self.inner.verify(&credential).await;
                        queue.push_back(Event::Verified {
                            credential,
                            verification,
                            origin,
                            generation,
                        });
                    }
                    Effect::Refresh => {
                        self.refresh().await;
                    }
                    // Store effects already ran under the lock.
                    Effect::Persist(_) | Effect::ClearStore => {}
                }
            }
        }
    }
}

impl<C, S> Inner<C, S>
where
    C: AuthClient,
    S: CredentialStore + 'static,
{
    fn lock_core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, event: Event) -> Vec<Effect> {
        let mut core = self.lock_core();
        self.apply_locked(&mut core, event)
    }

    /// Transition, run store effects, publish. Returns the effects that
    /// need to await something.
    fn apply_locked(&self, core: &mut Core, event: Event) -> Vec<Effect> {
        // Completion events come from the refresh task itself.
        let from_refresh = matches!(
            event,
            Event::RefreshSucceeded { .. } | Event::RefreshFailed { .. }
        );
        let Transition { state, effects } = transition(&core.state, event);

        let mut pending = Vec::new();
        for effect in effects {
            match effect {
                Effect::Persist(ref credential) => self.store.save(credential),
                Effect::ClearStore => self.store.clear(),
                other => pending.push(other),
            }
        }

        if !state.refreshing {
            if let Some(flight) = core.inflight.take() {
                if !from_refresh && state.generation != core.state.generation {
                    debug!("Session replaced, stopping in-flight refresh");
                    flight.task.abort();
                }
            }
        }

        if state != core.state {
            if state.status.label() != core.state.status.label() {
                info!(
                    from = core.state.status.label(),
                    to = state.status.label(),
                    "Session status changed"
                );
            }
            debug!(
                status = state.status.label(),
                refreshing = state.refreshing,
                generation = state.generation,
                "Session updated"
            );
            core.state = state;
            self.updates.send_replace(core.state.snapshot());
        }

        pending
    }

    /// Verify, folding transport failures into "invalid".
    async fn verify(&self, credential: &str) -> Verification {
        match self.client.verify(credential).await {
            Ok(verification) => verification,
            Err(e) => {
                warn!(error = %e, "Verify failed, treating credential as invalid");
                Verification::invalid()
            }
        }
    }

    /// Body of the spawned refresh task. A panic inside the sequence still
    /// ends the refresh, so `refreshing` never outlives the task.
    async fn run_refresh(inner: Arc<Self>, generation: u64) -> Option<String> {
        let event = match AssertUnwindSafe(inner.refresh_sequence(generation))
            .catch_unwind()
            .await
        {
            Ok(event) => event,
            Err(_) => {
                warn!("Refresh sequence panicked, logging out");
                Event::RefreshFailed { generation }
            }
        };

        let mut core = inner.lock_core();
        inner.apply_locked(&mut core, event);
        if core.state.generation == generation {
            core.state.credential().map(str::to_owned)
        } else {
            None
        }
    }

    /// One refresh sequence: retry with backoff, then verify the new
    /// credential before accepting it.
    async fn refresh_sequence(&self, generation: u64) -> Event {
        match refresh_with_retry(&self.client, &self.policy).await {
            Ok(credential) => {
                let verification = self.verify(&credential).await;
                if verification.valid {
                    Event::RefreshSucceeded {
                        credential,
                        linked: verification.linked,
                        generation,
                    }
                } else {
                    warn!("Refreshed credential failed verification");
                    Event::RefreshFailed { generation }
                }
            }
            Err(RefreshFailure::Terminal(_)) => {
                info!("Refresh session rejected, logging out");
                Event::RefreshFailed { generation }
            }
            Err(RefreshFailure::Exhausted { attempts, .. }) => {
                info!(attempts = attempts, "Could not refresh session, logging out");
                Event::RefreshFailed { generation }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::api::ApiError;
    use crate::auth::MemoryStore;
    use crate::session::AuthStatus;

    const STALE: &str = "stale.token.aaa";
    const FRESH: &str = "fresh.token.bbb";
    const OTHER: &str = "other.token.ccc";

    /// Scripted backend: a set of tokens that verify, and a queue of
    /// refresh outcomes.
    #[derive(Default)]
    struct FakeClient {
        valid: Mutex<HashMap<String, bool>>,
        refresh_script: Mutex<VecDeque<Result<String, ApiError>>>,
        verify_calls: AtomicUsize,
        refresh_times: Mutex<Vec<Instant>>,
    }

    impl FakeClient {
        fn accepting(tokens: &[(&str, bool)]) -> Arc<Self> {
            let client = Self::default();
            {
                let mut valid = client.valid.lock().unwrap();
                for (token, linked) in tokens {
                    valid.insert(token.to_string(), *linked);
                }
            }
            Arc::new(client)
        }

        fn script(&self, outcomes: Vec<Result<String, ApiError>>) {
            self.refresh_script.lock().unwrap().extend(outcomes);
        }

        fn verify_calls(&self) -> usize {
            self.verify_calls.load(Ordering::SeqCst)
        }

        fn refresh_calls(&self) -> usize {
            self.refresh_times.lock().unwrap().len()
        }

        /// Gaps between consecutive refresh attempts.
        fn refresh_gaps(&self) -> Vec<Duration> {
            let times = self.refresh_times.lock().unwrap();
            times.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    impl AuthClient for FakeClient {
        async fn verify(&self, token: &str) -> Result<Verification, ApiError> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            let linked = self.valid.lock().unwrap().get(token).copied();
            Ok(match linked {
                Some(linked) => Verification::valid(linked),
                None => Verification::invalid(),
            })
        }

        async fn refresh(&self) -> Result<String, ApiError> {
            self.refresh_times.lock().unwrap().push(Instant::now());
            tokio::task::yield_now().await;
            let next = self.refresh_script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(ApiError::ServerError("unscripted".to_string())))
        }
    }

    fn server_error() -> Result<String, ApiError> {
        Err(ApiError::ServerError("503".to_string()))
    }

    fn manager(
        client: &Arc<FakeClient>,
        store: &Arc<MemoryStore>,
    ) -> SessionManager<Arc<FakeClient>, Arc<MemoryStore>> {
        SessionManager::new(Arc::clone(client), Arc::clone(store))
    }

    #[tokio::test]
    async fn test_bootstrap_without_persisted_credential() {
        let client = FakeClient::accepting(&[]);
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&client, &store);

        let snapshot = manager.bootstrap().await;

        assert_eq!(snapshot.status, AuthStatus::Unauthenticated);
        assert!(!snapshot.linked());
        assert_eq!(snapshot.credential(), None);
        assert_eq!(client.verify_calls(), 0);
        assert_eq!(client.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_with_valid_credential() {
        let client = FakeClient::accepting(&[(STALE, true)]);
        let store = Arc::new(MemoryStore::with_token(STALE));
        let manager = manager(&client, &store);

        let snapshot = manager.bootstrap().await;

        assert_eq!(
            snapshot.status,
            AuthStatus::Authenticated {
                credential: STALE.to_string(),
                linked: true
            }
        );
        assert_eq!(client.verify_calls(), 1);
        assert_eq!(client.refresh_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_refresh_succeeds_on_second_attempt() {
        let client = FakeClient::accepting(&[(FRESH, false)]);
        client.script(vec![server_error(), Ok(FRESH.to_string())]);
        let store = Arc::new(MemoryStore::with_token(STALE));
        let manager = manager(&client, &store);

        let start = Instant::now();
        let snapshot = manager.bootstrap().await;

        assert_eq!(snapshot.credential(), Some(FRESH));
        assert_eq!(snapshot.is_authenticated(), Some(true));
        assert!(!snapshot.is_refreshing());
        assert_eq!(store.load().as_deref(), Some(FRESH));
        assert_eq!(client.refresh_calls(), 2);
        assert_eq!(client.refresh_gaps(), vec![Duration::from_secs(1)]);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        // Stale credential, then the refreshed one.
        assert_eq!(client.verify_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_exhausts_attempts_and_logs_out() {
        let client = FakeClient::accepting(&[]);
        client.script(vec![server_error(), server_error(), server_error(), server_error()]);
        let store = Arc::new(MemoryStore::with_token(STALE));
        let manager = manager(&client, &store);

        let start = Instant::now();
        let snapshot = manager.bootstrap().await;

        assert_eq!(snapshot.status, AuthStatus::Unauthenticated);
        assert_eq!(store.load(), None);
        assert_eq!(client.refresh_calls(), 4);
        assert_eq!(
            client.refresh_gaps(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_refresh_failure_does_not_retry() {
        let client = FakeClient::accepting(&[]);
        client.script(vec![Err(ApiError::Unauthorized), Ok(FRESH.to_string())]);
        let store = Arc::new(MemoryStore::with_token(STALE));
        let manager = manager(&client, &store);

        let start = Instant::now();
        let snapshot = manager.bootstrap().await;

        assert_eq!(snapshot.status, AuthStatus::Unauthenticated);
        assert_eq!(client.refresh_calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(store.load(), None);
    }

    #[tokio::test]
    async fn test_refreshed_credential_failing_verification_logs_out() {
        let client = FakeClient::accepting(&[]);
        client.script(vec![Ok(FRESH.to_string())]);
        let store = Arc::new(MemoryStore::with_token(STALE));
        let manager = manager(&client, &store);

        let snapshot = manager.bootstrap().await;

        assert_eq!(snapshot.status, AuthStatus::Unauthenticated);
        assert_eq!(store.load(), None);
        assert_eq!(client.refresh_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_refreshes_share_one_sequence() {
        let client = FakeClient::accepting(&[(FRESH, true)]);
        client.script(vec![server_error(), Ok(FRESH.to_string())]);
        let store = Arc::new(MemoryStore::with_token(STALE));
        let manager = manager(&client, &store);

        let mut updates = manager.subscribe();
        let (bootstrapped, manual) = tokio::join!(manager.bootstrap(), async {
            updates
                .wait_for(|s| s.is_refreshing())
                .await
                .expect("manager alive");
            manager.refresh().await
        });

        assert_eq!(client.refresh_calls(), 2);
        assert_eq!(manual.as_deref(), Some(FRESH));
        assert_eq!(bootstrapped.credential(), Some(FRESH));
        assert!(!bootstrapped.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_joins_manual_refresh_in_flight() {
        let client = FakeClient::accepting(&[(FRESH, true)]);
        client.script(vec![server_error(), Ok(FRESH.to_string())]);
        let store = Arc::new(MemoryStore::with_token(STALE));
        let manager = manager(&client, &store);

        // The manual refresh registers its sequence before bootstrap's
        // verify of the stale credential comes back rejected.
        let (manual, bootstrapped) = tokio::join!(manager.refresh(), manager.bootstrap());

        assert_eq!(client.refresh_calls(), 2);
        assert_eq!(client.refresh_gaps(), vec![Duration::from_secs(1)]);
        assert_eq!(manual.as_deref(), Some(FRESH));
        assert_eq!(bootstrapped.credential(), Some(FRESH));
        assert!(bootstrapped.linked());
        assert!(!bootstrapped.is_refreshing());
        assert_eq!(store.load().as_deref(), Some(FRESH));
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_stops_running_refresh() {
        let client = FakeClient::accepting(&[]);
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&client, &store);

        let start = Instant::now();
        let (first, second) = tokio::join!(manager.refresh(), async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            manager.logout();
            manager.refresh().await
        });

        assert_eq!(first, None);
        assert_eq!(second, None);
        // One attempt from the replaced sequence, then four from the new one
        // with no interleaving.
        assert_eq!(client.refresh_calls(), 5);
        assert_eq!(
            client.refresh_gaps(),
            vec![
                Duration::from_millis(500),
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
        assert_eq!(start.elapsed(), Duration::from_millis(7500));
        assert!(!manager.snapshot().is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_tokens_stops_running_refresh() {
        let client = FakeClient::accepting(&[(OTHER, true)]);
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&client, &store);

        let (refreshed, _) = tokio::join!(manager.refresh(), async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            manager.set_tokens(Some(OTHER.to_string())).await;
        });
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(refreshed, None);
        assert_eq!(client.refresh_calls(), 1);
        assert_eq!(manager.snapshot().credential(), Some(OTHER));
        assert_eq!(store.load().as_deref(), Some(OTHER));
    }

    /// Backend whose refresh endpoint handler crashes.
    #[derive(Default)]
    struct PanickingClient {
        refresh_calls: AtomicUsize,
    }

    impl AuthClient for PanickingClient {
        async fn verify(&self, _token: &str) -> Result<Verification, ApiError> {
            Ok(Verification::invalid())
        }

        async fn refresh(&self) -> Result<String, ApiError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            panic!("refresh handler crashed");
        }
    }

    #[tokio::test]
    async fn test_panicking_refresh_ends_refreshing() {
        let client = Arc::new(PanickingClient::default());
        let store = Arc::new(MemoryStore::with_token(STALE));
        let manager = SessionManager::new(Arc::clone(&client), Arc::clone(&store));

        assert_eq!(manager.refresh().await, None);
        let snapshot = manager.snapshot();
        assert!(!snapshot.is_refreshing());
        assert_eq!(snapshot.status, AuthStatus::Unauthenticated);
        assert_eq!(store.load(), None);

        // The next call starts a new sequence instead of joining a dead one.
        assert_eq!(manager.refresh().await, None);
        assert!(!manager.snapshot().is_refreshing());
        assert_eq!(client.refresh_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_manual_refreshes_share_result() {
        let client = FakeClient::accepting(&[(FRESH, false)]);
        client.script(vec![Ok(FRESH.to_string()), Ok(OTHER.to_string())]);
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&client, &store);

        let (first, second) = tokio::join!(manager.refresh(), manager.refresh());

        assert_eq!(first.as_deref(), Some(FRESH));
        assert_eq!(second.as_deref(), Some(FRESH));
        assert_eq!(client.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_manual_refresh_failure_returns_none() {
        let client = FakeClient::accepting(&[(STALE, false)]);
        client.script(vec![Err(ApiError::Unauthorized)]);
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&client, &store);
        manager.set_tokens(Some(STALE.to_string())).await;

        assert_eq!(manager.refresh().await, None);
        assert_eq!(manager.snapshot().status, AuthStatus::Unauthenticated);
        assert_eq!(store.load(), None);
    }

    #[tokio::test]
    async fn test_logout_twice_is_same_state() {
        let client = FakeClient::accepting(&[(STALE, true)]);
        let store = Arc::new(MemoryStore::with_token(STALE));
        let manager = manager(&client, &store);
        manager.bootstrap().await;

        manager.logout();
        let once = manager.snapshot();
        manager.logout();
        let twice = manager.snapshot();

        assert_eq!(once, twice);
        assert_eq!(twice.status, AuthStatus::Unauthenticated);
        assert!(!twice.is_refreshing());
        assert_eq!(store.load(), None);
    }

    #[tokio::test]
    async fn test_set_tokens_round_trip() {
        let client = FakeClient::accepting(&[(FRESH, true)]);
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&client, &store);

        manager.set_tokens(Some(FRESH.to_string())).await;

        assert_eq!(manager.snapshot().credential(), Some(FRESH));
        assert!(manager.snapshot().linked());
        assert_eq!(store.load().as_deref(), Some(FRESH));
    }

    #[tokio::test]
    async fn test_set_tokens_rejected_falls_back_to_logout() {
        let client = FakeClient::accepting(&[]);
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&client, &store);

        manager.set_tokens(Some(OTHER.to_string())).await;

        assert_eq!(manager.snapshot().credential(), None);
        assert_eq!(manager.snapshot().status, AuthStatus::Unauthenticated);
        assert_eq!(store.load(), None);
    }

    #[tokio::test]
    async fn test_set_tokens_publishes_optimistically() {
        let client = FakeClient::accepting(&[(FRESH, false)]);
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&client, &store);

        let mut updates = manager.subscribe();
        let (_, optimistic) = tokio::join!(manager.set_tokens(Some(FRESH.to_string())), async {
            updates.changed().await.expect("manager alive");
            updates.borrow_and_update().clone()
        });

        assert_eq!(optimistic.credential(), Some(FRESH));
        assert_eq!(client.verify_calls(), 1);
    }

    #[tokio::test]
    async fn test_set_tokens_none_is_logout() {
        let client = FakeClient::accepting(&[(FRESH, true)]);
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&client, &store);
        manager.set_tokens(Some(FRESH.to_string())).await;

        manager.set_tokens(None).await;

        assert_eq!(manager.snapshot().status, AuthStatus::Unauthenticated);
        assert!(!manager.snapshot().linked());
        assert_eq!(store.load(), None);
    }

    #[tokio::test]
    async fn test_logout_during_verify_wins() {
        let client = FakeClient::accepting(&[(FRESH, true)]);
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&client, &store);

        tokio::join!(manager.set_tokens(Some(FRESH.to_string())), async {
            tokio::task::yield_now().await;
            manager.logout();
        });

        assert_eq!(manager.snapshot().status, AuthStatus::Unauthenticated);
        assert_eq!(store.load(), None);
    }

    #[tokio::test]
    async fn test_set_tokens_during_refresh_supersedes_it() {
        let client = FakeClient::accepting(&[(FRESH, false), (OTHER, true)]);
        client.script(vec![Ok(FRESH.to_string())]);
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&client, &store);

        let (refreshed, _) = tokio::join!(manager.refresh(), async {
            manager.set_tokens(Some(OTHER.to_string())).await;
        });

        assert_eq!(refreshed, None);
        assert_eq!(manager.snapshot().credential(), Some(OTHER));
        assert_eq!(store.load().as_deref(), Some(OTHER));
    }

    #[tokio::test]
    async fn test_snapshot_never_authenticated_without_credential() {
        let client = FakeClient::accepting(&[(FRESH, true)]);
        client.script(vec![Ok(FRESH.to_string())]);
        let store = Arc::new(MemoryStore::with_token(STALE));
        let manager = manager(&client, &store);

        let mut updates = manager.subscribe();
        let watcher = tokio::spawn(async move {
            let mut seen = Vec::new();
            while updates.changed().await.is_ok() {
                let snapshot = updates.borrow_and_update().clone();
                let done = snapshot.is_authenticated().is_some() && !snapshot.is_refreshing();
                seen.push(snapshot);
                if done {
                    break;
                }
            }
            seen
        });

        manager.bootstrap().await;
        let seen = watcher.await.expect("watcher finished");

        assert!(!seen.is_empty());
        for snapshot in &seen {
            if snapshot.is_authenticated() == Some(true) {
                assert!(snapshot.credential().is_some());
            } else {
                assert!(!snapshot.linked());
                assert_eq!(snapshot.credential(), None);
            }
        }
    }
}
