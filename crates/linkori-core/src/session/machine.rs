//! Session transitions as a pure function.
//!
//! `transition` maps the current state and one event to the next state and
//! the side effects the driver must run. It performs no I/O, so every rule
//! here is testable without a runtime.

use crate::api::Verification;

use super::state::{AuthStatus, SessionState};

/// Why a credential is being verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOrigin {
    /// Loaded from the store at bootstrap. Rejection escalates to refresh.
    Restored,
    /// Handed in through `set_tokens`. Rejection logs out.
    Assigned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Bootstrap read the store.
    Restored(Option<String>),
    TokensSet(Option<String>),
    LoggedOut,
    Verified {
        credential: String,
        verification: Verification,
        origin: VerifyOrigin,
        generation: u64,
    },
    RefreshStarted,
    /// A refreshed credential that has already passed verification.
    RefreshSucceeded {
        credential: String,
        linked: bool,
        generation: u64,
    },
    RefreshFailed {
        generation: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Persist(String),
    ClearStore,
    Verify {
        credential: String,
        origin: VerifyOrigin,
        generation: u64,
    },
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: SessionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn unchanged(state: &SessionState) -> Self {
        Self {
            state: state.clone(),
            effects: Vec::new(),
        }
    }
}

pub fn transition(state: &SessionState, event: Event) -> Transition {
    match event {
        Event::Restored(credential) => restored(state, credential),
        Event::TokensSet(Some(credential)) if !credential.is_empty() => assigned(state, credential),
        Event::TokensSet(_) | Event::LoggedOut => logged_out(state),
        Event::Verified {
            credential,
            verification,
            origin,
            generation,
        } => {
            if generation != state.generation {
                return Transition::unchanged(state);
            }
            verified(state, credential, verification, origin)
        }
        Event::RefreshStarted => Transition {
            state: SessionState {
                refreshing: true,
                ..state.clone()
            },
            effects: Vec::new(),
        },
        Event::RefreshSucceeded {
            credential,
            linked,
            generation,
        } => {
            if generation != state.generation {
                return Transition::unchanged(state);
            }
            Transition {
                state: SessionState {
                    status: AuthStatus::Authenticated {
                        credential: credential.clone(),
                        linked,
                    },
                    refreshing: false,
                    generation: state.generation,
                },
                effects: vec![Effect::Persist(credential)],
            }
        }
        Event::RefreshFailed { generation } => {
            if generation != state.generation {
                return Transition::unchanged(state);
            }
            logged_out(state)
        }
    }
}

fn restored(state: &SessionState, credential: Option<String>) -> Transition {
    // Anything that already decided the session wins over bootstrap.
    if state.status != AuthStatus::Unknown {
        return Transition::unchanged(state);
    }
    match credential.filter(|c| !c.is_empty()) {
        Some(credential) => Transition {
            state: state.clone(),
            effects: vec![Effect::Verify {
                credential,
                origin: VerifyOrigin::Restored,
                generation: state.generation,
            }],
        },
        None => Transition {
            state: SessionState {
                status: AuthStatus::Unauthenticated,
                ..state.clone()
            },
            effects: Vec::new(),
        },
    }
}

fn assigned(state: &SessionState, credential: String) -> Transition {
    let generation = state.generation + 1;
    // Re-assigning the current credential keeps its known linked flag.
    let linked = match state.status {
        AuthStatus::Authenticated {
            credential: ref current,
            linked,
        } if *current == credential => linked,
        _ => false,
    };
    Transition {
        state: SessionState {
            status: AuthStatus::Authenticated {
                credential: credential.clone(),
                linked,
            },
            refreshing: false,
            generation,
        },
        effects: vec![
            Effect::Persist(credential.clone()),
            Effect::Verify {
                credential,
                origin: VerifyOrigin::Assigned,
                generation,
            },
        ],
    }
}

fn logged_out(state: &SessionState) -> Transition {
    let already_clean = state.status == AuthStatus::Unauthenticated && !state.refreshing;
    Transition {
        state: SessionState {
            status: AuthStatus::Unauthenticated,
            refreshing: false,
            generation: if already_clean {
                state.generation
            } else {
                state.generation + 1
            },
        },
        effects: vec![Effect::ClearStore],
    }
}

fn verified(
    state: &SessionState,
    credential: String,
    verification: Verification,
    origin: VerifyOrigin,
) -> Transition {
    match origin {
        VerifyOrigin::Restored => {
            if state.status != AuthStatus::Unknown {
                return Transition::unchanged(state);
            }
            if verification.valid {
                Transition {
                    state: SessionState {
                        status: AuthStatus::Authenticated {
                            credential,
                            linked: verification.linked,
                        },
                        ..state.clone()
                    },
                    effects: Vec::new(),
                }
            } else {
                Transition {
                    state: SessionState {
                        refreshing: true,
                        ..state.clone()
                    },
                    effects: vec![Effect::Refresh],
                }
            }
        }
        VerifyOrigin::Assigned => {
            if state.credential() != Some(credential.as_str()) {
                return Transition::unchanged(state);
            }
            if verification.valid {
                Transition {
                    state: SessionState {
                        status: AuthStatus::Authenticated {
                            credential,
                            linked: verification.linked,
                        },
                        ..state.clone()
                    },
                    effects: Vec::new(),
                }
            } else {
                logged_out(state)
            }
        }
    }
}
