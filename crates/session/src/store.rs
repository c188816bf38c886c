//! Session store: in-memory session mirrored to durable storage
//!
//! Reads are synchronous snapshots so request interceptors never touch the
//! network or storage. Mutations (`set_session`, `update_credentials`,
//! `commit_refresh`, `clear`, `invalidate`) are serialized by an async
//! Mutex held across the memory update and the storage write.
//!
//! The generation counter identifies "which session" is current. It moves
//! on `set_session`, `clear` and on a hydrate that loads different
//! credentials, but not on a token refresh. The refresh coordinator reads
//! the generation together with the refresh token and presents it again
//! when committing, so a logout that lands while a refresh is on the wire
//! cannot be overwritten by the refreshed pair.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use common::Secret;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{Credentials, Session, Subscription, User};
use crate::storage::KeyValueStore;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";
pub const SUBSCRIPTION_KEY: &str = "subscription";

const SESSION_KEYS: [&str; 4] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY, SUBSCRIPTION_KEY];

/// Opaque marker for the session a caller observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionGeneration(u64);

/// Result of committing a refreshed credential pair.
#[derive(Debug)]
pub enum RefreshCommit {
    /// Memory and storage both hold the new pair.
    Committed,
    /// Memory holds the new pair; writing it to storage failed.
    CommittedUnpersisted(Error),
    /// The session changed since the refresh started; nothing was written.
    Discarded,
}

#[derive(Debug, Default)]
struct State {
    session: Session,
    generation: u64,
    hydrated: bool,
}

pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
    state: RwLock<State>,
    writes: Mutex<()>,
}

impl SessionStore {
    /// Empty, not-yet-hydrated store over `backend`.
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            state: RwLock::new(State::default()),
            writes: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.read().session.clone()
    }

    pub fn is_hydrated(&self) -> bool {
        self.read().hydrated
    }

    pub fn access_token(&self) -> Option<Secret<String>> {
        self.read().session.access_token().cloned()
    }

    pub fn generation(&self) -> SessionGeneration {
        SessionGeneration(self.read().generation)
    }

    /// Refresh token plus the generation it belongs to.
    pub fn refresh_credentials(&self) -> Option<(SessionGeneration, Secret<String>)> {
        let state = self.read();
        state
            .session
            .refresh_token()
            .map(|token| (SessionGeneration(state.generation), token.clone()))
    }

    /// Load the persisted session into memory.
    ///
    /// Always leaves the store hydrated, even when nothing was persisted or
    /// the storage read failed; a failed read keeps the in-memory session
    /// and returns the storage error.
    pub async fn hydrate(&self) -> Result<()> {
        let _guard = self.writes.lock().await;

        let values = match self.backend.multi_get(&SESSION_KEYS).await {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, "session storage unreadable, continuing signed out");
                self.write().hydrated = true;
                return Err(e);
            }
        };

        let mut values = values.into_iter();
        let access = values.next().flatten();
        let refresh = values.next().flatten();
        let user = values.next().flatten();
        let subscription = values.next().flatten();

        let credentials = match (access, refresh) {
            (Some(access), Some(refresh)) => Some(Credentials::new(access, refresh)),
            (None, None) => None,
            _ => {
                warn!("persisted session holds only one token of the pair, ignoring credentials");
                None
            }
        };

        let loaded = Session {
            credentials,
            user: parse_entry::<User>(USER_KEY, user),
            subscription: parse_entry::<Subscription>(SUBSCRIPTION_KEY, subscription),
        };

        let mut state = self.write();
        if state.session.credentials != loaded.credentials {
            state.generation += 1;
        }
        info!(authenticated = loaded.is_authenticated(), "session hydrated");
        state.session = loaded;
        state.hydrated = true;
        Ok(())
    }

    /// Replace the whole session after login or signup.
    ///
    /// Memory is updated first so the running process stays usable; a
    /// failed persist is returned to the caller.
    pub async fn set_session(
        &self,
        credentials: Credentials,
        user: User,
        subscription: Subscription,
    ) -> Result<()> {
        let user_json = to_json(&user)?;
        let subscription_json = to_json(&subscription)?;
        let entries = [
            (ACCESS_TOKEN_KEY, credentials.access().expose().clone()),
            (REFRESH_TOKEN_KEY, credentials.refresh().expose().clone()),
            (USER_KEY, user_json),
            (SUBSCRIPTION_KEY, subscription_json),
        ];

        let _guard = self.writes.lock().await;
        {
            let mut state = self.write();
            state.session = Session {
                credentials: Some(credentials),
                user: Some(user),
                subscription: Some(subscription),
            };
            state.generation += 1;
        }
        debug!("session replaced");

        self.backend
            .multi_set(&entries)
            .await
            .inspect_err(|e| warn!(error = %e, "failed to persist session"))
    }

    /// Replace only the credential pair, leaving user and subscription.
    ///
    /// Unguarded: the refresh coordinator commits through `commit_refresh`,
    /// which applies the same write only if the session is unchanged.
    pub async fn update_credentials(&self, credentials: Credentials) -> Result<()> {
        let _guard = self.writes.lock().await;
        self.replace_credentials(credentials).await
    }

    /// Replace the credential pair if the session is still the one observed
    /// at `generation`.
    pub async fn commit_refresh(
        &self,
        generation: SessionGeneration,
        credentials: Credentials,
    ) -> RefreshCommit {
        let _guard = self.writes.lock().await;
        {
            let state = self.read();
            if state.generation != generation.0 || state.session.credentials.is_none() {
                debug!("session changed during refresh, discarding refreshed credentials");
                return RefreshCommit::Discarded;
            }
        }

        match self.replace_credentials(credentials).await {
            Ok(()) => RefreshCommit::Committed,
            Err(e) => RefreshCommit::CommittedUnpersisted(e),
        }
    }

    /// Erase the session from memory and storage.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.writes.lock().await;
        self.reset();
        info!("session cleared");
        self.backend.clear().await
    }

    /// Clear the session only if it is still the one observed at
    /// `generation`. Returns whether anything was cleared.
    pub async fn invalidate(&self, generation: SessionGeneration) -> Result<bool> {
        let _guard = self.writes.lock().await;
        if self.read().generation != generation.0 {
            debug!("session already replaced, skipping invalidation");
            return Ok(false);
        }
        self.reset();
        info!("session invalidated");
        self.backend.clear().await?;
        Ok(true)
    }

    /// Swap the pair in memory, then persist it. Callers hold `writes`.
    async fn replace_credentials(&self, credentials: Credentials) -> Result<()> {
        self.write().session.credentials = Some(credentials.clone());
        self.persist_credentials(&credentials).await
    }

    async fn persist_credentials(&self, credentials: &Credentials) -> Result<()> {
        let entries = [
            (ACCESS_TOKEN_KEY, credentials.access().expose().clone()),
            (REFRESH_TOKEN_KEY, credentials.refresh().expose().clone()),
        ];
        self.backend
            .multi_set(&entries)
            .await
            .inspect_err(|e| warn!(error = %e, "failed to persist credentials"))
    }

    fn reset(&self) {
        let mut state = self.write();
        state.session = Session::default();
        state.generation += 1;
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("SessionStore")
            .field("authenticated", &state.session.is_authenticated())
            .field("hydrated", &state.hydrated)
            .field("generation", &state.generation)
            .finish()
    }
}

fn parse_entry<T: DeserializeOwned>(key: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "dropping unparseable session entry");
            None
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Parse(format!("serializing session entry: {e}")))
}
