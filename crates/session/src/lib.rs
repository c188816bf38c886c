//! Persisted client session
//!
//! Holds the credential pair, the signed-in user and their subscription
//! snapshot. The in-memory copy is authoritative for the running process;
//! every mutation is mirrored to a durable key-value store so the session
//! survives restarts.
//!
//! Lifecycle:
//! 1. Process start: `SessionStore::new()` → empty, not hydrated
//! 2. `hydrate()` loads the persisted record (or nothing) → hydrated
//! 3. Login/signup → `set_session()`
//! 4. Token refresh → `commit_refresh()` replaces the credential pair
//! 5. Logout or irrecoverable refresh failure → `clear()` / `invalidate()`

pub mod error;
pub mod model;
pub mod storage;
pub mod store;

pub use error::{Error, Result};
pub use model::{Credentials, Plan, Session, Subscription, User};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use store::{RefreshCommit, SessionGeneration, SessionStore};
