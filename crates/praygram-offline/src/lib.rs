//! Praygram offline layer: a client-local buffer for prayers and reactions
//! created while disconnected.
//!
//! Three pieces:
//! - `store`: two JSON-backed lists (pending prayers, pending actions) behind
//!   a mutex so read-modify-write sequences never lose updates
//! - `merge`: read-time union of server data and unsynced local data
//! - `sync`: best-effort replay against the API once connectivity returns

pub mod merge;
pub mod store;
pub mod sync;

pub use merge::merge_offline_data;
pub use store::{ActionKind, OfflineAction, OfflinePrayer, OfflineStore, StoreError};
pub use sync::{SyncEngine, SyncError, SyncOutcome};
