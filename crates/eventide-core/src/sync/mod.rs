//! Replica synchronization against the authoritative store.

mod engine;
mod libsql_http;
mod migration;
mod remote;

pub use engine::{SyncEngine, SyncMode, SyncOp, SyncOptions, SyncPlan, SyncSummary};
pub use libsql_http::LibSqlHttpRemote;
pub use migration::{find_orphans, migrate_ids, IdMigrationReport, OrphanReport};
pub use remote::{open_remote, RemoteStore, SqliteRemoteStore};
