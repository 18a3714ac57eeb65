pub mod common;
pub mod dedup;
pub mod export;
pub mod ingest;
pub mod migrate;
pub mod orphans;
pub mod sync;
