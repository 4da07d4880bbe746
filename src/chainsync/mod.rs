//! Chainsync: mirrors a Hyperdrive pool into Postgres.
//!
//! - `acquire`: the block-following ETL loop
//! - `db` / `table`: the `Database` aggregate and per-table queries
//! - `convert`: pool state and events to rows
//! - `export`: CSV dumps of every table

pub mod acquire;
pub mod convert;
pub mod db;
pub mod export;
pub mod model;
pub mod table;

pub use acquire::{acquire_data, AcquireConfig};
pub use db::Database;
pub use model::ChainsyncTable;
