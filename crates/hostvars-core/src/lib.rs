//! hostvars-core: in-memory host inventory with periodic persistence
//!
//! Hostgroups contain hosts, hosts carry string facts. The `Inventory`
//! guards all of it behind one reader/writer lock while a background flush
//! scheduler writes full snapshots to the datastore file.

pub mod config;
pub mod error;
pub mod flush;
pub mod inventory;
pub mod model;
pub mod persist;

pub use config::InventoryConfig;
pub use error::CoreError;
pub use flush::FlushState;
pub use inventory::{Inventory, InventoryState};
pub use model::{Facts, Host, HostGroup};
pub use persist::{Datastore, FileDatastore, Snapshot};
