pub mod entry;
pub mod driver;
pub mod database;
pub mod dialect;
pub mod error;
pub mod store;
pub mod handler;
pub mod layer;

#[cfg(feature = "sqlx")]
pub mod pool;

pub mod recording;
pub mod env;
pub mod init;

pub use database::{BoxError, Database, SqlValue};
pub use driver::DriverKind;
pub use entry::{Level, LogEntry};
pub use error::{ConfigError, StoreError};
pub use handler::{Attr, AttrValue, Record, StoreHandler};
pub use layer::StoreLayer;
pub use store::{Store, StoreOptions};

#[cfg(feature = "sqlx")]
pub use pool::SqlxDatabase;
