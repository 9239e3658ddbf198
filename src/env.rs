//! Environment variable names understood by [`options_from_env`].
//!
//! These are purely helpers; [`StoreOptions`] can always be built by hand.

use crate::database::Database;
use crate::driver::DriverKind;
use crate::store::StoreOptions;
use std::sync::Arc;

/// Target table name. Defaults to [`DEFAULT_TABLE_NAME`].
pub const LOG_STORE_TABLE_ENV: &str = "LOG_STORE_TABLE";

/// Explicit driver kind, e.g. `postgres` or `mssql`. When unset the
/// kind reported by the database handle is used.
pub const LOG_STORE_DRIVER_ENV: &str = "LOG_STORE_DRIVER";

/// Create the table on startup when set to a true value.
pub const LOG_STORE_AUTOMIGRATE_ENV: &str = "LOG_STORE_AUTOMIGRATE";

/// Echo generated SQL and errors when set to a true value.
pub const LOG_STORE_DEBUG_ENV: &str = "LOG_STORE_DEBUG";

pub const DEFAULT_TABLE_NAME: &str = "log";

/// Build [`StoreOptions`] for `database` from the process environment.
pub fn options_from_env(database: Arc<dyn Database>) -> StoreOptions {
    options_from_lookup(database, |key| std::env::var(key).ok())
}

/// Build [`StoreOptions`] for `database`, reading settings through `lookup`.
pub fn options_from_lookup<F>(database: Arc<dyn Database>, lookup: F) -> StoreOptions
where
    F: Fn(&str) -> Option<String>,
{
    let mut options = StoreOptions::new()
        .with_table_name(lookup(LOG_STORE_TABLE_ENV).unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()))
        .with_database(database)
        .with_auto_migrate(lookup(LOG_STORE_AUTOMIGRATE_ENV).is_some_and(|v| is_truthy(&v)))
        .with_debug(lookup(LOG_STORE_DEBUG_ENV).is_some_and(|v| is_truthy(&v)));

    if let Some(driver) = lookup(LOG_STORE_DRIVER_ENV).filter(|v| !v.trim().is_empty()) {
        options = options.with_driver(DriverKind::from_name(&driver));
    }

    options
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
