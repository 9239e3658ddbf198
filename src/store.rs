use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::dialect;
use crate::driver::DriverKind;
use crate::entry::{truncate_message, Level, LogEntry};
use crate::error::{ConfigError, StoreError};

/// Context stored when the caller's context cannot be encoded as JSON.
pub const CONTEXT_ENCODE_ERROR: &str = "JSON encode error";

/// Options for [`Store::new`].
///
/// `table_name` and `database` are required. When `driver` is `None`
/// the kind is taken from [`Database::driver_name`].
#[derive(Clone, Default)]
pub struct StoreOptions {
    pub table_name: String,
    pub database: Option<Arc<dyn Database>>,
    pub driver: Option<DriverKind>,
    pub auto_migrate: bool,
    pub debug: bool,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn with_database(mut self, database: Arc<dyn Database>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_driver(mut self, driver: DriverKind) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Create the log table while constructing the store.
    pub fn with_auto_migrate(mut self, auto_migrate: bool) -> Self {
        self.auto_migrate = auto_migrate;
        self
    }

    /// Echo generated SQL and execution errors as `tracing` events.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl std::fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreOptions")
            .field("table_name", &self.table_name)
            .field("database", &self.database.as_ref().map(|db| db.driver_name()))
            .field("driver", &self.driver)
            .field("auto_migrate", &self.auto_migrate)
            .field("debug", &self.debug)
            .finish()
    }
}

/// Append-only log table over a [`Database`] handle.
///
/// The store never closes the handle and keeps no state besides its
/// configuration, so it can be shared behind an `Arc` and used from many
/// tasks at once.
pub struct Store {
    table_name: String,
    database: Arc<dyn Database>,
    driver: DriverKind,
    debug: AtomicBool,
}

impl Store {
    /// Validate `options` and build a store.
    ///
    /// **Returns**
    /// - `Err(StoreError::Config(..))` when the table name is missing or
    ///   malformed, the database handle is missing, or no driver kind can
    ///   be determined. Nothing is executed in that case.
    /// - `Err(StoreError::Database(..))` when `auto_migrate` is set and
    ///   creating the table failed.
    pub async fn new(options: StoreOptions) -> Result<Self, StoreError> {
        let StoreOptions {
            table_name,
            database,
            driver,
            auto_migrate,
            debug,
        } = options;

        if table_name.is_empty() {
            return Err(ConfigError::MissingTableName.into());
        }
        if !table_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::InvalidTableName(table_name).into());
        }

        let database = database.ok_or(ConfigError::MissingDatabase)?;
        let driver = match driver {
            Some(driver) => driver,
            None => database
                .driver_name()
                .map(DriverKind::from_name)
                .ok_or(ConfigError::UndeterminedDriver)?,
        };

        let store = Store {
            table_name,
            database,
            driver,
            debug: AtomicBool::new(debug),
        };

        if auto_migrate {
            store.auto_migrate().await?;
        }

        Ok(store)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn driver(&self) -> &DriverKind {
        &self.driver
    }

    pub fn enable_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// DDL that [`Store::auto_migrate`] executes.
    pub fn create_table_sql(&self) -> Result<String, dialect::DialectError> {
        dialect::create_table_sql(&self.table_name, &self.driver)
    }

    /// Create the log table if it does not exist yet. Safe to call repeatedly.
    pub async fn auto_migrate(&self) -> Result<(), StoreError> {
        let sql = self.create_table_sql().map_err(|err| self.report(err.into()))?;
        self.run(&sql, &[]).await
    }

    /// Persist `entry`, filling in its id and time when they are unset.
    ///
    /// The failed statement is not retried; the driver error is handed
    /// back once.
    ///
    /// # Truncation
    ///
    /// A message longer than [`MESSAGE_MAX_LEN`](crate::entry::MESSAGE_MAX_LEN)
    /// characters is cut to that length, on a character boundary, before
    /// the row is written. `entry.message` holds the stored text afterwards.
    pub async fn insert(&self, entry: &mut LogEntry) -> Result<(), StoreError> {
        if entry.id.is_empty() {
            entry.id = Uuid::now_v7().simple().to_string();
        }
        if entry.time.is_none() {
            entry.time = Some(Utc::now());
        }
        truncate_message(&mut entry.message);

        let statement = dialect::insert_statement(&self.table_name, &self.driver, entry)
            .map_err(|err| self.report(err.into()))?;
        self.run(&statement.sql, &statement.params).await
    }

    async fn run(&self, sql: &str, params: &[crate::database::SqlValue]) -> Result<(), StoreError> {
        if self.is_debug() {
            info!(table = %self.table_name, "{}", sql);
        }

        match self.database.execute(sql, params).await {
            Ok(_) => Ok(()),
            Err(err) => Err(self.report(StoreError::Database(err))),
        }
    }

    fn report(&self, err: StoreError) -> StoreError {
        if self.is_debug() {
            error!(table = %self.table_name, "{}", err);
        }
        err
    }

    async fn log_at(&self, level: Level, message: &str, context: String) -> Result<(), StoreError> {
        let mut entry = LogEntry::new(level, message).with_context(context);
        self.insert(&mut entry).await
    }

    pub async fn trace(&self, message: &str) -> Result<(), StoreError> {
        self.log_at(Level::Trace, message, String::new()).await
    }

    pub async fn trace_with_context<C>(&self, message: &str, context: &C) -> Result<(), StoreError>
    where
        C: Serialize + ?Sized,
    {
        self.log_at(Level::Trace, message, encode_context(context)).await
    }

    pub async fn debug(&self, message: &str) -> Result<(), StoreError> {
        self.log_at(Level::Debug, message, String::new()).await
    }

    pub async fn debug_with_context<C>(&self, message: &str, context: &C) -> Result<(), StoreError>
    where
        C: Serialize + ?Sized,
    {
        self.log_at(Level::Debug, message, encode_context(context)).await
    }

    pub async fn info(&self, message: &str) -> Result<(), StoreError> {
        self.log_at(Level::Info, message, String::new()).await
    }

    pub async fn info_with_context<C>(&self, message: &str, context: &C) -> Result<(), StoreError>
    where
        C: Serialize + ?Sized,
    {
        self.log_at(Level::Info, message, encode_context(context)).await
    }

    pub async fn warning(&self, message: &str) -> Result<(), StoreError> {
        self.log_at(Level::Warning, message, String::new()).await
    }

    pub async fn warning_with_context<C>(&self, message: &str, context: &C) -> Result<(), StoreError>
    where
        C: Serialize + ?Sized,
    {
        self.log_at(Level::Warning, message, encode_context(context)).await
    }

    pub async fn error(&self, message: &str) -> Result<(), StoreError> {
        self.log_at(Level::Error, message, String::new()).await
    }

    pub async fn error_with_context<C>(&self, message: &str, context: &C) -> Result<(), StoreError>
    where
        C: Serialize + ?Sized,
    {
        self.log_at(Level::Error, message, encode_context(context)).await
    }

    /// Record a `fatal` entry. Unlike [`Store::panic`] this returns normally.
    pub async fn fatal(&self, message: &str) -> Result<(), StoreError> {
        self.log_at(Level::Fatal, message, String::new()).await
    }

    pub async fn fatal_with_context<C>(&self, message: &str, context: &C) -> Result<(), StoreError>
    where
        C: Serialize + ?Sized,
    {
        self.log_at(Level::Fatal, message, encode_context(context)).await
    }

    /// Record a `panic` entry, then panic with `message`.
    ///
    /// The insert is best effort: its outcome is ignored and the panic is
    /// raised even when the row could not be written.
    ///
    /// # Panics
    ///
    /// Always.
    pub async fn panic(&self, message: &str) {
        let _ = self.log_at(Level::Panic, message, String::new()).await;
        panic!("{}", message);
    }

    /// [`Store::panic`] with a context attached to the entry.
    ///
    /// # Panics
    ///
    /// Always.
    pub async fn panic_with_context<C>(&self, message: &str, context: &C)
    where
        C: Serialize + ?Sized,
    {
        let _ = self
            .log_at(Level::Panic, message, encode_context(context))
            .await;
        panic!("{}", message);
    }
}

/// JSON text for `context`, or [`CONTEXT_ENCODE_ERROR`] when it cannot be encoded.
pub fn encode_context<C: Serialize + ?Sized>(context: &C) -> String {
    serde_json::to_string(context).unwrap_or_else(|err| {
        warn!(error = %err, "log context could not be encoded");
        CONTEXT_ENCODE_ERROR.to_string()
    })
}
