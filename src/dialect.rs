//! SQL text for the log table, one template per backend.
//!
//! The four supported backends share the same five-column row shape, so
//! a handful of per-dialect templates cover everything the store needs.
//! Only the table name is ever spliced into the SQL text, and it is
//! always quoted with [`quote_identifier`]; row values travel as bound
//! parameters.

use chrono::{DateTime, Utc};

use crate::database::SqlValue;
use crate::driver::DriverKind;
use crate::entry::{
    LogEntry, COLUMN_CONTEXT, COLUMN_ID, COLUMN_LEVEL, COLUMN_MESSAGE, COLUMN_TIME, ID_MAX_LEN,
    LEVEL_MAX_LEN, MESSAGE_MAX_LEN,
};

/// Error returned when no SQL can be generated for a driver.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DialectError {
    #[error("unsupported driver '{0}'")]
    UnsupportedDriver(String),
}

/// A parameterized `INSERT` plus its values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Quote `name` as an identifier for `driver`.
///
/// The dialect's closing quote character is doubled inside the name, so
/// the result always parses as exactly one identifier.
pub fn quote_identifier(name: &str, driver: &DriverKind) -> Result<String, DialectError> {
    let quoted = match driver {
        DriverKind::Mysql => format!("`{}`", name.replace('`', "``")),
        DriverKind::Postgres | DriverKind::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
        DriverKind::Mssql => format!("[{}]", name.replace(']', "]]")),
        DriverKind::Unknown(other) => return Err(DialectError::UnsupportedDriver(other.clone())),
    };
    Ok(quoted)
}

/// Build the `CREATE TABLE IF NOT EXISTS` statement for the log table.
///
/// **Returns**
/// - The DDL text for MySQL, PostgreSQL, SQLite or MSSQL.
/// - `Err(DialectError::UnsupportedDriver)` for any other driver; no
///   fallback dialect is guessed.
pub fn create_table_sql(table: &str, driver: &DriverKind) -> Result<String, DialectError> {
    let q = |name: &str| quote_identifier(name, driver);
    let table_ident = q(table)?;

    let (string_type, text_type, time_type) = match driver {
        DriverKind::Mysql => ("varchar", "longtext", "datetime(6)"),
        DriverKind::Postgres => ("varchar", "text", "timestamptz(6)"),
        DriverKind::Sqlite => ("varchar", "text", "datetime"),
        DriverKind::Mssql => ("nvarchar", "nvarchar(max)", "datetime2(6)"),
        DriverKind::Unknown(other) => return Err(DialectError::UnsupportedDriver(other.clone())),
    };

    let columns = format!(
        "  {id} {s}({id_len}) NOT NULL PRIMARY KEY,\n  \
         {level} {s}({level_len}) NOT NULL,\n  \
         {message} {s}({message_len}) NOT NULL,\n  \
         {context} {text} NULL,\n  \
         {time} {time_type} NOT NULL",
        id = q(COLUMN_ID)?,
        level = q(COLUMN_LEVEL)?,
        message = q(COLUMN_MESSAGE)?,
        context = q(COLUMN_CONTEXT)?,
        time = q(COLUMN_TIME)?,
        s = string_type,
        text = text_type,
        id_len = ID_MAX_LEN,
        level_len = LEVEL_MAX_LEN,
        message_len = MESSAGE_MAX_LEN,
    );

    let sql = match driver {
        // SQL Server has no `CREATE TABLE IF NOT EXISTS`.
        DriverKind::Mssql => format!(
            "IF OBJECT_ID(N'{}', N'U') IS NULL\nCREATE TABLE {} (\n{}\n)",
            table_ident.replace('\'', "''"),
            table_ident,
            columns
        ),
        _ => format!("CREATE TABLE IF NOT EXISTS {} (\n{}\n)", table_ident, columns),
    };

    Ok(sql)
}

/// Build the single-row `INSERT` for `entry`.
///
/// Parameters are bound in column order: id, level, message, context,
/// time. An entry without a time is stamped with the current UTC time.
pub fn insert_statement(
    table: &str,
    driver: &DriverKind,
    entry: &LogEntry,
) -> Result<InsertStatement, DialectError> {
    let table_ident = quote_identifier(table, driver)?;
    let columns = [COLUMN_ID, COLUMN_LEVEL, COLUMN_MESSAGE, COLUMN_CONTEXT, COLUMN_TIME]
        .iter()
        .map(|c| quote_identifier(c, driver))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");

    let placeholders = match driver {
        DriverKind::Mysql | DriverKind::Sqlite => vec!["?".to_string(); 5],
        DriverKind::Postgres => vec![
            "$1".to_string(),
            "$2".to_string(),
            "$3".to_string(),
            "$4".to_string(),
            "CAST($5 AS TIMESTAMPTZ)".to_string(),
        ],
        DriverKind::Mssql => (1..=5).map(|i| format!("@P{}", i)).collect(),
        DriverKind::Unknown(other) => return Err(DialectError::UnsupportedDriver(other.clone())),
    };

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table_ident,
        columns,
        placeholders.join(", ")
    );

    let params = vec![
        SqlValue::Text(entry.id.clone()),
        SqlValue::Text(entry.level.as_str().to_string()),
        SqlValue::Text(entry.message.clone()),
        SqlValue::Text(entry.context.clone()),
        SqlValue::Timestamp(entry.time.unwrap_or_else(Utc::now)),
    ];

    Ok(InsertStatement { sql, params })
}

/// Text form of a timestamp for drivers that bind it as a string.
///
/// PostgreSQL gets an explicit `+00:00` offset so the `timestamptz` cast
/// does not depend on the session time zone.
pub fn timestamp_literal(time: &DateTime<Utc>, driver: &DriverKind) -> String {
    match driver {
        DriverKind::Postgres => time.format("%Y-%m-%d %H:%M:%S%.6f+00:00").to_string(),
        _ => time.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Level;
    use chrono::TimeZone;

    fn entry() -> LogEntry {
        LogEntry {
            id: "abc".to_string(),
            level: Level::Warning,
            message: "disk almost full".to_string(),
            context: "{\"free\":3}".to_string(),
            time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()),
        }
    }

    #[test]
    fn mysql_ddl_uses_longtext_and_backticks() {
        let sql = create_table_sql("log", &DriverKind::Mysql).unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `log` ("));
        assert!(sql.contains("`id` varchar(40) NOT NULL PRIMARY KEY"));
        assert!(sql.contains("`level` varchar(40) NOT NULL"));
        assert!(sql.contains("`message` varchar(510) NOT NULL"));
        assert!(sql.contains("`context` longtext NULL"));
        assert!(sql.contains("`time` datetime(6) NOT NULL"));
    }

    #[test]
    fn postgres_ddl_uses_timestamptz() {
        let sql = create_table_sql("log", &DriverKind::Postgres).unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"log\" ("));
        assert!(sql.contains("\"context\" text NULL"));
        assert!(sql.contains("\"time\" timestamptz(6) NOT NULL"));
        assert!(!sql.contains("longtext"));
    }

    #[test]
    fn sqlite_ddl_uses_datetime() {
        let sql = create_table_sql("log", &DriverKind::Sqlite).unwrap();
        assert!(sql.contains("\"time\" datetime NOT NULL"));
        assert_eq!(sql.matches("NOT NULL").count(), 4);
    }

    #[test]
    fn mssql_ddl_is_guarded_by_object_id() {
        let sql = create_table_sql("log", &DriverKind::Mssql).unwrap();
        assert!(sql.starts_with("IF OBJECT_ID(N'[log]', N'U') IS NULL"));
        assert!(sql.contains("CREATE TABLE [log] ("));
        assert!(sql.contains("[context] nvarchar(max) NULL"));
        assert!(sql.contains("[time] datetime2(6) NOT NULL"));
    }

    #[test]
    fn unknown_driver_is_an_error() {
        let kind = DriverKind::from_name("oracle");
        let err = create_table_sql("log", &kind).unwrap_err();
        assert_eq!(err.to_string(), "unsupported driver 'oracle'");
        assert!(insert_statement("log", &kind, &entry()).is_err());
    }

    #[test]
    fn identifiers_are_escaped() {
        assert_eq!(
            quote_identifier("we\"ird", &DriverKind::Postgres).unwrap(),
            "\"we\"\"ird\""
        );
        assert_eq!(quote_identifier("a`b", &DriverKind::Mysql).unwrap(), "`a``b`");
        assert_eq!(quote_identifier("a]b", &DriverKind::Mssql).unwrap(), "[a]]b]");
    }

    #[test]
    fn insert_placeholders_follow_dialect() {
        let e = entry();
        let mysql = insert_statement("log", &DriverKind::Mysql, &e).unwrap();
        assert_eq!(
            mysql.sql,
            "INSERT INTO `log` (`id`, `level`, `message`, `context`, `time`) VALUES (?, ?, ?, ?, ?)"
        );

        let pg = insert_statement("log", &DriverKind::Postgres, &e).unwrap();
        assert!(pg.sql.ends_with("VALUES ($1, $2, $3, $4, CAST($5 AS TIMESTAMPTZ))"));

        let mssql = insert_statement("log", &DriverKind::Mssql, &e).unwrap();
        assert!(mssql.sql.ends_with("VALUES (@P1, @P2, @P3, @P4, @P5)"));
    }

    #[test]
    fn insert_never_inlines_row_values() {
        let mut e = entry();
        e.message = "'); DROP TABLE log; --".to_string();
        let stmt = insert_statement("log", &DriverKind::Sqlite, &e).unwrap();
        assert!(!stmt.sql.contains("DROP"));
        assert_eq!(stmt.params.len(), 5);
        assert_eq!(stmt.params[0].as_text(), Some("abc"));
        assert_eq!(stmt.params[1].as_text(), Some("warning"));
        assert_eq!(stmt.params[2].as_text(), Some("'); DROP TABLE log; --"));
        assert_eq!(stmt.params[3].as_text(), Some("{\"free\":3}"));
        assert_eq!(stmt.params[4], SqlValue::Timestamp(e.time.unwrap()));
    }

    #[test]
    fn missing_time_is_stamped() {
        let mut e = entry();
        e.time = None;
        let before = Utc::now();
        let stmt = insert_statement("log", &DriverKind::Sqlite, &e).unwrap();
        match &stmt.params[4] {
            SqlValue::Timestamp(t) => assert!(*t >= before),
            other => panic!("unexpected time param {:?}", other),
        }
    }

    #[test]
    fn timestamp_literals() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(
            timestamp_literal(&t, &DriverKind::Sqlite),
            "2024-05-01 12:30:00.000000"
        );
        assert_eq!(
            timestamp_literal(&t, &DriverKind::Postgres),
            "2024-05-01 12:30:00.000000+00:00"
        );
    }
}
