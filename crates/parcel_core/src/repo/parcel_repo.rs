//! Parcel repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the `parcel` table.
//! - Enforce that address changes and deletion only happen while registered.
//! - Advance status with a compare-and-set so it never moves backward.
//!
//! # Invariants
//! - Check-then-write operations run inside one immediate transaction.
//! - Read paths reject rows with an unknown status instead of masking them.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::parcel::{
    validate_address, ClientId, Parcel, ParcelNumber, ParcelStatus, ParcelValidationError,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PARCEL_TABLE: &str = "parcel";
const PARCEL_COLUMNS: [&str; 5] = ["number", "client", "status", "address", "created_at"];

const PARCEL_SELECT_SQL: &str = "SELECT
    number,
    client,
    status,
    address,
    created_at
FROM parcel";

pub type RepoResult<T> = Result<T, RepoError>;

/// Mutation that is gated on the parcel still being registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedOperation {
    ChangeAddress,
    Delete,
}

impl Display for GatedOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChangeAddress => f.write_str("change address"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Repository error for parcel persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// The store rejected or could not complete the statement.
    Db(DbError),
    /// No parcel has the requested number.
    NotFound(ParcelNumber),
    /// Address change or delete attempted after the parcel left `registered`.
    InvalidTransition {
        number: ParcelNumber,
        status: ParcelStatus,
        operation: GatedOperation,
    },
    /// Status changed since the caller read it.
    StatusConflict {
        number: ParcelNumber,
        expected: ParcelStatus,
        actual: ParcelStatus,
    },
    Validation(ParcelValidationError),
    /// Persisted row cannot be mapped back to a parcel.
    InvalidData(String),
    /// Connection was not migrated to the schema this binary expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }

    pub fn is_status_conflict(&self) -> bool {
        matches!(self, Self::StatusConflict { .. })
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(number) => write!(f, "parcel not found: {number}"),
            Self::InvalidTransition {
                number,
                status,
                operation,
            } => write!(
                f,
                "cannot {operation} parcel {number}: allowed only while registered, current status is {status}"
            ),
            Self::StatusConflict {
                number,
                expected,
                actual,
            } => write!(
                f,
                "parcel {number} is no longer {expected}, current status is {actual}"
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted parcel data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "parcel repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "parcel repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "parcel repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ParcelValidationError> for RepoError {
    fn from(value: ParcelValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Repository interface for parcel storage.
pub trait ParcelRepository {
    /// Inserts a parcel and returns the store-assigned number.
    ///
    /// The input `number` is ignored.
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber>;
    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel>;
    /// Returns every parcel of `client`, ordered by number. Empty when none.
    fn get_by_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>>;
    /// Overwrites status without checking the current one.
    fn set_status(&self, number: ParcelNumber, status: ParcelStatus) -> RepoResult<()>;
    /// Moves a parcel from `from` to the status that follows it.
    ///
    /// Writes only if the stored status still equals `from`; otherwise
    /// fails with `StatusConflict`. A terminal `from` is returned unchanged
    /// without a write.
    fn advance_status(
        &self,
        number: ParcelNumber,
        from: ParcelStatus,
    ) -> RepoResult<ParcelStatus>;
    /// Changes the address of a registered parcel.
    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<()>;
    /// Removes a registered parcel.
    fn delete(&self, number: ParcelNumber) -> RepoResult<()>;
}

/// SQLite-backed parcel repository borrowing a caller-owned connection.
pub struct SqliteParcelRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteParcelRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the schema version does not match.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` for a foreign schema.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_parcel_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ParcelRepository for SqliteParcelRepository<'_> {
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber> {
        parcel.validate()?;

        self.conn.execute(
            "INSERT INTO parcel (client, status, address, created_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                parcel.client,
                parcel.status.as_str(),
                parcel.address.as_str(),
                parcel.created_at.as_str(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel> {
        load_parcel(self.conn, number)?.ok_or(RepoError::NotFound(number))
    }

    fn get_by_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PARCEL_SELECT_SQL}
             WHERE client = ?1
             ORDER BY number ASC;"
        ))?;

        let mut rows = stmt.query([client])?;
        let mut parcels = Vec::new();
        while let Some(row) = rows.next()? {
            parcels.push(parse_parcel_row(row)?);
        }

        Ok(parcels)
    }

    fn set_status(&self, number: ParcelNumber, status: ParcelStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE parcel SET status = ?1 WHERE number = ?2;",
            params![status.as_str(), number],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(number));
        }

        Ok(())
    }

    fn advance_status(
        &self,
        number: ParcelNumber,
        from: ParcelStatus,
    ) -> RepoResult<ParcelStatus> {
        let Some(to) = from.next() else {
            return Ok(from);
        };

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE parcel SET status = ?1 WHERE number = ?2 AND status = ?3;",
            params![to.as_str(), number, from.as_str()],
        )?;
        if changed == 0 {
            let actual = current_status(&tx, number)?;
            return Err(RepoError::StatusConflict {
                number,
                expected: from,
                actual,
            });
        }
        tx.commit()?;

        Ok(to)
    }

    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<()> {
        validate_address(address)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        // Dropping `tx` on an early return rolls it back.
        ensure_registered(&tx, number, GatedOperation::ChangeAddress)?;
        tx.execute(
            "UPDATE parcel SET address = ?1 WHERE number = ?2;",
            params![address, number],
        )?;
        tx.commit()?;

        Ok(())
    }

    fn delete(&self, number: ParcelNumber) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_registered(&tx, number, GatedOperation::Delete)?;
        tx.execute("DELETE FROM parcel WHERE number = ?1;", [number])?;
        tx.commit()?;

        Ok(())
    }
}

fn load_parcel(conn: &Connection, number: ParcelNumber) -> RepoResult<Option<Parcel>> {
    let mut stmt = conn.prepare(&format!("{PARCEL_SELECT_SQL} WHERE number = ?1;"))?;
    let mut rows = stmt.query([number])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_parcel_row(row)?));
    }

    Ok(None)
}

fn current_status(conn: &Connection, number: ParcelNumber) -> RepoResult<ParcelStatus> {
    let status_text: Option<String> = conn
        .query_row(
            "SELECT status FROM parcel WHERE number = ?1;",
            [number],
            |row| row.get(0),
        )
        .optional()?;

    let status_text = status_text.ok_or(RepoError::NotFound(number))?;
    parse_status(&status_text)
}

fn ensure_registered(
    conn: &Connection,
    number: ParcelNumber,
    operation: GatedOperation,
) -> RepoResult<()> {
    let status = current_status(conn, number)?;
    if status != ParcelStatus::Registered {
        return Err(RepoError::InvalidTransition {
            number,
            status,
            operation,
        });
    }

    Ok(())
}

fn parse_parcel_row(row: &Row<'_>) -> RepoResult<Parcel> {
    let status_text: String = row.get("status")?;

    Ok(Parcel {
        number: row.get("number")?,
        client: row.get("client")?,
        status: parse_status(&status_text)?,
        address: row.get("address")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_status(value: &str) -> RepoResult<ParcelStatus> {
    ParcelStatus::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{value}` in parcel.status"))
    })
}

fn ensure_parcel_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, PARCEL_TABLE)? {
        return Err(RepoError::MissingRequiredTable(PARCEL_TABLE));
    }

    for column in PARCEL_COLUMNS {
        if !table_has_column(conn, PARCEL_TABLE, column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: PARCEL_TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
