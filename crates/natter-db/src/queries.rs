use crate::models::{CityRow, InsertOutcome, MessageRow, SessionRow, UserRow};
use crate::Database;
use anyhow::{Result, anyhow};
use rusqlite::{Connection, ErrorCode};

const STATE_AUTHENTICATED: &str = "authenticated";
const STATE_LOGGED_OUT: &str = "logged_out";

impl Database {
    // -- Users --

    /// Insert a user. A taken username is reported as `Duplicate` by the
    /// constraint itself, with no prior lookup.
    pub fn insert_user(&self, username: &str, password_hash: &str) -> Result<InsertOutcome> {
        self.with_conn_mut(|conn| {
            match conn.execute(
                "INSERT INTO users (username, password) VALUES (?1, ?2)",
                (username, password_hash),
            ) {
                Ok(_) => Ok(InsertOutcome::Inserted),
                Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Duplicate),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn user_exists(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                [username],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    // -- Sessions --

    /// Fetch a session that has not expired as of `now` (unix seconds).
    pub fn get_session(&self, token: &str, now: i64) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT token, state, username, created_at, last_touched, expires_at
                 FROM sessions
                 WHERE token = ?1 AND expires_at > ?2",
                rusqlite::params![token, now],
                |row| {
                    Ok(SessionRow {
                        token: row.get(0)?,
                        state: row.get(1)?,
                        username: row.get(2)?,
                        created_at: row.get(3)?,
                        last_touched: row.get(4)?,
                        expires_at: row.get(5)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Create or overwrite a session as authenticated for `username`.
    pub fn upsert_authenticated_session(
        &self,
        token: &str,
        username: &str,
        now: i64,
        expires_at: i64,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (token, state, username, created_at, last_touched, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?4, ?5)
                 ON CONFLICT(token) DO UPDATE SET
                     state = excluded.state,
                     username = excluded.username,
                     last_touched = excluded.last_touched,
                     expires_at = excluded.expires_at",
                rusqlite::params![token, STATE_AUTHENTICATED, username, now, expires_at],
            )?;
            Ok(())
        })
    }

    /// Move a live session to the logged-out state.
    /// Returns false when there was no live session for `token`.
    pub fn mark_session_logged_out(&self, token: &str, now: i64, expires_at: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE sessions
                 SET state = ?2, username = NULL, last_touched = ?3, expires_at = ?4
                 WHERE token = ?1 AND expires_at > ?3",
                rusqlite::params![token, STATE_LOGGED_OUT, now, expires_at],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_expired_sessions(&self, now: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?;
            Ok(removed)
        })
    }

    // -- Messages --

    /// Append a message and return the id the store allocated for it.
    ///
    /// Allocation and insert are one statement on the single writer
    /// connection, so concurrent appends can never observe the same id.
    pub fn append_message(&self, author: &str, body: &str, client_time: Option<&str>) -> Result<u64> {
        self.with_conn_mut(|conn| {
            let id: i64 = conn.query_row(
                "INSERT INTO messages (author, body, client_time) VALUES (?1, ?2, ?3) RETURNING id",
                rusqlite::params![author, body, client_time],
                |row| row.get(0),
            )?;
            u64::try_from(id).map_err(|_| anyhow!("store allocated a negative message id: {}", id))
        })
    }

    pub fn get_message(&self, id: u64) -> Result<Option<MessageRow>> {
        let Ok(id) = i64::try_from(id) else {
            return Ok(None);
        };
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, author, body, client_time, created_at FROM messages WHERE id = ?1",
                [id],
                message_from_row,
            )
            .optional()
        })
    }

    /// Messages with an id greater than `after`, ascending by id.
    pub fn get_messages_after(&self, after: u64, limit: u32) -> Result<Vec<MessageRow>> {
        let after = i64::try_from(after).unwrap_or(i64::MAX);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, author, body, client_time, created_at
                 FROM messages
                 WHERE id > ?1
                 ORDER BY id ASC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![after, limit], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn latest_message_id(&self) -> Result<Option<u64>> {
        self.with_conn(|conn| {
            let id: Option<i64> =
                conn.query_row("SELECT MAX(id) FROM messages", [], |row| row.get(0))?;
            Ok(id.and_then(|id| u64::try_from(id).ok()))
        })
    }
}

impl Database {
    // -- Cities --

    pub fn insert_city(
        &self,
        name: Option<&str>,
        country_code: Option<&str>,
        district: Option<&str>,
        population: Option<i64>,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO cities (name, country_code, district, population) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![name, country_code, district, population],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// First city with exactly this name.
    pub fn get_city_by_name(&self, name: &str) -> Result<Option<CityRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, country_code, district, population
                 FROM cities
                 WHERE name = ?1
                 ORDER BY id
                 LIMIT 1",
                [name],
                |row| {
                    Ok(CityRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        country_code: row.get(2)?,
                        district: row.get(3)?,
                        population: row.get(4)?,
                    })
                },
            )
            .optional()
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT username, password, created_at FROM users WHERE username = ?1")?;

    stmt.query_row([username], |row| {
        Ok(UserRow {
            username: row.get(0)?,
            password: row.get(1)?,
            created_at: row.get(2)?,
        })
    })
    .optional()
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        author: row.get(1)?,
        body: row.get(2)?,
        client_time: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => {
            err.code == ErrorCode::ConstraintViolation
                && (err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
