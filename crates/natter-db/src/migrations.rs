use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                username    TEXT PRIMARY KEY,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- Absence of a live row means the session is unset.
            CREATE TABLE sessions (
                token         TEXT PRIMARY KEY,
                state         TEXT NOT NULL,
                username      TEXT REFERENCES users(username),
                created_at    INTEGER NOT NULL,
                last_touched  INTEGER NOT NULL,
                expires_at    INTEGER NOT NULL,
                CHECK (
                    (state = 'authenticated' AND username IS NOT NULL)
                    OR (state = 'logged_out' AND username IS NULL)
                )
            );

            CREATE INDEX idx_sessions_expiry ON sessions(expires_at);

            -- AUTOINCREMENT: ids are never reused and always increase.
            CREATE TABLE messages (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                author       TEXT NOT NULL REFERENCES users(username),
                body         TEXT NOT NULL,
                client_time  TEXT,
                created_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (cities)");
        conn.execute_batch(
            "
            CREATE TABLE cities (
                id            INTEGER PRIMARY KEY,
                name          TEXT,
                country_code  TEXT,
                district      TEXT,
                population    INTEGER
            );

            CREATE INDEX idx_cities_name ON cities(name);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
