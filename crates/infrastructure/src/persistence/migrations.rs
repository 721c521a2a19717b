//! Database migrations
//!
//! Manages database schema versioning and migrations.
//!
//! ## Adding New Migrations
//!
//! 1. Increment `SCHEMA_VERSION`
//! 2. Add a new `migrate_vX` function
//! 3. Call it from `run_migrations`

use rusqlite::Connection;
use tracing::{debug, error, info};

use super::connection::DatabaseError;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_schema_version(conn)?;

    if current_version < SCHEMA_VERSION {
        info!(
            from_version = current_version,
            to_version = SCHEMA_VERSION,
            "Running database migrations"
        );

        if current_version < 1 {
            if let Err(e) = migrate_v1(conn) {
                error!(version = 1, error = %e, "Migration V001 (chat mappings) failed");
                return Err(e);
            }
        }

        set_schema_version(conn, SCHEMA_VERSION)?;
        info!(version = SCHEMA_VERSION, "Database migrations complete");
    } else {
        debug!(version = current_version, "Database schema is up to date");
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32, DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        [],
    )?;

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration to version 1: chat thread → helpdesk mapping
fn migrate_v1(conn: &Connection) -> Result<(), DatabaseError> {
    debug!("Applying migration V001: chat mappings");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS chat_mappings (
            chat_id TEXT PRIMARY KEY NOT NULL,
            contact_id INTEGER NOT NULL CHECK (contact_id > 0),
            conversation_id INTEGER NOT NULL CHECK (conversation_id > 0),
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_mappings_conversation
            ON chat_mappings(conversation_id);
        ",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_connection() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn run_migrations_creates_tables() {
        let conn = create_test_connection();
        run_migrations(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(Result::ok)
            .collect();

        assert!(tables.contains(&"chat_mappings".to_string()));
        assert!(tables.contains(&"schema_version".to_string()));
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = create_test_connection();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
    }

    #[test]
    fn schema_version_tracked() {
        let conn = create_test_connection();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn chat_id_is_unique() {
        let conn = create_test_connection();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO chat_mappings (chat_id, contact_id, conversation_id, updated_at)
             VALUES ('5511987654321', 1, 2, '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        let duplicate = conn.execute(
            "INSERT INTO chat_mappings (chat_id, contact_id, conversation_id, updated_at)
             VALUES ('5511987654321', 3, 4, '2026-01-01T00:00:00Z')",
            [],
        );
        assert!(duplicate.is_err());
    }

    #[test]
    fn ids_must_be_positive() {
        let conn = create_test_connection();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO chat_mappings (chat_id, contact_id, conversation_id, updated_at)
             VALUES ('x', 0, 2, '2026-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err());
    }
}
