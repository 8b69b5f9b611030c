use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "classhub.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Creates the three role partitions and the entitlement flag store.
/// Kept separate from `open_db` so tests can run against an in-memory
/// connection.
pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS admins(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL,
            photo_url TEXT,
            is_active INTEGER NOT NULL,
            role TEXT NOT NULL DEFAULT 'admin',
            permissions TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_login TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL,
            photo_url TEXT,
            is_active INTEGER NOT NULL,
            subject_specialization TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_login TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL,
            photo_url TEXT,
            is_active INTEGER NOT NULL,
            enrolled_courses TEXT NOT NULL DEFAULT '[]',
            linked_teachers TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_login TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_admins_email ON admins(email)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teachers_email ON teachers(email)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_email ON students(email)",
        [],
    )?;

    // Workspaces created before the liveness stamp and teacher
    // specialization shipped are missing these columns. Add and leave NULL.
    ensure_last_login_columns(conn)?;
    ensure_teachers_subject_specialization(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS flags(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

fn ensure_last_login_columns(conn: &Connection) -> anyhow::Result<()> {
    for table in ["admins", "teachers", "students"] {
        if !table_has_column(conn, table, "last_login")? {
            conn.execute(
                &format!("ALTER TABLE {} ADD COLUMN last_login TEXT", table),
                [],
            )?;
        }
    }
    Ok(())
}

fn ensure_teachers_subject_specialization(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "teachers", "subject_specialization")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE teachers ADD COLUMN subject_specialization TEXT",
        [],
    )?;
    Ok(())
}

pub fn flag_get(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM flags WHERE key = ?", [key], |row| {
            row.get::<_, String>(0)
        })
        .optional()?;
    Ok(value)
}

pub fn flag_set(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO flags(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, value),
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
