use rusqlite::{Connection, Result};

/// Initialise all tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_directory_tables(conn)?;
    create_whispers_table(conn)?;
    create_pending_table(conn)?;
    create_watchers_table(conn)?;
    create_operator_sessions_table(conn)?;
    Ok(())
}

/// Directory cache: every user and chat the bot has ever seen.
/// Append/update only, never deleted. Used for name resolution,
/// @username mention lookup and broadcast targeting.
fn create_directory_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            user_id     INTEGER PRIMARY KEY,
            username    TEXT,
            first_name  TEXT,
            is_bot      INTEGER NOT NULL DEFAULT 0,
            last_seen   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_username
            ON users(username);

        CREATE TABLE IF NOT EXISTS chats (
            chat_id     INTEGER PRIMARY KEY,
            title       TEXT,
            kind        TEXT NOT NULL,
            last_seen   TEXT NOT NULL
        );",
    )
}

fn create_whispers_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS whispers (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            group_id    INTEGER NOT NULL,
            sender_id   INTEGER NOT NULL,
            receiver_id INTEGER NOT NULL,
            text        TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'sent',  -- 'sent' | 'read'
            created_at  TEXT NOT NULL,
            message_id  INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_whispers_group
            ON whispers(group_id);
        CREATE INDEX IF NOT EXISTS idx_whispers_sr
            ON whispers(sender_id, receiver_id);",
    )
}

/// One live pending request per sender — the primary key is the sender.
/// Expiry is passive: rows are filtered by `expires_at` at read time and
/// overwritten by the next trigger, never swept.
fn create_pending_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS pending (
            sender_id         INTEGER PRIMARY KEY,
            group_id          INTEGER NOT NULL,
            receiver_id       INTEGER NOT NULL,
            created_at        TEXT NOT NULL,
            expires_at        TEXT NOT NULL,
            guide_message_id  INTEGER,
            anchor_message_id INTEGER
        );",
    )
}

fn create_watchers_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS watchers (
            group_id    INTEGER NOT NULL,
            watcher_id  INTEGER NOT NULL,
            PRIMARY KEY (group_id, watcher_id)
        );",
    )
}

/// Per-operator transient admin state (e.g. an armed broadcast).
/// Persisted so it survives restarts and scales past a single operator.
fn create_operator_sessions_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS operator_sessions (
            operator_id INTEGER PRIMARY KEY,
            action      TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );",
    )
}
