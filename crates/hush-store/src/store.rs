use std::sync::Mutex;

use chrono::{Duration, Utc};
use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::types::{DirectoryUser, PendingRequest, Stats, WhisperRecord, WhisperStatus};

/// Thread-safe store for all whisper state.
///
/// Wraps a single SQLite connection in a `Mutex`; every operation is a
/// single atomic statement (upsert, conditional update, insert-returning-id)
/// so concurrent handlers never need external locking.
pub struct Store {
    db: Mutex<Connection>,
}

impl Store {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    // ---- directory cache ----

    /// Record or refresh a user. Called opportunistically on every
    /// observed interaction; entries are never deleted.
    pub fn upsert_user(&self, user: &DirectoryUser) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO users (user_id, username, first_name, is_bot, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
               username = excluded.username,
               first_name = excluded.first_name,
               is_bot = excluded.is_bot,
               last_seen = excluded.last_seen",
            rusqlite::params![
                user.user_id,
                user.username,
                user.first_name,
                user.is_bot as i32,
                now
            ],
        )?;
        Ok(())
    }

    /// Record or refresh a chat.
    pub fn upsert_chat(&self, chat_id: i64, title: Option<&str>, kind: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO chats (chat_id, title, kind, last_seen)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(chat_id) DO UPDATE SET
               title = excluded.title,
               kind = excluded.kind,
               last_seen = excluded.last_seen",
            rusqlite::params![chat_id, title, kind, now],
        )?;
        Ok(())
    }

    /// Best known display name for a user: first name, then username.
    pub fn display_name(&self, user_id: i64) -> Result<Option<String>> {
        let db = self.db.lock().unwrap();
        let name = db
            .query_row(
                "SELECT COALESCE(NULLIF(first_name, ''), NULLIF(username, ''))
                 FROM users WHERE user_id = ?1",
                [user_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .unwrap_or(None);
        Ok(name)
    }

    /// Resolve a plain @username mention through the directory.
    pub fn user_by_username(&self, username: &str) -> Result<Option<DirectoryUser>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT user_id, username, first_name, is_bot
             FROM users WHERE username = ?1
             ORDER BY last_seen DESC LIMIT 1",
            [username],
            |row| {
                Ok(DirectoryUser {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    first_name: row.get(2)?,
                    is_bot: row.get::<_, i32>(3)? != 0,
                })
            },
        ) {
            Ok(u) => Ok(Some(u)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn chat_title(&self, chat_id: i64) -> Result<Option<String>> {
        let db = self.db.lock().unwrap();
        let title = db
            .query_row(
                "SELECT title FROM chats WHERE chat_id = ?1",
                [chat_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .unwrap_or(None);
        Ok(title)
    }

    // ---- pending request registry ----

    /// Open (or replace) the sender's pending request. Last write wins:
    /// a fresh trigger overwrites any earlier intent and resets the clock.
    pub fn pending_upsert(
        &self,
        sender_id: i64,
        group_id: i64,
        receiver_id: i64,
        ttl: Duration,
        anchor_message_id: Option<i64>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now();
        let expires = now + ttl;
        db.execute(
            "INSERT INTO pending
               (sender_id, group_id, receiver_id, created_at, expires_at,
                guide_message_id, anchor_message_id)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)
             ON CONFLICT(sender_id) DO UPDATE SET
               group_id = excluded.group_id,
               receiver_id = excluded.receiver_id,
               created_at = excluded.created_at,
               expires_at = excluded.expires_at,
               guide_message_id = NULL,
               anchor_message_id = excluded.anchor_message_id",
            rusqlite::params![
                sender_id,
                group_id,
                receiver_id,
                now.to_rfc3339(),
                expires.to_rfc3339(),
                anchor_message_id
            ],
        )?;
        debug!(sender_id, group_id, receiver_id, "pending request opened");
        Ok(())
    }

    /// Remember the transient guide message so it can be cleaned up later.
    pub fn pending_attach_guide(&self, sender_id: i64, message_id: i64) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE pending SET guide_message_id = ?1 WHERE sender_id = ?2",
            rusqlite::params![message_id, sender_id],
        )?;
        Ok(())
    }

    /// The sender's live pending request, if any. An expired row is
    /// treated as absent even though it may still physically exist.
    pub fn pending_lookup(&self, sender_id: i64) -> Result<Option<PendingRequest>> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        match db.query_row(
            "SELECT sender_id, group_id, receiver_id, created_at, expires_at,
                    guide_message_id, anchor_message_id
             FROM pending WHERE sender_id = ?1 AND expires_at > ?2",
            rusqlite::params![sender_id, now],
            row_to_pending,
        ) {
            Ok(p) => Ok(Some(p)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the sender's pending request unconditionally.
    /// Called exactly once, at successful submission.
    pub fn pending_consume(&self, sender_id: i64) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute("DELETE FROM pending WHERE sender_id = ?1", [sender_id])?;
        Ok(())
    }

    // ---- whisper records ----

    /// Persist a delivered whisper with status `Sent`.
    pub fn insert_whisper(
        &self,
        group_id: i64,
        sender_id: i64,
        receiver_id: i64,
        text: &str,
        message_id: i64,
    ) -> Result<WhisperRecord> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO whispers
               (group_id, sender_id, receiver_id, text, status, created_at, message_id)
             VALUES (?1, ?2, ?3, ?4, 'sent', ?5, ?6)",
            rusqlite::params![group_id, sender_id, receiver_id, text, now, message_id],
        )?;
        let id = db.last_insert_rowid();
        Ok(WhisperRecord {
            id,
            group_id,
            sender_id,
            receiver_id,
            text: text.to_string(),
            status: WhisperStatus::Sent,
            created_at: now,
            message_id: Some(message_id),
        })
    }

    /// Most recent whisper for an exact (group, sender, receiver) triple.
    /// Ids are monotonic, so newest id = most recent created-at.
    pub fn latest_whisper(
        &self,
        group_id: i64,
        sender_id: i64,
        receiver_id: i64,
    ) -> Result<Option<WhisperRecord>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT id, group_id, sender_id, receiver_id, text, status, created_at, message_id
             FROM whispers
             WHERE group_id = ?1 AND sender_id = ?2 AND receiver_id = ?3
             ORDER BY id DESC LIMIT 1",
            rusqlite::params![group_id, sender_id, receiver_id],
            row_to_whisper,
        ) {
            Ok(w) => Ok(Some(w)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Sent → Read, compare-and-set. Returns `true` only for the call that
    /// actually performed the transition; concurrent revealers race safely.
    pub fn mark_whisper_read(&self, id: i64) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE whispers SET status = 'read' WHERE id = ?1 AND status = 'sent'",
            [id],
        )?;
        Ok(n > 0)
    }

    // ---- watcher subscriptions ----

    /// Grant a watcher oversight of a group's whispers. Idempotent.
    pub fn add_watcher(&self, group_id: i64, watcher_id: i64) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO watchers (group_id, watcher_id) VALUES (?1, ?2)
             ON CONFLICT DO NOTHING",
            rusqlite::params![group_id, watcher_id],
        )?;
        Ok(())
    }

    /// Revoke a watcher. Returns whether a subscription existed.
    pub fn remove_watcher(&self, group_id: i64, watcher_id: i64) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "DELETE FROM watchers WHERE group_id = ?1 AND watcher_id = ?2",
            rusqlite::params![group_id, watcher_id],
        )?;
        Ok(n > 0)
    }

    pub fn watchers_for(&self, group_id: i64) -> Result<Vec<i64>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT watcher_id FROM watchers WHERE group_id = ?1")?;
        let rows = stmt.query_map([group_id], |row| row.get::<_, i64>(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ---- operator sessions ----

    /// Arm a transient admin action for an operator (e.g. "broadcast").
    /// Replaces any previous armed action.
    pub fn begin_operator_action(&self, operator_id: i64, action: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO operator_sessions (operator_id, action, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(operator_id) DO UPDATE SET
               action = excluded.action, created_at = excluded.created_at",
            rusqlite::params![operator_id, action, now],
        )?;
        Ok(())
    }

    /// Consume and return the operator's armed action, if any.
    pub fn take_operator_action(&self, operator_id: i64) -> Result<Option<String>> {
        let db = self.db.lock().unwrap();
        let action = match db.query_row(
            "SELECT action FROM operator_sessions WHERE operator_id = ?1",
            [operator_id],
            |row| row.get::<_, String>(0),
        ) {
            Ok(a) => a,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        db.execute(
            "DELETE FROM operator_sessions WHERE operator_id = ?1",
            [operator_id],
        )?;
        Ok(Some(action))
    }

    // ---- broadcast + stats ----

    /// Every known user and group chat id, for the owner's broadcast relay.
    pub fn broadcast_targets(&self) -> Result<Vec<i64>> {
        let db = self.db.lock().unwrap();
        let mut targets = Vec::new();
        let mut stmt = db.prepare("SELECT user_id FROM users WHERE is_bot = 0")?;
        for row in stmt.query_map([], |row| row.get::<_, i64>(0))? {
            if let Ok(id) = row {
                targets.push(id);
            }
        }
        let mut stmt =
            db.prepare("SELECT chat_id FROM chats WHERE kind IN ('group', 'supergroup')")?;
        for row in stmt.query_map([], |row| row.get::<_, i64>(0))? {
            if let Ok(id) = row {
                targets.push(id);
            }
        }
        Ok(targets)
    }

    pub fn stats(&self) -> Result<Stats> {
        let db = self.db.lock().unwrap();
        let users = db.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
        let groups = db.query_row(
            "SELECT COUNT(*) FROM chats WHERE kind IN ('group', 'supergroup')",
            [],
            |r| r.get(0),
        )?;
        let whispers = db.query_row("SELECT COUNT(*) FROM whispers", [], |r| r.get(0))?;
        Ok(Stats {
            users,
            groups,
            whispers,
        })
    }
}

fn row_to_pending(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingRequest> {
    Ok(PendingRequest {
        sender_id: row.get(0)?,
        group_id: row.get(1)?,
        receiver_id: row.get(2)?,
        created_at: row.get(3)?,
        expires_at: row.get(4)?,
        guide_message_id: row.get(5)?,
        anchor_message_id: row.get(6)?,
    })
}

fn row_to_whisper(row: &rusqlite::Row<'_>) -> rusqlite::Result<WhisperRecord> {
    let status_str: String = row.get(5)?;
    Ok(WhisperRecord {
        id: row.get(0)?,
        group_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        text: row.get(4)?,
        status: status_str.parse().unwrap_or(WhisperStatus::Sent),
        created_at: row.get(6)?,
        message_id: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn open_store() -> Store {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        Store::new(conn)
    }

    fn user(id: i64, username: &str, name: &str) -> DirectoryUser {
        DirectoryUser {
            user_id: id,
            username: Some(username.to_string()),
            first_name: Some(name.to_string()),
            is_bot: false,
        }
    }

    #[test]
    fn pending_upsert_then_lookup() {
        let store = open_store();
        store
            .pending_upsert(1, 100, 2, Duration::minutes(5), Some(77))
            .unwrap();

        let p = store.pending_lookup(1).unwrap().expect("live entry");
        assert_eq!(p.group_id, 100);
        assert_eq!(p.receiver_id, 2);
        assert_eq!(p.anchor_message_id, Some(77));
        assert_eq!(p.guide_message_id, None);
    }

    #[test]
    fn pending_is_exclusive_per_sender_last_write_wins() {
        let store = open_store();
        store
            .pending_upsert(1, 100, 2, Duration::minutes(5), None)
            .unwrap();
        store
            .pending_upsert(1, 200, 3, Duration::minutes(5), None)
            .unwrap();

        let p = store.pending_lookup(1).unwrap().expect("live entry");
        assert_eq!(p.group_id, 200);
        assert_eq!(p.receiver_id, 3);
    }

    #[test]
    fn pending_retrigger_clears_stale_guide_ref() {
        let store = open_store();
        store
            .pending_upsert(1, 100, 2, Duration::minutes(5), None)
            .unwrap();
        store.pending_attach_guide(1, 55).unwrap();
        store
            .pending_upsert(1, 200, 3, Duration::minutes(5), None)
            .unwrap();

        let p = store.pending_lookup(1).unwrap().unwrap();
        assert_eq!(p.guide_message_id, None);
    }

    #[test]
    fn expired_pending_is_invisible() {
        let store = open_store();
        store
            .pending_upsert(1, 100, 2, Duration::seconds(-1), None)
            .unwrap();
        assert!(store.pending_lookup(1).unwrap().is_none());
    }

    #[test]
    fn pending_consume_deletes() {
        let store = open_store();
        store
            .pending_upsert(1, 100, 2, Duration::minutes(5), None)
            .unwrap();
        store.pending_consume(1).unwrap();
        assert!(store.pending_lookup(1).unwrap().is_none());
    }

    #[test]
    fn insert_whisper_returns_record_with_id() {
        let store = open_store();
        let w = store.insert_whisper(100, 1, 2, "hi", 500).unwrap();
        assert!(w.id > 0);
        assert_eq!(w.status, WhisperStatus::Sent);
        assert_eq!(w.message_id, Some(500));
    }

    #[test]
    fn latest_whisper_newest_wins() {
        let store = open_store();
        store.insert_whisper(100, 1, 2, "first", 500).unwrap();
        let second = store.insert_whisper(100, 1, 2, "second", 501).unwrap();

        let latest = store.latest_whisper(100, 1, 2).unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.text, "second");
    }

    #[test]
    fn latest_whisper_matches_exact_triple_only() {
        let store = open_store();
        store.insert_whisper(100, 1, 2, "hi", 500).unwrap();
        assert!(store.latest_whisper(100, 2, 1).unwrap().is_none());
        assert!(store.latest_whisper(200, 1, 2).unwrap().is_none());
    }

    #[test]
    fn mark_read_fires_once() {
        let store = open_store();
        let w = store.insert_whisper(100, 1, 2, "hi", 500).unwrap();

        assert!(store.mark_whisper_read(w.id).unwrap());
        // Second caller loses the race: no transition left to perform.
        assert!(!store.mark_whisper_read(w.id).unwrap());

        let latest = store.latest_whisper(100, 1, 2).unwrap().unwrap();
        assert_eq!(latest.status, WhisperStatus::Read);
    }

    #[test]
    fn watchers_are_a_set() {
        let store = open_store();
        store.add_watcher(100, 5).unwrap();
        store.add_watcher(100, 5).unwrap();
        store.add_watcher(100, 6).unwrap();
        store.add_watcher(200, 7).unwrap();

        let mut ws = store.watchers_for(100).unwrap();
        ws.sort();
        assert_eq!(ws, vec![5, 6]);

        assert!(store.remove_watcher(100, 5).unwrap());
        assert!(!store.remove_watcher(100, 5).unwrap());
        assert_eq!(store.watchers_for(100).unwrap(), vec![6]);
    }

    #[test]
    fn directory_upsert_refreshes() {
        let store = open_store();
        store.upsert_user(&user(1, "alice", "Alice")).unwrap();
        store.upsert_user(&user(1, "alice_new", "Alice B")).unwrap();

        assert_eq!(store.display_name(1).unwrap().unwrap(), "Alice B");
        let found = store.user_by_username("alice_new").unwrap().unwrap();
        assert_eq!(found.user_id, 1);
        assert!(store.user_by_username("alice").unwrap().is_none());
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let store = open_store();
        store
            .upsert_user(&DirectoryUser {
                user_id: 2,
                username: Some("bob".to_string()),
                first_name: None,
                is_bot: false,
            })
            .unwrap();
        assert_eq!(store.display_name(2).unwrap().unwrap(), "bob");
        assert!(store.display_name(99).unwrap().is_none());
    }

    #[test]
    fn broadcast_targets_cover_users_and_group_chats() {
        let store = open_store();
        store.upsert_user(&user(1, "alice", "Alice")).unwrap();
        store
            .upsert_user(&DirectoryUser {
                user_id: 9,
                username: Some("somebot".to_string()),
                first_name: None,
                is_bot: true,
            })
            .unwrap();
        store.upsert_chat(-100, Some("Group"), "supergroup").unwrap();
        store.upsert_chat(50, None, "private").unwrap();

        let mut targets = store.broadcast_targets().unwrap();
        targets.sort();
        assert_eq!(targets, vec![-100, 1]);
    }

    #[test]
    fn stats_counts() {
        let store = open_store();
        store.upsert_user(&user(1, "alice", "Alice")).unwrap();
        store.upsert_chat(-100, Some("Group"), "group").unwrap();
        store.upsert_chat(50, None, "private").unwrap();
        store.insert_whisper(-100, 1, 2, "hi", 500).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.users, 1);
        assert_eq!(stats.groups, 1);
        assert_eq!(stats.whispers, 1);
    }

    #[test]
    fn operator_action_take_consumes() {
        let store = open_store();
        store.begin_operator_action(7, "broadcast").unwrap();
        assert_eq!(
            store.take_operator_action(7).unwrap().as_deref(),
            Some("broadcast")
        );
        assert!(store.take_operator_action(7).unwrap().is_none());
    }
}
