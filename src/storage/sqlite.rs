//! SQLite-backed state store.
//!
//! Schema is created on construction; every operation opens its own
//! connection against the database path, so the store is cheap to clone
//! across handler tasks and safe under SQLite's own file locking.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{ConversationRow, InterestKeyword, SocialBatteryState, StateStore, StoredTrait};
use crate::errors::StoreError;

/// Durable [`StateStore`] implementation.
#[derive(Debug, Clone)]
pub struct SqliteStateStore {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
}

impl SqliteStateStore {
    /// Open (creating if necessary) the database at `db_path` and ensure
    /// the schema exists.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self { db_path };
        store.initialize_db()?;
        Ok(store)
    }

    fn initialize_db(&self) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS social_battery_state (
                profile_id      TEXT NOT NULL,
                channel_id      TEXT NOT NULL,
                message_count   INTEGER NOT NULL,
                window_start    TEXT,
                last_message_at TEXT,
                PRIMARY KEY (profile_id, channel_id)
            );
            CREATE TABLE IF NOT EXISTS personality_traits (
                profile_id    TEXT NOT NULL,
                trait_name    TEXT NOT NULL,
                trait_value   REAL NOT NULL,
                change_reason TEXT NOT NULL,
                changed_at    TEXT NOT NULL,
                PRIMARY KEY (profile_id, trait_name)
            );
            CREATE TABLE IF NOT EXISTS interest_keywords (
                profile_id TEXT NOT NULL,
                keyword    TEXT NOT NULL,
                category   TEXT,
                weight     REAL NOT NULL,
                PRIMARY KEY (profile_id, keyword)
            );
            CREATE TABLE IF NOT EXISTS conversation_log (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                profile_id   TEXT NOT NULL,
                channel_id   TEXT NOT NULL,
                author_id    TEXT NOT NULL,
                author_name  TEXT NOT NULL,
                user_message TEXT NOT NULL,
                bot_response TEXT NOT NULL,
                created_at   TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        Connection::open(&self.db_path).map_err(|e| {
            log::error!("STORE ERROR: failed to open {}: {}", self.db_path.display(), e);
            StoreError::from(e)
        })
    }
}

fn ts_to_string(ts: &Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|t| t.to_rfc3339())
}

fn ts_from_string(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|t| t.with_timezone(&Utc))
}

impl StateStore for SqliteStateStore {
    fn battery_state(
        &self,
        profile_id: &str,
        channel_id: &str,
    ) -> Result<Option<SocialBatteryState>, StoreError> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT message_count, window_start, last_message_at
                 FROM social_battery_state
                 WHERE profile_id = ?1 AND channel_id = ?2",
                params![profile_id, channel_id],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(message_count, window_start, last_message_at)| SocialBatteryState {
            profile_id: profile_id.to_string(),
            channel_id: channel_id.to_string(),
            message_count,
            window_start: ts_from_string(window_start),
            last_message_at: ts_from_string(last_message_at),
        }))
    }

    fn upsert_battery_state(&self, state: &SocialBatteryState) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO social_battery_state
                 (profile_id, channel_id, message_count, window_start, last_message_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (profile_id, channel_id)
             DO UPDATE SET message_count   = excluded.message_count,
                           window_start    = excluded.window_start,
                           last_message_at = excluded.last_message_at",
            params![
                state.profile_id,
                state.channel_id,
                state.message_count,
                ts_to_string(&state.window_start),
                ts_to_string(&state.last_message_at),
            ],
        )?;
        Ok(())
    }

    fn delete_battery_state(&self, profile_id: &str, channel_id: &str) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM social_battery_state WHERE profile_id = ?1 AND channel_id = ?2",
            params![profile_id, channel_id],
        )?;
        Ok(())
    }

    fn delete_battery_states_for_profile(&self, profile_id: &str) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM social_battery_state WHERE profile_id = ?1",
            params![profile_id],
        )?;
        Ok(())
    }

    fn trait_row(&self, profile_id: &str, name: &str) -> Result<Option<StoredTrait>, StoreError> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT trait_value, change_reason, changed_at
                 FROM personality_traits
                 WHERE profile_id = ?1 AND trait_name = ?2",
                params![profile_id, name],
                |row| {
                    Ok((
                        row.get::<_, f64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(value, change_reason, changed_at)| StoredTrait {
            name: name.to_string(),
            value,
            change_reason,
            changed_at: ts_from_string(Some(changed_at)).unwrap_or_else(Utc::now),
        }))
    }

    fn traits(&self, profile_id: &str) -> Result<Vec<StoredTrait>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT trait_name, trait_value, change_reason, changed_at
             FROM personality_traits
             WHERE profile_id = ?1
             ORDER BY trait_name",
        )?;
        let rows = stmt.query_map(params![profile_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (name, value, change_reason, changed_at) = row?;
            out.push(StoredTrait {
                name,
                value,
                change_reason,
                changed_at: ts_from_string(Some(changed_at)).unwrap_or_else(Utc::now),
            });
        }
        Ok(out)
    }

    fn upsert_trait(&self, profile_id: &str, row: &StoredTrait) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO personality_traits
                 (profile_id, trait_name, trait_value, change_reason, changed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (profile_id, trait_name)
             DO UPDATE SET trait_value   = excluded.trait_value,
                           change_reason = excluded.change_reason,
                           changed_at    = excluded.changed_at",
            params![
                profile_id,
                row.name,
                row.value,
                row.change_reason,
                row.changed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn clear_traits(&self, profile_id: &str) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM personality_traits WHERE profile_id = ?1",
            params![profile_id],
        )?;
        Ok(())
    }

    fn interests(&self, profile_id: &str) -> Result<Vec<InterestKeyword>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT keyword, category, weight
             FROM interest_keywords
             WHERE profile_id = ?1
             ORDER BY keyword",
        )?;
        let rows = stmt.query_map(params![profile_id], |row| {
            Ok(InterestKeyword {
                keyword: row.get(0)?,
                category: row.get(1)?,
                weight: row.get(2)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn upsert_interest(&self, profile_id: &str, row: &InterestKeyword) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO interest_keywords (profile_id, keyword, category, weight)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (profile_id, keyword)
             DO UPDATE SET category = excluded.category,
                           weight   = excluded.weight",
            params![profile_id, row.keyword, row.category, row.weight],
        )?;
        Ok(())
    }

    fn remove_interest(&self, profile_id: &str, keyword: &str) -> Result<bool, StoreError> {
        let conn = self.connect()?;
        let removed = conn.execute(
            "DELETE FROM interest_keywords WHERE profile_id = ?1 AND keyword = ?2",
            params![profile_id, keyword],
        )?;
        Ok(removed > 0)
    }

    fn clear_interests(&self, profile_id: &str) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM interest_keywords WHERE profile_id = ?1",
            params![profile_id],
        )?;
        Ok(())
    }

    fn append_conversation(&self, row: &ConversationRow) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO conversation_log
                 (profile_id, channel_id, author_id, author_name,
                  user_message, bot_response, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.profile_id,
                row.channel_id,
                row.author_id,
                row.author_name,
                row.user_message,
                row.bot_response,
                row.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn recent_conversation(
        &self,
        profile_id: &str,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRow>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT author_id, author_name, user_message, bot_response, created_at
             FROM conversation_log
             WHERE profile_id = ?1 AND channel_id = ?2
             ORDER BY id DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![profile_id, channel_id, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (author_id, author_name, user_message, bot_response, created_at) = row?;
            out.push(ConversationRow {
                profile_id: profile_id.to_string(),
                channel_id: channel_id.to_string(),
                author_id,
                author_name,
                user_message,
                bot_response,
                created_at: ts_from_string(Some(created_at)).unwrap_or_else(Utc::now),
            });
        }
        // Query is newest-first for the LIMIT; callers want oldest-first.
        out.reverse();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, SqliteStateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStateStore::open(dir.path().join("state.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_battery_state_round_trip() {
        let (_dir, store) = temp_store();
        assert!(store.battery_state("p1", "c1").unwrap().is_none());

        let now = Utc::now();
        let state = SocialBatteryState {
            profile_id: "p1".into(),
            channel_id: "c1".into(),
            message_count: 3,
            window_start: Some(now),
            last_message_at: Some(now),
        };
        store.upsert_battery_state(&state).unwrap();

        let loaded = store.battery_state("p1", "c1").unwrap().unwrap();
        assert_eq!(loaded.message_count, 3);
        assert_eq!(
            loaded.window_start.unwrap().timestamp(),
            now.timestamp()
        );
    }

    #[test]
    fn test_battery_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        {
            let store = SqliteStateStore::open(&path).unwrap();
            store
                .upsert_battery_state(&SocialBatteryState {
                    profile_id: "p1".into(),
                    channel_id: "c1".into(),
                    message_count: 5,
                    window_start: Some(Utc::now()),
                    last_message_at: Some(Utc::now()),
                })
                .unwrap();
        }
        let reopened = SqliteStateStore::open(&path).unwrap();
        let loaded = reopened.battery_state("p1", "c1").unwrap().unwrap();
        assert_eq!(loaded.message_count, 5);
    }

    #[test]
    fn test_trait_upsert_replaces() {
        let (_dir, store) = temp_store();
        let first = StoredTrait {
            name: "sarcasm_level".into(),
            value: 0.3,
            change_reason: "Initial configuration".into(),
            changed_at: Utc::now(),
        };
        store.upsert_trait("p1", &first).unwrap();
        store
            .upsert_trait(
                "p1",
                &StoredTrait {
                    value: 0.4,
                    change_reason: "Sarcastic interaction detected".into(),
                    ..first.clone()
                },
            )
            .unwrap();

        let rows = store.traits("p1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 0.4);
    }

    #[test]
    fn test_interest_remove_reports_existence() {
        let (_dir, store) = temp_store();
        store
            .upsert_interest(
                "p1",
                &InterestKeyword {
                    keyword: "typescript".into(),
                    category: Some("tech".into()),
                    weight: 1.0,
                },
            )
            .unwrap();

        assert!(store.remove_interest("p1", "typescript").unwrap());
        assert!(!store.remove_interest("p1", "typescript").unwrap());
    }

    #[test]
    fn test_recent_conversation_is_oldest_first_and_limited() {
        let (_dir, store) = temp_store();
        for i in 0..5 {
            store
                .append_conversation(&ConversationRow {
                    profile_id: "p1".into(),
                    channel_id: "c1".into(),
                    author_id: "u1".into(),
                    author_name: "user".into(),
                    user_message: format!("msg {i}"),
                    bot_response: format!("reply {i}"),
                    created_at: Utc::now(),
                })
                .unwrap();
        }

        let recent = store.recent_conversation("p1", "c1", 3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].user_message, "msg 2");
        assert_eq!(recent[2].user_message, "msg 4");
    }
}
