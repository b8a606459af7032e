// SQLite persistence layer: a store of named whole documents.
//
// Each of the six auction documents is stored as a single JSON body in a
// `documents` table. Reads and replaces are whole-document and atomic; a
// multi-document `commit` runs in one SQLite transaction so a torn write
// across documents is never observable, even if the process dies mid-commit.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// The six named auction documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Doc {
    Users,
    Teams,
    Players,
    Sold,
    History,
    State,
}

impl Doc {
    pub const ALL: [Doc; 6] = [
        Doc::Users,
        Doc::Teams,
        Doc::Players,
        Doc::Sold,
        Doc::History,
        Doc::State,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Doc::Users => "users",
            Doc::Teams => "teams",
            Doc::Players => "players",
            Doc::Sold => "sold",
            Doc::History => "history",
            Doc::State => "state",
        }
    }
}

/// SQLite-backed document store. The engine depends only on the
/// read/replace/commit contract here, never on file locations.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the store at `path` and ensure the schema exists.
    /// Pass `":memory:"` for an ephemeral in-memory store (useful for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open store at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .context("failed to set store pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                name       TEXT PRIMARY KEY,
                body       TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );
            ",
        )
        .context("failed to create store schema")?;

        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    /// Atomic whole-document read. Returns `None` if the document has never
    /// been written.
    pub fn read<T: DeserializeOwned>(&self, doc: Doc) -> Result<Option<T>> {
        let conn = self.conn();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE name = ?1",
                params![doc.name()],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .with_context(|| format!("failed to read document {}", doc.name()))?;

        match body {
            Some(json) => {
                let value = serde_json::from_str(&json)
                    .with_context(|| format!("failed to deserialize document {}", doc.name()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Atomic whole-document replace.
    pub fn replace<T: Serialize>(&self, doc: Doc, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)
            .with_context(|| format!("failed to serialize document {}", doc.name()))?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO documents (name, body) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET
                body       = excluded.body,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![doc.name(), json],
        )
        .with_context(|| format!("failed to replace document {}", doc.name()))?;
        Ok(())
    }

    /// Replace several documents in a single transaction. Either every
    /// document lands or none does.
    pub fn commit(&self, writes: &[(Doc, serde_json::Value)]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin commit")?;
        for (doc, value) in writes {
            let json = serde_json::to_string(value)
                .with_context(|| format!("failed to serialize document {}", doc.name()))?;
            tx.execute(
                "INSERT INTO documents (name, body) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET
                    body       = excluded.body,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![doc.name(), json],
            )
            .with_context(|| format!("failed to write document {}", doc.name()))?;
        }
        tx.commit().context("failed to commit documents")?;
        Ok(())
    }

    /// Read several documents inside one read transaction, so the result is
    /// a consistent committed snapshot even while a commit runs concurrently.
    pub fn snapshot(&self, docs: &[Doc]) -> Result<Vec<Option<serde_json::Value>>> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin snapshot")?;
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            let body: Option<String> = tx
                .query_row(
                    "SELECT body FROM documents WHERE name = ?1",
                    params![doc.name()],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })
                .with_context(|| format!("failed to read document {}", doc.name()))?;
            let value = body
                .map(|json| {
                    serde_json::from_str(&json).with_context(|| {
                        format!("failed to deserialize document {}", doc.name())
                    })
                })
                .transpose()?;
            out.push(value);
        }
        tx.commit().context("failed to finish snapshot")?;
        Ok(out)
    }

    /// Whether the document has ever been written.
    pub fn exists(&self, doc: Doc) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM documents WHERE name = ?1)",
                params![doc.name()],
                |row| row.get(0),
            )
            .context("failed to check document existence")?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_store() -> Store {
        Store::open(":memory:").expect("in-memory store should open")
    }

    #[test]
    fn open_creates_documents_table() {
        let store = test_store();
        let conn = store.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='documents'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn read_missing_document_returns_none() {
        let store = test_store();
        let value: Option<serde_json::Value> = store.read(Doc::Players).unwrap();
        assert!(value.is_none());
        assert!(!store.exists(Doc::Players).unwrap());
    }

    #[test]
    fn replace_and_read_round_trip() {
        let store = test_store();
        let players = json!([{"id": 1, "name": "Srinu Dantuluri"}]);
        store.replace(Doc::Players, &players).unwrap();

        let loaded: Option<serde_json::Value> = store.read(Doc::Players).unwrap();
        assert_eq!(loaded, Some(players));
        assert!(store.exists(Doc::Players).unwrap());
    }

    #[test]
    fn replace_overwrites_previous_body() {
        let store = test_store();
        store.replace(Doc::State, &json!({"auction_active": true})).unwrap();
        store.replace(Doc::State, &json!({"auction_active": false})).unwrap();

        let loaded: Option<serde_json::Value> = store.read(Doc::State).unwrap();
        assert_eq!(loaded, Some(json!({"auction_active": false})));
    }

    #[test]
    fn commit_writes_all_documents() {
        let store = test_store();
        store
            .commit(&[
                (Doc::Teams, json!([{"team_name": "Chaitu Cheetahs"}])),
                (Doc::History, json!([{"action": "sell"}])),
                (Doc::State, json!({"sold_to": "Chaitu Cheetahs"})),
            ])
            .unwrap();

        for doc in [Doc::Teams, Doc::History, Doc::State] {
            assert!(store.exists(doc).unwrap(), "{} missing", doc.name());
        }
    }

    #[test]
    fn snapshot_reads_requested_documents() {
        let store = test_store();
        store.replace(Doc::Teams, &json!([1, 2])).unwrap();

        let docs = store.snapshot(&[Doc::Teams, Doc::Players]).unwrap();
        assert_eq!(docs[0], Some(json!([1, 2])));
        assert_eq!(docs[1], None);
    }

    #[test]
    fn typed_round_trip_preserves_field_names() {
        use crate::auction::model::Team;

        let store = test_store();
        let teams = vec![Team {
            team_name: "Sai Warriors".into(),
            purse: 9000,
            default_purse: 10_000,
        }];
        store.replace(Doc::Teams, &teams).unwrap();

        let raw: Option<serde_json::Value> = store.read(Doc::Teams).unwrap();
        let obj = &raw.unwrap()[0];
        assert_eq!(obj["team_name"], "Sai Warriors");
        assert_eq!(obj["purse"], 9000);
        assert_eq!(obj["default_purse"], 10_000);

        let back: Option<Vec<Team>> = store.read(Doc::Teams).unwrap();
        assert_eq!(back.unwrap()[0].purse, 9000);
    }

    #[test]
    fn documents_survive_reopen() {
        let tmp = std::env::temp_dir().join(format!("store_reopen_{}.db", std::process::id()));
        let path = tmp.to_str().unwrap();
        let _ = std::fs::remove_file(&tmp);

        {
            let store = Store::open(path).unwrap();
            store.replace(Doc::History, &json!([{"action": "sell", "player_id": 1}])).unwrap();
        }

        let store = Store::open(path).unwrap();
        let loaded: Option<serde_json::Value> = store.read(Doc::History).unwrap();
        assert_eq!(loaded.unwrap()[0]["player_id"], 1);

        let _ = std::fs::remove_file(&tmp);
        let _ = std::fs::remove_file(format!("{path}-wal"));
        let _ = std::fs::remove_file(format!("{path}-shm"));
    }

    #[test]
    fn doc_names_are_stable() {
        let names: Vec<&str> = Doc::ALL.iter().map(|d| d.name()).collect();
        assert_eq!(
            names,
            vec!["users", "teams", "players", "sold", "history", "state"]
        );
    }
}
