use anyhow::{anyhow, Result};
use ed25519_dalek::SigningKey;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::{
    device_public_key_from_db, hash_record, open_db_connection, sign_record,
    signing_key_from_seed, Event,
};

/// Append-only sink for event records.
///
/// Every appended record extends a SHA-256 hash chain over its JSON payload.
pub trait EventLogStore {
    /// Append one record; returns its chain hash.
    fn append(&mut self, ev: &Event) -> Result<[u8; 32]>;

    /// Records in append order, at most `limit`.
    fn read_events(&self, limit: usize) -> Result<Vec<Event>>;

    fn count(&self) -> Result<u64>;
}

pub struct SqliteEventLog {
    conn: Connection,
    signing_key: SigningKey,
}

impl SqliteEventLog {
    pub fn open(db_path: &str, device_key_seed: &str) -> Result<Self> {
        let conn = open_db_connection(db_path)?;
        let signing_key = signing_key_from_seed(device_key_seed)?;
        let mut store = Self { conn, signing_key };
        store.ensure_schema()?;
        store.ensure_device_public_key()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS event_log (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              created_at INTEGER NOT NULL,
              created_at_us INTEGER NOT NULL,
              frame_number INTEGER NOT NULL,
              kind TEXT NOT NULL,
              person_id INTEGER NOT NULL,
              bag_id INTEGER NOT NULL,
              evidence_image TEXT,
              payload_json TEXT NOT NULL,
              prev_hash BLOB NOT NULL,
              entry_hash BLOB NOT NULL,
              signature BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS device_metadata (
              id INTEGER PRIMARY KEY CHECK (id = 1),
              public_key BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_event_log_frame ON event_log(frame_number);
            "#,
        )?;
        Ok(())
    }

    fn ensure_device_public_key(&mut self) -> Result<()> {
        let public_key = self.signing_key.verifying_key().to_bytes().to_vec();
        let stored: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT public_key FROM device_metadata WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            None => {
                self.conn.execute(
                    "INSERT INTO device_metadata(id, public_key) VALUES (1, ?1)",
                    params![public_key],
                )?;
                Ok(())
            }
            Some(existing) if existing == public_key => Ok(()),
            Some(_) => Err(anyhow!(
                "device key seed does not match the key already recorded in this event log"
            )),
        }
    }

    fn last_entry_hash(&self) -> Result<[u8; 32]> {
        let stored: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT entry_hash FROM event_log ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            Some(bytes) => {
                if bytes.len() != 32 {
                    return Err(anyhow!("corrupt event log: entry_hash size"));
                }
                let mut out = [0u8; 32];
                out.copy_from_slice(&bytes);
                Ok(out)
            }
            None => Ok([0u8; 32]),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl EventLogStore for SqliteEventLog {
    fn append(&mut self, ev: &Event) -> Result<[u8; 32]> {
        let created_at = i64::try_from(ev.timestamp.secs)
            .map_err(|_| anyhow!("event timestamp exceeds i64 range"))?;
        let frame_number = i64::try_from(ev.frame_number)
            .map_err(|_| anyhow!("frame number exceeds i64 range"))?;
        let person_id = i64::try_from(ev.person_id.0)
            .map_err(|_| anyhow!("person id exceeds i64 range"))?;
        let bag_id =
            i64::try_from(ev.bag_id.0).map_err(|_| anyhow!("bag id exceeds i64 range"))?;

        let prev_hash = self.last_entry_hash()?;
        let payload_json = serde_json::to_string(ev)?;
        let entry_hash = hash_record(&prev_hash, payload_json.as_bytes());
        let signature = sign_record(&self.signing_key, &entry_hash);

        self.conn.execute(
            r#"
            INSERT INTO event_log(created_at, created_at_us, frame_number, kind, person_id, bag_id,
                                  evidence_image, payload_json, prev_hash, entry_hash, signature)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                created_at,
                ev.timestamp.micros,
                frame_number,
                ev.kind.as_str(),
                person_id,
                bag_id,
                ev.evidence_image,
                payload_json,
                prev_hash.to_vec(),
                entry_hash.to_vec(),
                signature.to_vec()
            ],
        )?;

        Ok(entry_hash)
    }

    fn read_events(&self, limit: usize) -> Result<Vec<Event>> {
        read_event_log(&self.conn, limit)
    }

    fn count(&self) -> Result<u64> {
        count_event_log(&self.conn)
    }
}

/// Records of an `event_log` table in append order, at most `limit`.
pub fn read_event_log(conn: &Connection, limit: usize) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare("SELECT payload_json FROM event_log ORDER BY id ASC LIMIT ?1")?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut rows = stmt.query(params![limit])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let payload: String = row.get(0)?;
        out.push(serde_json::from_str(&payload)?);
    }
    Ok(out)
}

pub fn count_event_log(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM event_log", [], |row| row.get(0))?;
    u64::try_from(count).map_err(|_| anyhow!("corrupt event log: negative count"))
}

// -------------------- Export --------------------

/// Portable JSON export of an event log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventExport {
    /// Hex-encoded device verifying key, when the log records one.
    pub device_public_key: Option<String>,
    pub total_events: u64,
    pub events: Vec<Event>,
}

pub fn export_event_log(conn: &Connection, limit: usize) -> Result<EventExport> {
    let device_public_key = match device_public_key_from_db(conn) {
        Ok(key) => Some(hex::encode(key.to_bytes())),
        Err(e) => {
            log::warn!("exporting without device key: {}", e);
            None
        }
    };
    Ok(EventExport {
        device_public_key,
        total_events: count_event_log(conn)?,
        events: read_event_log(conn, limit)?,
    })
}

#[derive(Clone, Debug)]
struct InMemoryEventEntry {
    payload_json: String,
    entry_hash: [u8; 32],
}

/// Unsigned in-process log with the same chaining as the SQLite store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventLog {
    entries: Vec<InMemoryEventEntry>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head_hash(&self) -> [u8; 32] {
        self.entries
            .last()
            .map(|entry| entry.entry_hash)
            .unwrap_or([0u8; 32])
    }
}

impl EventLogStore for InMemoryEventLog {
    fn append(&mut self, ev: &Event) -> Result<[u8; 32]> {
        let prev_hash = self.head_hash();
        let payload_json = serde_json::to_string(ev)?;
        let entry_hash = hash_record(&prev_hash, payload_json.as_bytes());
        self.entries.push(InMemoryEventEntry {
            payload_json,
            entry_hash,
        });
        Ok(entry_hash)
    }

    fn read_events(&self, limit: usize) -> Result<Vec<Event>> {
        self.entries
            .iter()
            .take(limit)
            .map(|entry| Ok(serde_json::from_str(&entry.payload_json)?))
            .collect()
    }

    fn count(&self) -> Result<u64> {
        Ok(self.entries.len() as u64)
    }
}
