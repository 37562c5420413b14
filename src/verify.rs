//! Offline verification of the event log.
//!
//! Integrity must be provable without trusting the daemon that wrote the log:
//! every record's chain hash is re-derived from its payload and predecessor,
//! and every signature is checked against the device verifying key.

use anyhow::{anyhow, Result};
use ed25519_dalek::VerifyingKey;
use rusqlite::{Connection, Row};

use crate::{device_public_key_from_db, hash_record, verify_record_signature, Event};

/// Verify the whole `event_log` chain in id order.
///
/// `on_entry` sees each verified record; the first break aborts with an error
/// naming the record id. Returns the number of verified records.
pub fn verify_event_chain<F>(
    conn: &Connection,
    verifying_key: &VerifyingKey,
    mut on_entry: F,
) -> Result<u64>
where
    F: FnMut(i64, &Event, [u8; 32]),
{
    let mut stmt = conn.prepare(
        "SELECT id, payload_json, prev_hash, entry_hash, signature FROM event_log ORDER BY id ASC",
    )?;

    let mut rows = stmt.query([])?;
    let mut expected_prev = [0u8; 32];
    let mut count = 0u64;

    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let payload: String = row.get(1)?;
        let prev_hash = blob32(row, 2)?;
        let entry_hash = blob32(row, 3)?;
        let sig = blob64(row, 4)?;

        if prev_hash != expected_prev {
            return Err(anyhow!(
                "integrity check failed at id {}: prev_hash={}, expected_prev={}",
                id,
                hex::encode(prev_hash),
                hex::encode(expected_prev)
            ));
        }

        let computed = hash_record(&expected_prev, payload.as_bytes());
        if computed != entry_hash {
            return Err(anyhow!(
                "integrity check failed at id {}: computed_hash={}, stored_hash={}",
                id,
                hex::encode(computed),
                hex::encode(entry_hash)
            ));
        }

        if verify_record_signature(verifying_key, &entry_hash, &sig).is_err() {
            return Err(anyhow!(
                "integrity check failed at id {}: signature mismatch (stored={})",
                id,
                hex::encode(sig)
            ));
        }

        let event: Event = serde_json::from_str(&payload)
            .map_err(|e| anyhow!("integrity check failed at id {}: bad payload: {}", id, e))?;
        on_entry(id, &event, entry_hash);

        expected_prev = entry_hash;
        count += 1;
    }

    Ok(count)
}

/// Key from `--public-key` when given, else the one recorded in the database.
pub fn load_verifying_key(conn: &Connection, public_key_hex: Option<&str>) -> Result<VerifyingKey> {
    if let Some(hex) = public_key_hex {
        return verifying_key_from_hex(hex);
    }
    device_public_key_from_db(conn)
        .map_err(|e| anyhow!("{} (provide --public-key if the database has no key)", e))
}

pub fn verifying_key_from_hex(hex_str: &str) -> Result<VerifyingKey> {
    let bytes = hex::decode(hex_str.trim()).map_err(|e| anyhow!("invalid hex: {}", e))?;
    if bytes.len() != 32 {
        return Err(anyhow!(
            "invalid public key length: expected 32 bytes, got {}",
            bytes.len()
        ));
    }
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&bytes);
    VerifyingKey::from_bytes(&key_bytes).map_err(|e| anyhow!("invalid public key bytes: {}", e))
}

fn blob32(row: &Row<'_>, idx: usize) -> Result<[u8; 32]> {
    let v: Vec<u8> = row.get(idx)?;
    if v.len() != 32 {
        return Err(anyhow!("expected 32-byte blob, got {}", v.len()));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&v);
    Ok(out)
}

fn blob64(row: &Row<'_>, idx: usize) -> Result<[u8; 64]> {
    let v: Vec<u8> = row.get(idx)?;
    if v.len() != 64 {
        return Err(anyhow!("expected 64-byte blob, got {}", v.len()));
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&v);
    Ok(out)
}
