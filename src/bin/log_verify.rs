//! log_verify - External verifier for bagwatchd event log integrity
//!
//! This tool proves:
//! - The event log is hash-chained (tamper-evident)
//! - Each entry is signed by the device key (Ed25519)
//!
//! Integrity must be provable without trusting the daemon that wrote the log.

use anyhow::{anyhow, Result};
use clap::Parser;
use rusqlite::Connection;

use bag_witness::verify;

#[derive(Parser, Debug)]
#[command(
    name = "log_verify",
    about = "Verify bagwatchd event log integrity (hash-chain + signatures)"
)]
struct Args {
    /// Path to the event log SQLite DB
    #[arg(long, default_value = "bagwatch.db")]
    db: String,

    /// Device public key (hex-encoded Ed25519 verifying key)
    #[arg(long, value_name = "HEX")]
    public_key: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if !std::path::Path::new(&args.db).exists() {
        return Err(anyhow!("event log {} does not exist", args.db));
    }
    let conn = Connection::open(&args.db)?;
    let verifying_key = verify::load_verifying_key(&conn, args.public_key.as_deref())?;

    println!("log_verify: checking {}", args.db);
    println!("device key: {}", hex::encode(verifying_key.to_bytes()));
    println!();

    let count = verify::verify_event_chain(&conn, &verifying_key, |id, ev, entry_hash| {
        if args.verbose {
            println!(
                "  event {}: frame={} {} person={} bag={} hash={} OK",
                id,
                ev.frame_number,
                ev.kind,
                ev.person_id,
                ev.bag_id,
                &hex::encode(entry_hash)[..16]
            );
        }
    })?;
    println!("verified {} event entries", count);
    println!("OK: chain verified.");
    Ok(())
}
