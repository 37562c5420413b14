//! export_events - write the event log as a portable JSON document

use anyhow::{anyhow, Result};
use clap::Parser;
use rusqlite::Connection;

use bag_witness::export_event_log;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the event log database.
    #[arg(long, default_value = "bagwatch.db")]
    db: String,
    /// Output file path; stdout when omitted.
    #[arg(long)]
    output: Option<String>,
    /// Maximum number of events to export (oldest first).
    #[arg(long)]
    limit: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if !std::path::Path::new(&args.db).exists() {
        return Err(anyhow!("event log {} does not exist", args.db));
    }
    let conn = Connection::open(&args.db)?;
    let export = export_event_log(&conn, args.limit.unwrap_or(usize::MAX))?;
    let json = serde_json::to_vec_pretty(&export)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .map_err(|e| anyhow!("failed to write export {}: {}", path, e))?;
            eprintln!(
                "exported {} of {} events to {}",
                export.events.len(),
                export.total_events,
                path
            );
        }
        None => println!("{}", String::from_utf8_lossy(&json)),
    }
    Ok(())
}
