//! Table creation and the media type lookup seed. Safe to run on every
//! startup.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::Result;

/// Seeded into `media_types`, in this order, only while the table is empty.
pub const MEDIA_TYPES : [&str; 5] =
    ["Audio", "Video", "Image", "Document", "Other"];

const SCHEMA : &str = include_str!("sql/schema.sql");

pub fn initialize(conn : &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    debug!("tables ready");

    seed_media_types(conn)?;

    Ok(())
}

fn seed_media_types(conn : &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    let count : i64 = tx.query_row(
        "SELECT COUNT(*) FROM media_types",
        rusqlite::params![],
        |row| row.get(0),
    )?;

    if count > 0 {
        debug!(count, "media types already seeded");
        return Ok(())
    }

    {
        let mut stmt =
            tx.prepare_cached("INSERT INTO media_types (label) VALUES (?)")?;

        for label in MEDIA_TYPES.iter() {
            stmt.execute(rusqlite::params![label])?;
        }
    }

    tx.commit()?;
    info!(count = MEDIA_TYPES.len(), "seeded media types");

    Ok(())
}
