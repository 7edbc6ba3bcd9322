use crate::config::CSV_BUFFER_BYTES;
use crate::models::CidCollision;
use anyhow::{Context, Result};
use csv::{Reader, Writer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Writes rows as CSV with a header taken from the row type's field names.
pub fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create: {}", path.display()))?;
    let mut writer = Writer::from_writer(BufWriter::with_capacity(CSV_BUFFER_BYTES, file));
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row to {}", path.display()))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    let mut rows = Vec::new();
    for (line, result) in reader.deserialize::<T>().enumerate() {
        let row: T = result
            .with_context(|| format!("Bad row {} in {}", line + 1, path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// One line per colliding (cid, owner, project).
pub fn write_collisions(path: &Path, collisions: &[CidCollision]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create: {}", path.display()))?;
    let mut writer = Writer::from_writer(BufWriter::new(file));
    writer.write_record(["cid", "owner", "project"])?;
    for collision in collisions {
        for (owner, project) in &collision.repositories {
            writer.write_record([collision.cid.as_str(), owner.as_str(), project.as_str()])?;
        }
    }
    writer.flush()?;
    Ok(())
}
