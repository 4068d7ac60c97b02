//! CSV record store: header-driven tables with atomic whole-file writes,
//! timestamped backups, and non-destructive schema migration.
//!
//! Every table is "load whole file, mutate in memory, write whole file
//! back". Writes go to a temp file in the same directory and are renamed
//! into place so readers never observe a half-written file. A binary
//! backup of the previous contents is taken before each rewrite
//! (best-effort: a failed backup is logged and never aborts the save).

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::Path;

use chrono::Local;
use tempfile::NamedTempFile;

use crate::error::{StoreError, StoreResult};

/// A table's canonical header plus aliases for retired column names.
///
/// Aliases are the explicit migration table: when a file on disk carries a
/// legacy header (e.g. the old red-outcome glyph), the legacy column is
/// read as its canonical replacement instead of being dropped.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<String>,
    /// legacy name -> canonical name
    aliases: Vec<(String, String)>,
}

impl Schema {
    pub fn new<S: AsRef<str>>(fields: &[S]) -> Self {
        Schema {
            fields: fields.iter().map(|f| f.as_ref().to_string()).collect(),
            aliases: Vec::new(),
        }
    }

    pub fn with_alias(mut self, legacy: &str, canonical: &str) -> Self {
        self.aliases.push((legacy.to_string(), canonical.to_string()));
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// For each canonical field, the position of its column (canonical or
    /// aliased) in the given on-disk header.
    fn column_map(&self, header: &[String]) -> Vec<Option<usize>> {
        self.fields
            .iter()
            .map(|field| {
                header.iter().position(|h| h == field).or_else(|| {
                    self.aliases
                        .iter()
                        .filter(|(_, canonical)| canonical == field)
                        .find_map(|(legacy, _)| header.iter().position(|h| h == legacy))
                })
            })
            .collect()
    }
}

/// Field lookup on a positional row.
pub fn row_get<'a>(row: &'a [String], schema: &Schema, name: &str) -> &'a str {
    schema
        .index_of(name)
        .and_then(|i| row.get(i))
        .map(String::as_str)
        .unwrap_or("")
}

/// Set a field on a positional row, padding to schema width if needed.
pub fn row_set(row: &mut Vec<String>, schema: &Schema, name: &str, value: impl Into<String>) {
    if let Some(i) = schema.index_of(name) {
        if row.len() < schema.len() {
            row.resize(schema.len(), String::new());
        }
        row[i] = value.into();
    }
}

/// A row as a name -> value map, for placeholder substitution and
/// cross-table field carrying.
pub fn row_to_map(row: &[String], schema: &Schema) -> HashMap<String, String> {
    schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, f)| (f.clone(), row.get(i).cloned().unwrap_or_default()))
        .collect()
}

fn read_header(path: &Path) -> StoreResult<Option<Vec<String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| StoreError::csv(path, e))?;
    match rdr.headers() {
        Ok(h) => Ok(Some(h.iter().map(|s| s.to_string()).collect())),
        Err(e) => Err(StoreError::csv(path, e)),
    }
}

/// Read all rows of a header-driven CSV, projected onto the schema.
///
/// Missing file yields an empty table; missing columns yield empty
/// strings. Only genuine I/O or parse failures error.
pub fn load_table(path: &Path, schema: &Schema) -> StoreResult<Vec<Vec<String>>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| StoreError::csv(path, e))?;

    let header: Vec<String> = rdr
        .headers()
        .map_err(|e| StoreError::csv(path, e))?
        .iter()
        .map(|s| s.to_string())
        .collect();
    if header.is_empty() {
        return Ok(Vec::new());
    }
    let columns = schema.column_map(&header);

    let mut out = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| StoreError::csv(path, e))?;
        let row: Vec<String> = columns
            .iter()
            .map(|idx| {
                idx.and_then(|i| record.get(i))
                    .unwrap_or("")
                    .to_string()
            })
            .collect();
        out.push(row);
    }
    Ok(out)
}

/// Write header + rows atomically, each row truncated/padded to schema
/// width, after a best-effort timestamped backup of the previous file.
pub fn save_table(path: &Path, schema: &Schema, rows: &[Vec<String>]) -> StoreResult<()> {
    backup_file(path);
    write_table(path, schema, rows)
}

fn write_table(path: &Path, schema: &Schema, rows: &[Vec<String>]) -> StoreResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;

    let tmp = NamedTempFile::new_in(parent).map_err(|e| StoreError::io(parent, e))?;
    {
        let mut w = csv::Writer::from_writer(tmp.as_file());
        w.write_record(schema.fields())
            .map_err(|e| StoreError::csv(path, e))?;
        for row in rows {
            w.write_record(padded(row, schema.len()))
                .map_err(|e| StoreError::csv(path, e))?;
        }
        w.flush().map_err(|e| StoreError::io(path, e))?;
    }
    tmp.persist(path)
        .map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

fn padded(row: &[String], width: usize) -> Vec<String> {
    (0..width)
        .map(|i| row.get(i).cloned().unwrap_or_default())
        .collect()
}

/// Create the table with a header if absent; migrate the header in place
/// if it differs from the schema.
///
/// Migration re-projects each old row onto the new field set by name
/// (aliases honored, unmatched old columns dropped, new columns blank)
/// and atomically rewrites after a backup. When the on-disk header
/// already matches, this is a byte-level no-op.
pub fn ensure_table(path: &Path, schema: &Schema) -> StoreResult<()> {
    match read_header(path)? {
        None => write_table(path, schema, &[]),
        Some(header) if header == schema.fields() => Ok(()),
        Some(header) => {
            log::info!(
                "Migrating {} header: {} -> {} columns",
                path.display(),
                header.len(),
                schema.len()
            );
            let rows = load_table(path, schema)?;
            save_table(path, schema, &rows)
        }
    }
}

/// Append rows to an append-only log, creating it with a header first if
/// needed. Existing rows are never rewritten.
pub fn append_rows(path: &Path, schema: &Schema, rows: &[Vec<String>]) -> StoreResult<()> {
    ensure_table(path, schema)?;
    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    for row in rows {
        w.write_record(padded(row, schema.len()))
            .map_err(|e| StoreError::csv(path, e))?;
    }
    w.flush().map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

/// Copy the current file into `_backups/{stem}.{stamp}{ext}.bak`.
/// Best-effort: failure is logged, never propagated.
pub fn backup_file(path: &Path) {
    if !path.is_file() {
        return;
    }
    let backup_dir = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("_backups");
    if let Err(e) = std::fs::create_dir_all(&backup_dir) {
        log::warn!("Backup dir create failed for {}: {}", path.display(), e);
        return;
    }
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("table");
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| format!(".{}", s))
        .unwrap_or_default();
    let bak = backup_dir.join(format!("{}.{}{}.bak", stem, stamp, ext));
    if let Err(e) = std::fs::copy(path, &bak) {
        log::warn!("Backup of {} failed: {}", path.display(), e);
    }
}
