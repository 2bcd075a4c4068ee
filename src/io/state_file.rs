//! Parquet state file read/write operations
//!
//! The state store persists one row per key. Exactly one of the three value columns is
//! non-null for a row, which determines the [`StateValue`] variant read back.

use crate::services::store::{StateValue, StoredEntry};
use arrow_array::{Array, ArrayRef, RecordBatch, StringArray, UInt64Array};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Return the Arrow schema shared by state writers and readers.
#[must_use]
pub fn state_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("key", DataType::Utf8, false),
        Field::new("int_value", DataType::UInt64, true),
        Field::new("list_value", DataType::Utf8, true),
        Field::new("text_value", DataType::Utf8, true),
        Field::new("updated_at", DataType::Utf8, true),
    ]))
}

/// Write every entry to `path`, replacing the previous file atomically.
pub fn write_state_file(path: &Path, entries: &BTreeMap<String, StoredEntry>) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path(path);
    {
        let file = File::create(&tmp_path)?;
        let schema = state_schema();
        let props = WriterProperties::builder().build();
        let mut writer =
            ArrowWriter::try_new(file, schema.clone(), Some(props)).map_err(Error::other)?;

        if !entries.is_empty() {
            let batch = create_state_batch(&schema, entries)?;
            writer.write(&batch).map_err(Error::other)?;
        }

        writer.close().map_err(Error::other)?;
    }

    std::fs::rename(&tmp_path, path)
}

/// Read a state file written by [`write_state_file`].
pub fn read_state_file(path: &Path) -> Result<BTreeMap<String, StoredEntry>> {
    let file = File::open(path)?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::new(ErrorKind::InvalidData, e))?;

    let mut reader = builder
        .build()
        .map_err(|e| Error::new(ErrorKind::InvalidData, e))?;

    let mut entries = BTreeMap::new();

    for batch_result in &mut reader {
        let batch = batch_result.map_err(|e| Error::new(ErrorKind::InvalidData, e))?;

        for row_idx in 0..batch.num_rows() {
            let key = get_string_value(&batch, "key", row_idx)?
                .ok_or_else(|| Error::new(ErrorKind::InvalidData, "Missing key"))?;
            let entry = extract_entry(&batch, row_idx)?;
            entries.insert(key, entry);
        }
    }

    Ok(entries)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn create_state_batch(
    schema: &Arc<Schema>,
    entries: &BTreeMap<String, StoredEntry>,
) -> Result<RecordBatch> {
    let mut lists = Vec::with_capacity(entries.len());
    for entry in entries.values() {
        lists.push(match &entry.value {
            StateValue::List(values) => Some(serde_json::to_string(values)?),
            _ => None,
        });
    }

    let keys: ArrayRef = Arc::new(StringArray::from(
        entries.keys().map(|k| Some(k.as_str())).collect::<Vec<_>>(),
    ));

    let ints: ArrayRef = Arc::new(UInt64Array::from(
        entries
            .values()
            .map(|e| match e.value {
                StateValue::Int(v) => Some(v),
                _ => None,
            })
            .collect::<Vec<_>>(),
    ));

    let list_values: ArrayRef = Arc::new(StringArray::from(
        lists.iter().map(Option::as_deref).collect::<Vec<_>>(),
    ));

    let texts: ArrayRef = Arc::new(StringArray::from(
        entries
            .values()
            .map(|e| match &e.value {
                StateValue::Text(s) => Some(s.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>(),
    ));

    let updated: ArrayRef = Arc::new(StringArray::from(
        entries
            .values()
            .map(|e| Some(e.updated_at.as_str()))
            .collect::<Vec<_>>(),
    ));

    RecordBatch::try_new(
        schema.clone(),
        vec![keys, ints, list_values, texts, updated],
    )
    .map_err(Error::other)
}

fn extract_entry(batch: &RecordBatch, row: usize) -> Result<StoredEntry> {
    let updated_at = get_string_value(batch, "updated_at", row)?.unwrap_or_default();

    let value = if let Some(v) = get_u64_value(batch, "int_value", row)? {
        StateValue::Int(v)
    } else if let Some(raw) = get_string_value(batch, "list_value", row)? {
        let values: Vec<u64> =
            serde_json::from_str(&raw).map_err(|e| Error::new(ErrorKind::InvalidData, e))?;
        StateValue::List(values)
    } else if let Some(text) = get_string_value(batch, "text_value", row)? {
        StateValue::Text(text)
    } else {
        return Err(Error::new(ErrorKind::InvalidData, "Row has no value"));
    };

    Ok(StoredEntry { value, updated_at })
}

fn get_string_value(batch: &RecordBatch, col_name: &str, row: usize) -> Result<Option<String>> {
    let col = batch.column_by_name(col_name).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            format!("Missing column: {col_name}"),
        )
    })?;

    let array = col.as_any().downcast_ref::<StringArray>().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            format!("Invalid type for: {col_name}"),
        )
    })?;

    if array.is_null(row) {
        Ok(None)
    } else {
        Ok(Some(array.value(row).to_string()))
    }
}

fn get_u64_value(batch: &RecordBatch, col_name: &str, row: usize) -> Result<Option<u64>> {
    let col = batch.column_by_name(col_name).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            format!("Missing column: {col_name}"),
        )
    })?;

    let array = col.as_any().downcast_ref::<UInt64Array>().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            format!("Invalid type for: {col_name}"),
        )
    })?;

    if array.is_null(row) {
        Ok(None)
    } else {
        Ok(Some(array.value(row)))
    }
}
