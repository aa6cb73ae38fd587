use crate::core::schema::{parse_timestamp, TableSchema, CLOSED_AT_COLUMN};
use crate::domain::model::OrderRow;
use crate::domain::ports::Warehouse;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// File warehouse: one `<table_id>.csv` per table, header row = schema columns.
#[derive(Debug, Clone)]
pub struct CsvWarehouse {
    root: PathBuf,
}

impl CsvWarehouse {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn table_path(&self, table_id: &str) -> PathBuf {
        self.root.join(format!("{}.csv", table_id))
    }

    fn temp_path(&self, table_id: &str) -> PathBuf {
        self.root.join(format!(".{}.csv.tmp", table_id))
    }

    /// Reads a whole table as column-name → text maps. Missing table reads as empty.
    pub fn read_table(&self, table_id: &str) -> Result<Vec<HashMap<String, String>>> {
        let path = self.table_path(table_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let headers = reader.headers()?.clone();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(
                headers
                    .iter()
                    .zip(record.iter())
                    .map(|(h, v)| (h.to_string(), v.to_string()))
                    .collect(),
            );
        }
        Ok(rows)
    }

    fn check_header(path: &Path, schema: &TableSchema) -> Result<()> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers != schema.column_names() {
            return Err(EtlError::WarehouseError {
                message: format!(
                    "{} has columns {:?}, expected {:?}",
                    path.display(),
                    headers,
                    schema.column_names()
                ),
            });
        }
        Ok(())
    }

    fn write_rows(
        &self,
        target: &Path,
        temp: &Path,
        schema: &TableSchema,
        rows: &[OrderRow],
    ) -> Result<()> {
        let exists = target.exists();
        // 暫存檔一律從目前的表格重建，不沿用中斷執行留下的內容
        let file = if exists {
            Self::check_header(target, schema)?;
            fs::copy(target, temp)?;
            OpenOptions::new().append(true).open(temp)?
        } else {
            File::create(temp)?
        };
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if !exists {
            writer.write_record(schema.column_names())?;
        }
        for row in rows {
            writer.write_record(row.values.iter().map(|cell| cell.to_csv_field()))?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| EtlError::IoError(e.into_error()))?;
        file.sync_all()?;
        fs::rename(temp, target)?;
        Ok(())
    }
}

#[async_trait]
impl Warehouse for CsvWarehouse {
    async fn max_closed_at(&self, table_id: &str) -> Result<Option<DateTime<Utc>>> {
        let path = self.table_path(table_id);
        if !path.exists() {
            return Ok(None);
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let index = reader
            .headers()?
            .iter()
            .position(|h| h == CLOSED_AT_COLUMN)
            .ok_or_else(|| EtlError::WarehouseError {
                message: format!("{} has no {} column", path.display(), CLOSED_AT_COLUMN),
            })?;

        let mut latest: Option<DateTime<Utc>> = None;
        for record in reader.records() {
            let record = record?;
            if let Some(ts) = record.get(index).and_then(parse_timestamp) {
                latest = Some(latest.map_or(ts, |current| current.max(ts)));
            }
        }
        Ok(latest)
    }

    async fn append(
        &self,
        table_id: &str,
        schema: &TableSchema,
        rows: &[OrderRow],
    ) -> Result<usize> {
        schema.validate_rows(rows)?;
        if rows.is_empty() {
            return Ok(0);
        }

        fs::create_dir_all(&self.root)?;
        let target = self.table_path(table_id);
        let temp = self.temp_path(table_id);

        // 先寫暫存檔再 rename，失敗時原表維持不變
        if let Err(e) = self.write_rows(&target, &temp, schema, rows) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }

        tracing::debug!("💾 Appended {} rows to {}", rows.len(), target.display());
        Ok(rows.len())
    }
}
