use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Date32Array, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};

use crate::error::{PipelineError, Result};
use crate::models::RecordTable;
use crate::utils::constants::DEFAULT_ROW_GROUP_SIZE;

pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            "snappy" => Compression::SNAPPY,
            "gzip" => Compression::GZIP(GzipLevel::default()),
            "lz4" => Compression::LZ4,
            "zstd" => Compression::ZSTD(parquet::basic::ZstdLevel::default()),
            "none" => Compression::UNCOMPRESSED,
            _ => {
                return Err(PipelineError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Write the record table to a Parquet file, chunked by row group size
    pub fn write_table(&self, table: &RecordTable, path: &Path) -> Result<()> {
        if table.is_empty() {
            return Ok(());
        }

        let schema = self.create_schema(table);
        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        for start in (0..table.len()).step_by(self.row_group_size) {
            let end = (start + self.row_group_size).min(table.len());
            let batch = self.records_to_batch(table, start..end, schema.clone())?;
            writer.write(&batch)?;
        }
        writer.close()?;

        Ok(())
    }

    fn create_schema(&self, table: &RecordTable) -> Arc<Schema> {
        let mut fields = vec![
            Field::new("region_id", DataType::Utf8, false),
            Field::new("date", DataType::Date32, false),
        ];
        for name in &table.metadata_fields {
            fields.push(Field::new(name, DataType::Utf8, true));
        }
        for name in &table.fields {
            fields.push(Field::new(name, DataType::Float64, true));
        }
        Arc::new(Schema::new(fields))
    }

    fn records_to_batch(
        &self,
        table: &RecordTable,
        range: std::ops::Range<usize>,
        schema: Arc<Schema>,
    ) -> Result<RecordBatch> {
        let records = &table.records[range];
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
            .ok_or_else(|| PipelineError::InvalidFormat("Invalid epoch date".to_string()))?;

        let ids: StringArray = records.iter().map(|r| Some(r.region_id.as_str())).collect();
        let dates: Date32Array = records
            .iter()
            .map(|r| Some((r.date - epoch).num_days() as i32))
            .collect();

        let mut columns: Vec<ArrayRef> = vec![Arc::new(ids), Arc::new(dates)];
        for name in &table.metadata_fields {
            let values: StringArray = records
                .iter()
                .map(|r| r.metadata.get(name).map(|v| v.as_str()))
                .collect();
            columns.push(Arc::new(values));
        }
        for name in &table.fields {
            let values: Float64Array = records.iter().map(|r| r.value(name)).collect();
            columns.push(Arc::new(values));
        }

        Ok(RecordBatch::try_new(schema, columns)?)
    }

    /// Row count and schema summary of a produced file
    pub fn get_file_info(&self, path: &Path) -> Result<FileInfo> {
        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        Ok(FileInfo {
            total_rows: metadata.file_metadata().num_rows() as usize,
            num_columns: metadata.file_metadata().schema_descr().num_columns(),
            num_row_groups: metadata.num_row_groups(),
            file_size_bytes: std::fs::metadata(path)?.len(),
        })
    }
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct FileInfo {
    pub total_rows: usize,
    pub num_columns: usize,
    pub num_row_groups: usize,
    pub file_size_bytes: u64,
}

impl FileInfo {
    pub fn summary(&self) -> String {
        format!(
            "Rows: {}\nColumns: {}\nRow groups: {}\nFile size: {:.1} KB",
            self.total_rows,
            self.num_columns,
            self.num_row_groups,
            self.file_size_bytes as f64 / 1024.0
        )
    }
}
