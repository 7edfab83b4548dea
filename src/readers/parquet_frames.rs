use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, Float64Array, Int64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDateTime};
use ndarray::Array2;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use crate::error::{PipelineError, Result};
use crate::models::{GridSpec, SourceFrame};
use crate::readers::InMemoryFrameSource;
use crate::utils::constants::GRID_SIDECAR_FILE;

/// One no-data-free raster pixel sample as stored in the frame Parquet
/// files (columns: timestamp, band, row, col, value).
#[derive(Debug, Clone)]
pub struct PixelObservation {
    pub timestamp: NaiveDateTime,
    pub band: String,
    pub row: u32,
    pub col: u32,
    pub value: f64,
}

/// Reads a directory of pixel-observation Parquet files plus a `grid.json`
/// sidecar into an in-memory frame source. Files are loaded concurrently.
pub struct ParquetFrameReader {
    max_workers: usize,
}

impl ParquetFrameReader {
    pub fn new(max_workers: usize) -> Self {
        Self { max_workers }
    }

    /// Load the grid definition stored next to the frame files
    pub fn load_grid(dir: &Path) -> Result<GridSpec> {
        let path = dir.join(GRID_SIDECAR_FILE);
        let file = File::open(&path).map_err(|e| {
            PipelineError::MissingData(format!("Cannot open {}: {}", path.display(), e))
        })?;
        let grid: GridSpec = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(grid)
    }

    /// Read every Parquet file in the directory into one frame source
    pub async fn read_source_dir(&self, dir: &Path) -> Result<InMemoryFrameSource> {
        let grid = Self::load_grid(dir)?;

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("parquet"))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(PipelineError::MissingData(format!(
                "No Parquet frame files in {}",
                dir.display()
            )));
        }

        // Bounded fan-out: chunks of files read on blocking threads
        let mut observations: Vec<PixelObservation> = Vec::new();
        for chunk in paths.chunks(self.max_workers.max(1)) {
            let mut handles = Vec::with_capacity(chunk.len());
            for path in chunk {
                let path = path.clone();
                handles.push(tokio::task::spawn_blocking(move || {
                    Self::read_observations(&path)
                }));
            }
            for handle in handles {
                observations.extend(handle.await??);
            }
        }

        let frames = Self::assemble_frames(&grid, observations)?;
        InMemoryFrameSource::new(grid, frames)
    }

    /// Read one Parquet file of pixel observations
    pub fn read_observations(path: &Path) -> Result<Vec<PixelObservation>> {
        let file = File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut observations = Vec::new();
        for batch in reader {
            let batch = batch?;
            let timestamps = Self::column::<Int64Array>(&batch, "timestamp", path)?;
            let bands = Self::column::<StringArray>(&batch, "band", path)?;
            let rows = Self::column::<UInt32Array>(&batch, "row", path)?;
            let cols = Self::column::<UInt32Array>(&batch, "col", path)?;
            let values = Self::column::<Float64Array>(&batch, "value", path)?;

            for i in 0..batch.num_rows() {
                let timestamp = DateTime::from_timestamp(timestamps.value(i), 0)
                    .ok_or_else(|| {
                        PipelineError::InvalidFormat(format!(
                            "Invalid epoch timestamp {} in {}",
                            timestamps.value(i),
                            path.display()
                        ))
                    })?
                    .naive_utc();
                observations.push(PixelObservation {
                    timestamp,
                    band: bands.value(i).to_string(),
                    row: rows.value(i),
                    col: cols.value(i),
                    value: values.value(i),
                });
            }
        }
        Ok(observations)
    }

    fn column<'a, T: 'static>(
        batch: &'a RecordBatch,
        name: &str,
        path: &Path,
    ) -> Result<&'a T> {
        batch
            .column_by_name(name)
            .and_then(|col| col.as_any().downcast_ref::<T>())
            .ok_or_else(|| {
                PipelineError::InvalidFormat(format!(
                    "Missing or mistyped column '{}' in {}",
                    name,
                    path.display()
                ))
            })
    }

    /// Group observations by timestamp into dense NaN-initialized bands
    fn assemble_frames(
        grid: &GridSpec,
        observations: Vec<PixelObservation>,
    ) -> Result<Vec<SourceFrame>> {
        let (height, width) = grid.shape();
        let mut grouped: BTreeMap<NaiveDateTime, BTreeMap<String, Array2<f64>>> = BTreeMap::new();

        for obs in observations {
            let (row, col) = (obs.row as usize, obs.col as usize);
            if row >= height || col >= width {
                return Err(PipelineError::GridMismatch(format!(
                    "Observation at ({}, {}) outside {}x{} grid",
                    row, col, height, width
                )));
            }
            let band = grouped
                .entry(obs.timestamp)
                .or_default()
                .entry(obs.band)
                .or_insert_with(|| Array2::from_elem((height, width), f64::NAN));
            band[(row, col)] = obs.value;
        }

        Ok(grouped
            .into_iter()
            .map(|(timestamp, bands)| SourceFrame::new(timestamp, bands))
            .collect())
    }
}

impl Default for ParquetFrameReader {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

/// Write pixel observations to a Parquet file in the layout the reader
/// expects. Used for fixtures and by tooling that stages frame data.
pub fn write_observations(path: &Path, observations: &[PixelObservation]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("timestamp", DataType::Int64, false),
        Field::new("band", DataType::Utf8, false),
        Field::new("row", DataType::UInt32, false),
        Field::new("col", DataType::UInt32, false),
        Field::new("value", DataType::Float64, false),
    ]));

    let timestamps =
        Int64Array::from_iter_values(observations.iter().map(|o| o.timestamp.and_utc().timestamp()));
    let bands: StringArray = observations.iter().map(|o| Some(o.band.as_str())).collect();
    let rows = UInt32Array::from_iter_values(observations.iter().map(|o| o.row));
    let cols = UInt32Array::from_iter_values(observations.iter().map(|o| o.col));
    let values = Float64Array::from_iter_values(observations.iter().map(|o| o.value));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(timestamps),
            Arc::new(bands),
            Arc::new(rows),
            Arc::new(cols),
            Arc::new(values),
        ],
    )?;

    let file = File::create(path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Write the grid sidecar next to frame files
pub fn write_grid_sidecar(dir: &Path, grid: &GridSpec) -> Result<()> {
    let file = File::create(dir.join(GRID_SIDECAR_FILE))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), grid)?;
    Ok(())
}
