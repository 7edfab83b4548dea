use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::args::{Cli, Commands};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::processors::DailyPipeline;
use crate::readers::{FrameSource, ParquetFrameReader, RegionReader};
use crate::utils::generate_default_output_filename;
use crate::utils::progress::ProgressReporter;
use crate::writers::{CsvWriter, ParquetWriter};

pub async fn run(cli: Cli) -> Result<()> {
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .init();
    }

    match cli.command {
        Commands::Run {
            config,
            regions,
            frames_dir,
            output_file,
            format,
            compression,
            max_workers,
            quiet,
        } => {
            let config = PipelineConfig::from_file(&config)?;
            let regions = RegionReader::new().read_regions(&regions)?;

            if !quiet {
                println!(
                    "Processing {} regions, {} days, {} variable groups",
                    regions.len(),
                    config.day_count(),
                    config.groups.len()
                );
            }

            let sources = load_sources(&config, &frames_dir, max_workers).await?;

            let progress = ProgressReporter::new_spinner("Running pipeline...", quiet);
            let pipeline = DailyPipeline::new(max_workers);
            let table = pipeline.run(&config, &sources, regions, Some(&progress))?;

            let output_file =
                output_file.unwrap_or_else(|| generate_default_output_filename(&format));
            if let Some(parent) = output_file.parent() {
                std::fs::create_dir_all(parent)?;
            }

            match format.as_str() {
                "csv" => CsvWriter::new().write_table(&table, &output_file)?,
                "parquet" => {
                    let writer = ParquetWriter::new().with_compression(&compression)?;
                    writer.write_table(&table, &output_file)?;
                    let info = writer.get_file_info(&output_file)?;
                    if !quiet {
                        println!("\n{}", info.summary());
                    }
                }
                other => {
                    return Err(PipelineError::Config(format!(
                        "Unsupported output format: {}",
                        other
                    )))
                }
            }

            if !quiet {
                println!(
                    "Wrote {} records to {}",
                    table.len(),
                    output_file.display()
                );
            }
        }

        Commands::Validate { config, regions } => {
            let config = PipelineConfig::from_file(&config)?;
            let regions = RegionReader::new().read_regions(&regions)?;

            let invalid: Vec<&str> = regions
                .iter()
                .filter(|r| r.validate_geometry().is_err())
                .map(|r| r.id.as_str())
                .collect();

            println!(
                "Configuration OK: {} days, {} groups, {} output fields",
                config.day_count(),
                config.groups.len(),
                config.output_fields.len()
            );
            println!(
                "Regions: {} total, {} with invalid geometry",
                regions.len(),
                invalid.len()
            );
            for id in invalid {
                println!("  invalid geometry: {}", id);
            }
        }

        Commands::Info { file } => {
            let info = ParquetWriter::new().get_file_info(&file)?;
            println!("{}", info.summary());
        }
    }

    Ok(())
}

/// Load one frame source per distinct group source name from
/// `frames_dir/<source>/`
async fn load_sources(
    config: &PipelineConfig,
    frames_dir: &Path,
    max_workers: usize,
) -> Result<BTreeMap<String, Arc<dyn FrameSource>>> {
    let mut names: Vec<&str> = config.groups.iter().map(|g| g.source.as_str()).collect();
    names.sort();
    names.dedup();

    let mut sources: BTreeMap<String, Arc<dyn FrameSource>> = BTreeMap::new();
    for name in names {
        let dir: PathBuf = frames_dir.join(name);
        let source = ParquetFrameReader::new(max_workers)
            .read_source_dir(&dir)
            .await?;
        sources.insert(name.to_string(), Arc::new(source));
    }
    Ok(sources)
}
