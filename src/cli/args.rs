use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "zonal-series")]
#[command(about = "Daily compositing and zonal time-series extraction for geophysical rasters")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline and export the (region, date) table
    Run {
        #[arg(short, long, help = "Pipeline configuration JSON file")]
        config: PathBuf,

        #[arg(short, long, help = "Region file (points CSV or regions JSON)")]
        regions: PathBuf,

        #[arg(
            short,
            long,
            help = "Directory with one subdirectory of frame Parquet files per source"
        )]
        frames_dir: PathBuf,

        #[arg(
            short,
            long,
            help = "Output file path [default: output/zonal-series-{YYMMDD}.{ext}]"
        )]
        output_file: Option<PathBuf>,

        #[arg(long, default_value = "csv", help = "Output format: csv or parquet")]
        format: String,

        #[arg(long, default_value = "snappy")]
        compression: String,

        #[arg(long, default_value_t = num_cpus::get())]
        max_workers: usize,

        #[arg(long, help = "Suppress progress output")]
        quiet: bool,
    },

    /// Check a configuration and region file without running the pipeline
    Validate {
        #[arg(short, long, help = "Pipeline configuration JSON file")]
        config: PathBuf,

        #[arg(short, long, help = "Region file (points CSV or regions JSON)")]
        regions: PathBuf,
    },

    /// Display information about a produced Parquet file
    Info {
        #[arg(short, long)]
        file: PathBuf,
    },
}
