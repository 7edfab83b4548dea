use clap::Parser;
use zonal_series::cli::{run, Cli};
use zonal_series::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
