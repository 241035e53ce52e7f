use anyhow::Context;
use clap::Parser;
use power_ingest::IngestionPipeline;
use power_ingest::cli::{Args, print_summary, setup_logging};
use std::process;

fn main() {
    // A missing .env file is fine; real environment variables still apply
    dotenv::dotenv().ok();

    let args = Args::parse();

    if let Err(error) = setup_logging(&args) {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }

    match run(args) {
        Ok(()) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = args.into_config();
    let dry_run = config.dry_run;
    let pipeline = IngestionPipeline::new(config)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    let summary = runtime.block_on(pipeline.run())?;

    print_summary(&summary, dry_run);
    Ok(())
}
