//! `mdsync`: pulls records from a paginated content source and writes them
//! as Markdown documents with JSON front matter.
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use mdsync_engine::{
    ensure_output_dir, DriverSettings, HttpImageMaterializer, MarkdownFileWriter, SyncDriver,
    SyncReport,
};
use sync_logging::{sync_error, sync_info, LogSettings};

use crate::config::{load_config, SyncConfig};

#[derive(Parser, Debug)]
#[command(name = "mdsync", about = "Sync paginated content into Markdown files")]
struct Cli {
    /// Run configuration (`.ron` or `.json`).
    #[arg(long, short, default_value = "./mdsync.ron")]
    config: PathBuf,

    /// Fetch and convert everything, but write no files.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Also write the log to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn log_settings(&self) -> LogSettings {
        let level = match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        LogSettings {
            level,
            terminal: true,
            file: self.log_file.clone(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    sync_logging::initialize(&cli.log_settings());

    match run(&cli) {
        Ok(report) => {
            println!(
                "{} records from {} pages, {} documents written{}",
                report.records,
                report.pages,
                report.written.len(),
                if report.truncated { " (truncated)" } else { "" }
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            sync_error!("sync failed: {:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<SyncReport> {
    let config = load_config(&cli.config)?;
    let driver = build_driver(&config, cli.dry_run)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let report = runtime.block_on(driver.run())?;
    sync_info!(
        "sync finished: {} pages, {} records",
        report.pages,
        report.records
    );
    Ok(report)
}

/// Validates everything configurable before anything is fetched.
fn build_driver(config: &SyncConfig, dry_run: bool) -> Result<SyncDriver> {
    let mapping = config
        .mapping
        .compile()
        .context("invalid mapping specification")?;
    let source = config
        .source
        .build(config.http.json_settings(), mapping.extractor())?;

    if !dry_run {
        ensure_output_dir(&config.output.dir).with_context(|| {
            format!("output directory {} is unusable", config.output.dir.display())
        })?;
    }
    let images = HttpImageMaterializer::new(
        config.http.image_settings(),
        config.output.images_path(),
        config.output.images_dir.as_str(),
    )?;
    let sink = MarkdownFileWriter::for_spec(&config.output.dir, &config.mapping);

    let settings = DriverSettings {
        plan: config.fetch.plan(),
        max_pages: config.fetch.max_pages,
        dry_run,
    };
    Ok(SyncDriver::new(
        source,
        mapping,
        Box::new(images),
        Box::new(sink),
        settings,
    ))
}
