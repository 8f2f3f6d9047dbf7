//! Gantry Control - verify, update and launch a deployed application.
//!
//! Owns the outer control loop the engine itself stays out of: initialize,
//! verify metadata, recover stale control files and resources, and launch
//! once the install checks out. Retry policy lives here, bounded by
//! `--max-attempts`.

use anyhow::{bail, Context, Result};
use clap::Parser;
use gantry_core::{Application, Fetcher, HttpFetcher, CONFIG_FILE, DIGEST_FILE};
use std::path::PathBuf;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "gantryctl")]
#[command(about = "Verify, update and launch a deployed application", long_about = None)]
#[command(version)]
struct Cli {
    /// Application install directory
    appdir: PathBuf,

    /// Maximum verify/recover cycles before giving up
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Verify and update only; do not launch the application
    #[arg(long)]
    no_launch: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();
    let mut app = Application::new(&cli.appdir);
    let fetcher = HttpFetcher::new();

    let ui = app
        .init()
        .with_context(|| format!("failed to read deployment descriptor in {}", cli.appdir.display()))?;
    if let Some(name) = &ui.name {
        info!("Preparing {}", name);
    }

    for attempt in 1..=cli.max_attempts {
        info!("Verification pass {}/{}", attempt, cli.max_attempts);

        let needs_update = match app.verify_metadata() {
            Ok(needs_update) => needs_update,
            Err(e) => {
                warn!("Metadata verification failed: {} (key={})", e, e.key());
                if attempt == cli.max_attempts {
                    return Err(e.into());
                }
                // one more shot with a freshly fetched descriptor
                app.attempt_recovery()
                    .context("descriptor recovery failed")?;
                app.init().context("recovered descriptor is unusable")?;
                continue;
            }
        };

        if needs_update {
            info!(
                "Installed version {} is behind target {}; fetching new deployment",
                app.descriptor().version,
                app.target_version()
            );
            app.download_control_file(CONFIG_FILE)?;
            app.download_control_file(DIGEST_FILE)?;
            app.init()?;
            continue;
        }

        let failures = app.verify_resources();
        if failures.is_empty() {
            info!("Application is up to date");
            if cli.no_launch {
                info!("Verification complete; not launching");
                return Ok(());
            }
            let mut child = app.create_process().context("failed to launch application")?;
            let status = child.wait().context("failed to wait for application")?;
            info!("Application exited with {}", status);
            std::process::exit(status.code().unwrap_or(1));
        }

        info!("{} resource(s) failed validation; redownloading", failures.len());
        for rsrc in &failures {
            rsrc.clear_marker();
            if let Err(e) = fetcher.fetch(rsrc.remote(), rsrc.local()) {
                warn!("Failed to redownload {}: {}", rsrc, e);
            }
        }
    }

    bail!(
        "application could not be brought up to date after {} attempts",
        cli.max_attempts
    );
}
