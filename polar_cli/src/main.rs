mod backend;
mod cli;
mod error_fmt;
mod output;
mod run;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use polar_core::PolarError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn file_layer(logging: &polar_config::Logging) -> eyre::Result<Option<BoxedLayer>> {
    let Some(file) = logging.file.as_deref() else {
        return Ok(None);
    };
    let path = Path::new(file);
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file}"))?;
    std::fs::create_dir_all(dir).wrap_err_with(|| format!("create log dir {}", dir.display()))?;

    let appender = match logging.rotation.as_deref().unwrap_or("never") {
        "daily" => tracing_appender::rolling::daily(dir, name),
        "hourly" => tracing_appender::rolling::hourly(dir, name),
        _ => tracing_appender::rolling::never(dir, name),
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);

    let level = logging.level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_new(level).wrap_err("logging.level")?;
    Ok(Some(
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    ))
}

/// Console logs go to stderr so stdout carries only cycle output.
fn init_tracing(json: bool, level: &str, logging: Option<&polar_config::Logging>) -> eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err("invalid --log-level")?;
    let console: BoxedLayer = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    };
    let mut layers = vec![console];
    if let Some(logging) = logging
        && let Some(layer) = file_layer(logging)?
    {
        layers.push(layer);
    }
    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}

fn load_config(path: &Path) -> eyre::Result<polar_config::Config> {
    polar_config::load_file(path)
        .map_err(|e| eyre::Report::new(PolarError::InvalidConfiguration(format!("{e:#}"))))
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    // Config first: logging settings live in it. A bad config still gets
    // console logging so the failure is visible.
    let cfg = load_config(&cli.config);
    init_tracing(cli.json, &cli.log_level, cfg.as_ref().ok().map(|c| &c.logging))?;
    let cfg = cfg?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::Run {
            cycles,
            period_ms,
            yes,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                .wrap_err("install Ctrl-C handler")?;
            let summary = run::run_loop(&cfg, cli.json, cycles, period_ms, yes, &shutdown)?;
            if cli.json {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "status": "stopped",
                        "cycles": summary.cycles,
                        "skipped": summary.skipped,
                        "interrupted": summary.interrupted,
                    })
                );
            } else {
                eprintln!(
                    "Stopped after {} cycles ({} skipped){}",
                    summary.cycles,
                    summary.skipped,
                    if summary.interrupted { ", interrupted" } else { "" }
                );
            }
        }
        Commands::Calibrate { mass, yes } => {
            let outcome = run::calibrate(&cfg, mass, yes)?;
            println!("{}", run::calibration_report(&outcome, cli.json));
        }
        Commands::SelfCheck => {
            println!("{}", run::self_check(&cfg, cli.json)?);
        }
    }
    Ok(())
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let json = cli.json;
    let _ = JSON_MODE.set(json);

    if let Err(e) = real_main(cli) {
        tracing::error!(error = %e, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}
