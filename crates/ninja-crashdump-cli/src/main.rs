//! # ninja-crashdump CLI
//!
//! Manual snapshots and configuration inspection for the crash dump writer.

use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ninja_crashdump::{DumpLog, DumpOptions, DumpWriter, TracingLog};
use ninja_crashdump_config::logging::init_logging;
use ninja_crashdump_config::{log_cli_debug, log_cli_info, Config, PROJECT_CONFIG_FILE};

/// Write and locate ninja crash dumps
#[derive(Parser)]
#[command(name = "ninja-crashdump")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory for dump files (default: system temp directory)
    #[arg(long, global = true, value_name = "DIR")]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dump path for this process
    Path,

    /// Write a minidump of this process now
    Write {
        /// Omit exception information from the dump
        #[arg(long)]
        no_context: bool,

        /// Diagnostic module to load
        #[arg(long)]
        module: Option<String>,

        /// Dump writer export to resolve
        #[arg(long)]
        entry_point: Option<String>,

        /// Leave the diagnostic module loaded afterwards
        #[arg(long)]
        keep_module: bool,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default configuration as TOML
    Default,
    /// Print config file locations
    Path,
}

/// Keeps the failure for `main` to report; success goes to `tracing`.
#[derive(Default)]
struct OutcomeLog {
    inner: TracingLog,
    failure: RefCell<Option<String>>,
}

impl DumpLog for OutcomeLog {
    fn error(&self, message: fmt::Arguments<'_>) {
        *self.failure.borrow_mut() = Some(message.to_string());
    }

    fn warning(&self, message: fmt::Arguments<'_>) {
        self.inner.warning(message);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load().context("failed to load configuration")?;
    init_logging(config.logging.level);

    if let Some(dir) = cli.dir {
        config.dump.directory = Some(dir);
    }

    match cli.command {
        Commands::Path => {
            let writer = DumpWriter::from_config(&config);
            let path = writer
                .dump_path()
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("{}", path.display());
        }
        Commands::Write {
            no_context,
            module,
            entry_point,
            keep_module,
        } => {
            if let Some(module) = module {
                config.dump.module = module;
            }
            if let Some(entry_point) = entry_point {
                config.dump.entry_point = entry_point;
            }
            write_snapshot(&config, no_context, keep_module)?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => print!("{}", config.to_toml()?),
            ConfigCommands::Default => print!("{}", Config::default_toml()?),
            ConfigCommands::Path => {
                match Config::global_config_path() {
                    Some(path) => println!("Global:  {}", path.display()),
                    None => println!("Global:  (no config directory)"),
                }
                println!("Project: {}", PROJECT_CONFIG_FILE);
            }
        },
    }

    Ok(())
}

fn write_snapshot(config: &Config, no_context: bool, keep_module: bool) -> Result<()> {
    // This process keeps running, so the module is released unless asked otherwise.
    let options = DumpOptions::from_config(&config.dump).with_unload_module(!keep_module);
    let writer = DumpWriter::with_log(options, OutcomeLog::default());
    let path = writer
        .dump_path()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    log_cli_debug!("writing manual snapshot", with_context = !no_context);
    run_dump(&writer, no_context);

    if let Some(failure) = writer.log().failure.take() {
        bail!(failure);
    }
    log_cli_info!("manual snapshot complete");
    println!("{}", path.display());
    Ok(())
}

#[cfg(windows)]
fn run_dump(writer: &DumpWriter<OutcomeLog>, no_context: bool) {
    if no_context {
        writer.create_mini_dump(None);
        return;
    }
    let mut captured = ninja_crashdump::CapturedContext::capture();
    captured.with_context(|ctx| writer.create_mini_dump(Some(ctx)));
}

#[cfg(not(windows))]
fn run_dump(writer: &DumpWriter<OutcomeLog>, _no_context: bool) {
    // No exception record can be captured outside Windows.
    writer.create_mini_dump(None);
}
