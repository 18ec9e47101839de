use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::debug;
use vmprobe::commands::{
    brand_command, brands_command, check_command, conclusion_command, count_command,
    detect_command, percent_command, report_command, status_command, summary_command,
    techniques_command, type_command,
};
use vmprobe::{effective_flags, init_logging, load_config, parse_flagset};
use vmprobe_core::{Engine, HostProbe};

/// Detect whether this process runs inside a virtual machine or sandbox.
///
/// A thin wrapper around `vmprobe-core`; every command evaluates the host
/// once and reports a different view of the result.
#[derive(Parser, Debug)]
#[command(name = "vmprobe", version, about = "Virtual machine and sandbox detection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Techniques to run: `all`, `default`, decimal, 0x hex, or labels like `VMID,MAC`.
    #[arg(long, global = true)]
    flags: Option<String>,

    /// Also run the cursor idle technique (blocks for the configured idle window).
    #[arg(long, global = true, default_value_t = false)]
    enable_cursor: bool,

    /// Engine configuration file (JSON, or YAML by extension).
    #[arg(long, global = true, env = "VMPROBE_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity on stderr (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-technique results followed by brand, likeliness and verdict (default).
    Summary,

    /// Print `true` if the environment is judged virtual.
    Detect,

    /// Print the most likely vendor, or `Unknown`.
    Brand,

    /// Print the likeliness percentage (0-100).
    Percent,

    /// Print the vendor's classification.
    Type,

    /// Print a one-line verdict.
    Conclusion,

    /// Print nothing; exit 0 when virtual, 1 otherwise.
    Status,

    /// Print how many techniques detected.
    Count,

    /// List every brand the engine can report.
    Brands {
        /// Emit JSON instead of plain names.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the techniques available on this platform.
    Techniques {
        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Validate a single-technique flagset and run only that technique.
    Check {
        /// Exactly one technique, e.g. `MAC` or `0x200`.
        flagset: String,
    },

    /// Show the full evaluation report.
    Report {
        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let flags = effective_flags(cli.flags.as_deref(), cli.enable_cursor)?;
    debug!("running with flags {flags} and {config:?}");
    let engine = Engine::with_config(HostProbe::new(), config);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command.unwrap_or(Command::Summary) {
        Command::Summary => summary_command(&engine, flags, &mut out)?,
        Command::Detect => detect_command(&engine, flags, &mut out)?,
        Command::Brand => brand_command(&engine, flags, &mut out)?,
        Command::Percent => percent_command(&engine, flags, &mut out)?,
        Command::Type => type_command(&engine, flags, &mut out)?,
        Command::Conclusion => conclusion_command(&engine, flags, &mut out)?,
        Command::Status => {
            let code = if status_command(&engine, flags) { 0 } else { 1 };
            return Ok(ExitCode::from(code));
        }
        Command::Count => count_command(&engine, flags, &mut out)?,
        Command::Brands { json } => brands_command(json, &mut out)?,
        Command::Techniques { json } => techniques_command(&engine, json, &mut out)?,
        Command::Check { flagset } => check_command(&engine, parse_flagset(&flagset)?, &mut out)?,
        Command::Report { json } => report_command(&engine, flags, json, &mut out)?,
    }

    out.flush()?;
    Ok(ExitCode::SUCCESS)
}
