use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use powerprims_hw::{LocalConfig, ModuleSet};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod info;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve hardware modules to remote clients.
    Serve(ServeArgs),
    /// Issue one raw remote call.
    Call(CallArgs),
    /// Summarize topology and frequency domains of a machine.
    Info(InfoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// TCP port to listen on (0 picks a free port).
    #[arg(long, env = "POWERPRIMS_PORT")]
    pub port: u16,
    /// Address to bind.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,
    /// Serve the topology module.
    #[arg(long)]
    pub topology: bool,
    /// Serve the frequency module (requires --topology).
    #[arg(long)]
    pub cpufreq: bool,
    /// Serve the energy module (requires --topology).
    #[arg(long)]
    pub energy: bool,
    /// Serve the task module.
    #[arg(long)]
    pub task: bool,
    /// Serve every module.
    #[arg(long, conflicts_with_all = ["topology", "cpufreq", "energy", "task"])]
    pub all: bool,
    /// How often finished connections are reclaimed (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub sweep_interval: String,
    #[command(flatten)]
    pub local: LocalArgs,
}

impl ServeArgs {
    pub fn modules(&self) -> ModuleSet {
        if self.all {
            return ModuleSet::all();
        }
        ModuleSet {
            topology: self.topology,
            cpufreq: self.cpufreq,
            energy: self.energy,
            task: self.task,
        }
    }
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Server address as host:port.
    pub addr: String,
    /// Full type identifier, e.g. powerprims.topology.GetLayout.
    pub type_id: String,
    /// Request payload as hex.
    #[arg(long)]
    pub hex: Option<String>,
    /// Give up waiting for the response after this long (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Server address as host:port.
    #[arg(env = "POWERPRIMS_ADDR", required_unless_present = "local")]
    pub addr: Option<String>,
    /// Inspect this machine instead of a server.
    #[arg(long)]
    pub local: bool,
    #[command(flatten)]
    pub sysfs: LocalArgs,
}

#[derive(Args, Debug)]
pub struct LocalArgs {
    /// Root under which /sys and /proc are found.
    #[arg(long, value_name = "DIR", env = "POWERPRIMS_SYSFS_ROOT", default_value = "/")]
    pub sysfs_root: PathBuf,
}

impl LocalArgs {
    pub fn config(&self) -> LocalConfig {
        LocalConfig::with_sysfs_root(&self.sysfs_root)
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
