// 文件: cli.rs
// 作用: 命令行接口定义，使用 clap 派生宏描述参数和子命令。

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use oscilla_config::{ConfigError, SpringConfigPatch};

use crate::utils::version;

/// 主命令行结构
#[derive(Parser)]
#[command(author, version = version(), about, long_about = None)]
#[command(subcommand_value_name = "SUBCOMMAND")]
#[command(subcommand_help_heading = "Subcommands")]
pub struct Cli {
    #[command(subcommand)]
    pub subcommand: Sub,
}

#[derive(Subcommand)]
pub enum Sub {
    /// Run a spring on a simulated display and print every frame.
    Simulate(SimulateArgs),

    /// Validate a spring config file.
    Validate {
        /// Path to the config file (JSON). Defaults to the built-in config.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate shell completions.
    Completions { shell: Shell },
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Path to the config file (JSON). Defaults to the built-in config.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the value the spring starts from.
    #[arg(long, allow_negative_numbers = true)]
    pub from: Option<f64>,

    /// Override the value the spring settles at.
    #[arg(long, allow_negative_numbers = true)]
    pub to: Option<f64>,

    /// Override the initial velocity, in value units per second.
    #[arg(long, allow_negative_numbers = true)]
    pub velocity: Option<f64>,

    /// Maximum number of frames to run.
    #[arg(long, default_value_t = 1000)]
    pub frames: u64,

    /// Display refresh rate in Hz.
    #[arg(long, default_value_t = 60.)]
    pub refresh_hz: f64,

    /// Animation speed multiplier (0.5 runs at half speed).
    #[arg(long, default_value_t = 1.)]
    pub rate: f64,

    /// Apply a config patch before a frame, e.g. `--update '10={"toValue":5}'`.
    ///
    /// Can be repeated. Patches for the same frame are applied in order.
    #[arg(long = "update", value_name = "FRAME=JSON")]
    pub updates: Vec<UpdateAt>,

    /// Print frames as JSON instead of a table.
    #[arg(short, long)]
    pub json: bool,
}

impl SimulateArgs {
    /// Patch built from the `--from`, `--to` and `--velocity` overrides.
    pub fn overrides(&self) -> SpringConfigPatch {
        SpringConfigPatch {
            from_value: self.from,
            to_value: self.to,
            initial_velocity: self.velocity,
            ..Default::default()
        }
    }
}

/// A config patch scheduled before a given frame.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateAt {
    pub frame: u64,
    pub patch: SpringConfigPatch,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateAtError {
    #[error("expected FRAME=JSON")]
    MissingSeparator,
    #[error("invalid frame number {0:?}")]
    Frame(String),
    #[error(transparent)]
    Patch(#[from] ConfigError),
}

impl FromStr for UpdateAt {
    type Err = UpdateAtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (frame, json) = s.split_once('=').ok_or(UpdateAtError::MissingSeparator)?;
        let frame = frame
            .trim()
            .parse()
            .map_err(|_| UpdateAtError::Frame(frame.to_owned()))?;
        let patch = SpringConfigPatch::parse(json)?;
        Ok(Self { frame, patch })
    }
}
