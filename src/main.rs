// 文件: main.rs
// 作用: oscilla 命令行入口：初始化日志，解析子命令，加载配置并运行模拟。

#[macro_use]
// 启用tracing宏，允许在代码中使用如info!、warn!等日志宏
extern crate tracing;

use std::env;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use oscilla::cli::{Cli, SimulateArgs, Sub};
use oscilla::simulate::{apply_overrides, Report, Simulation};
use oscilla::utils::version;
use oscilla_config::SpringConfig;
use tracing_subscriber::EnvFilter;

// 默认日志过滤规则
const DEFAULT_LOG_FILTER: &str = "oscilla=debug,oscilla_config=debug";

// 内置默认配置
const DEFAULT_CONFIG: &str = include_str!("../resources/default-spring.json");

fn main() -> anyhow::Result<()> {
    // 配置日志过滤器：从环境变量RUST_LOG获取，否则使用默认值
    let directives = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_owned());
    let env_filter = EnvFilter::builder().parse_lossy(directives);
    // 初始化日志系统：紧凑格式、输出到stderr、应用过滤器
    tracing_subscriber::fmt()
        .compact()
        .with_writer(io::stderr)
        .with_env_filter(env_filter)
        .init();

    // 解析命令行参数
    let cli = Cli::parse();

    match cli.subcommand {
        Sub::Validate { config } => {
            tracy_client::Client::start();

            let config = load_config(config)?;
            if config.is_settled() {
                warn!("config starts at rest, the spring will stop right after starting");
            }
            info!(damping_ratio = config.damping_ratio(), "config is valid");
        }
        Sub::Simulate(args) => {
            tracy_client::Client::start();
            info!("starting version {}", &version());

            simulate(args)?;
        }
        Sub::Completions { shell } => {
            // 生成指定shell的补全脚本
            clap_complete::generate(shell, &mut Cli::command(), "oscilla", &mut io::stdout());
        }
    }

    Ok(())
}

fn simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.clone())?;
    let config = apply_overrides(config, &args.overrides()).context("invalid override")?;

    let simulation = Simulation {
        rate: args.rate,
        max_frames: args.frames,
        updates: args.updates.clone(),
        ..Simulation::new(config)
    }
    .with_refresh_hz(args.refresh_hz);

    let report = simulation.run().context("error running the spring")?;

    let mut stdout = io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut stdout, &report).context("error writing JSON")?;
        writeln!(stdout)?;
    } else {
        stdout.write_all(format_table(&report).as_bytes())?;
    }

    Ok(())
}

fn format_table(report: &Report) -> String {
    let mut buf = String::new();
    writeln!(buf, "{:>6} {:>10} {:>14} {:>14}", "frame", "time (ms)", "value", "velocity").unwrap();
    for sample in &report.samples {
        writeln!(
            buf,
            "{:>6} {:>10.3} {:>14.6} {:>14.6}",
            sample.frame, sample.time_ms, sample.value, sample.velocity
        )
        .unwrap();
    }

    let outcome = if report.settled { "settled" } else { "still moving" };
    writeln!(buf, "{outcome} after {} frames", report.frames).unwrap();
    buf
}

/// Loads the config from `path`, then from `$OSCILLA_CONFIG`, then the built-in default.
fn load_config(path: Option<PathBuf>) -> anyhow::Result<SpringConfig> {
    // 命令行参数优先于环境变量
    let path = path.or_else(env_config_path);

    match path {
        Some(path) => {
            SpringConfig::load(&path).with_context(|| format!("error loading config {path:?}"))
        }
        None => {
            debug!("using the built-in config");
            SpringConfig::parse(DEFAULT_CONFIG).context("error parsing the built-in config")
        }
    }
}

fn env_config_path() -> Option<PathBuf> {
    env::var_os("OSCILLA_CONFIG")
        .filter(|x| !x.is_empty())
        .map(PathBuf::from)
}
