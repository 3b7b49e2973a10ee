//! icelab-assets：围绕外部 JS 打包器的配置层
//! - 多应用源码树的入口发现
//! - ASSETS_* 环境变量注入
//! - build / start / create-entry / inspect 子命令

mod build;
mod bundle_config;
mod bundler;
mod cli;
mod commands;
mod config;
mod create_entry;
mod dev_server;
mod env;
mod niceties;
mod paths;
mod sizes;
mod utils;

use std::process::ExitCode;

use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();
    let cli = cli::Cli::parse();
    match commands::run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// 日志输出到 stderr，级别由 ICELAB_ASSETS_LOG 控制（默认 warn）
fn init_tracing() {
    let filter = EnvFilter::try_from_env("ICELAB_ASSETS_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
