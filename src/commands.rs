//! 命令调度模块：
//! - 接收解析好的 CLI 参数，计算“有效参数”（CLI > 环境变量 > 配置文件 > 默认）
//! - 调用构建、开发服务、脚手架、配置检查等模块

use anyhow::{Context, Result};
use console::style;
use std::{env, path::PathBuf, process::ExitCode};
use tracing::{debug, info};

use crate::{
    build::{build, BuildOutcome},
    bundle_config::{BundleConfig, DevServer, Mode},
    bundler::Bundler,
    cli::{Cli, Command, PathArgs},
    config::{self, Settings},
    create_entry::{create_entry, ScaffoldOutcome},
    dev_server::{self, DevContext},
    env::ClientEnvironment,
    niceties,
    paths::{PathInputs, Paths},
    utils::{env_ci, env_opt_string, env_opt_u16},
};

/// 运行指定的子命令
pub(crate) fn run(cli: Cli) -> Result<ExitCode> {
    let cwd = env::current_dir().context("failed to read current directory")?;
    let loaded = config::load_settings(cli.paths.config.as_deref(), &cwd)?;
    info!(source = %config::describe_source(&loaded.source), "settings loaded");
    let settings = loaded.settings;

    match cli.command {
        Command::Build => {
            load_dotenv();
            let paths = Paths::resolve(&cwd, path_inputs(&cli.paths, &settings))?;
            // 生产构建固定注入 production
            let client_env = ClientEnvironment::capture(Some(Mode::Production.as_str()));
            let bundler = Bundler::new(&settings.bundler, &paths.app_path);
            let outcome = build(&paths, &client_env, &bundler, &settings.resolve.extensions, env_ci())?;
            Ok(match outcome {
                BuildOutcome::Succeeded => ExitCode::SUCCESS,
                BuildOutcome::Failed => ExitCode::FAILURE,
            })
        }
        Command::Start { open } => {
            load_dotenv();
            let ctx = DevContext {
                inputs: path_inputs(&cli.paths, &settings),
                server: dev_server_from_env(),
                bundler: Bundler::new(&settings.bundler, &cwd),
                extensions: settings.resolve.extensions.clone(),
                app_dir: cwd,
            };
            dev_server::start(ctx, open)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::CreateEntry { path, template } => {
            let template = template.or(settings.template_dir);
            match create_entry(&path, template.as_deref())? {
                ScaffoldOutcome::Created => {
                    println!("Success! Created entry at: {}", style(path.display()).green());
                    Ok(ExitCode::SUCCESS)
                }
                ScaffoldOutcome::NotEmpty => {
                    eprintln!(
                        "Could not create entry at {} as it contains existing files.",
                        style(path.display()).green()
                    );
                    Ok(ExitCode::FAILURE)
                }
                ScaffoldOutcome::TemplateMissing(t) => {
                    eprintln!("Could not locate supplied template: {}", style(t.display()).green());
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Inspect { mode } => {
            load_dotenv();
            let mode = Mode::from(mode);
            let paths = Paths::resolve(&cwd, path_inputs(&cli.paths, &settings))?;
            let extensions = &settings.resolve.extensions;
            let config = match mode {
                Mode::Production => {
                    let client_env = ClientEnvironment::capture(Some(Mode::Production.as_str()));
                    BundleConfig::production(&paths, &client_env, extensions)
                }
                Mode::Development => {
                    let client_env = ClientEnvironment::capture(None);
                    let server = dev_server_from_env();
                    let niceties_path = paths.cache_dir().join(niceties::CLIENT_FILE);
                    BundleConfig::development(&paths, &client_env, &server, &niceties_path, extensions)?
                }
            };
            println!("{}", config.inspect_json()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// 合并路径参数：CLI > ASSETS_* 环境变量 > 配置文件；默认值在 `Paths::resolve` 中补齐
pub(crate) fn path_inputs(args: &PathArgs, settings: &Settings) -> PathInputs {
    merge_path_inputs(args, settings, env_opt_string)
}

fn merge_path_inputs<F>(args: &PathArgs, settings: &Settings, lookup: F) -> PathInputs
where
    F: Fn(&str) -> Option<String>,
{
    PathInputs {
        app_source: args
            .app_source
            .clone()
            .or_else(|| lookup("ASSETS_APP_SOURCE").map(PathBuf::from))
            .or_else(|| settings.app_source.clone()),
        build_path: args
            .build_path
            .clone()
            .or_else(|| lookup("ASSETS_BUILD_PATH").map(PathBuf::from))
            .or_else(|| settings.build_path.clone()),
        public_path: args
            .public_path
            .clone()
            .or_else(|| lookup("ASSETS_PUBLIC_PATH"))
            .or_else(|| settings.public_path.clone()),
        node_path: lookup("NODE_PATH"),
        public_url: lookup("PUBLIC_URL"),
    }
}

fn dev_server_from_env() -> DevServer {
    DevServer::from_values(
        env_opt_string("ASSETS_HTTPS").as_deref(),
        env_opt_string("ASSETS_HOST"),
        env_opt_u16("ASSETS_PORT"),
    )
}

// .env 不会覆盖已经存在的环境变量
fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(p) => debug!(path = %p.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => debug!(error = %e, "failed to load .env"),
    }
}
