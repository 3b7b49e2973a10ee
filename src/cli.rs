//! CLI 定义模块：仅负责命令行参数结构体与解析
//! 将 clap 的声明与业务逻辑解耦，路径类参数对所有子命令全局生效。

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::bundle_config::Mode;

/// 顶层 CLI 入口
#[derive(Parser, Debug)]
#[command(name = "icelab-assets", about = "Bundler configuration and asset scripts for multi-app source trees", version)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) paths: PathArgs,
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// 全局路径参数（未指定时依次回退到环境变量、配置文件、默认值）
#[derive(Args, Debug, Default)]
pub(crate) struct PathArgs {
    /// 源码根目录，默认：apps
    #[arg(long, global = true, value_name = "DIR")]
    pub(crate) app_source: Option<PathBuf>,
    /// 输出目录，默认：public/assets
    #[arg(long, global = true, value_name = "DIR")]
    pub(crate) build_path: Option<PathBuf>,
    /// 资源对外服务路径，默认：/assets/
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) public_path: Option<String>,
    /// 配置文件路径，默认自动查找 assets.yaml / assets.yml / .assets.yaml
    #[arg(long, global = true, value_name = "FILE")]
    pub(crate) config: Option<PathBuf>,
}

/// 子命令定义
#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// 生产构建：清空输出目录、调用打包器并打印 gzip 体积
    Build,
    /// 开发模式：监视源码、增量重建并提供静态资源服务
    Start {
        /// 启动后自动在浏览器打开入口索引页
        #[arg(long)]
        open: bool,
    },
    /// 从模板创建新的入口目录
    CreateEntry {
        /// 目标目录
        #[arg(value_name = "PATH")]
        path: PathBuf,
        /// 使用磁盘上的模板目录替代内置模板
        #[arg(long, value_name = "DIR")]
        template: Option<PathBuf>,
    },
    /// 打印生成的打包器配置（不调用打包器）
    Inspect {
        #[arg(long, value_enum, default_value_t = ModeArg::Development)]
        mode: ModeArg,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ModeArg {
    Development,
    Production,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Development => Mode::Development,
            ModeArg::Production => Mode::Production,
        }
    }
}
