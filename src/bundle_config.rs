//! 打包器配置生成模块：
//! - 开发/生产两套配置；JSON 只包含 webpack 合法的顶层字段
//! - JSON 无法表达的部分（DefinePlugin、CSS 规则与抽取插件）由生成的 JS 加载文件补上
//! - 开发服务器地址（ASSETS_HTTPS / ASSETS_HOST / ASSETS_PORT）

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Serialize, Serializer};
use tera::{Context as TContext, Tera};
use url::Url;

use crate::{env::ClientEnvironment, paths::Paths};

pub(crate) const DEFAULT_DEV_HOST: &str = "localhost";
pub(crate) const DEFAULT_DEV_PORT: u16 = 8080;
pub(crate) const CSS_FILENAME: &str = "[name].css";
const LOADER_TEMPLATE: &str = include_str!("assets/bundler.config.js");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Mode {
    Development,
    Production,
}

impl Mode {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

/// 开发服务器地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DevServer {
    pub(crate) https: bool,
    pub(crate) host: String,
    pub(crate) port: u16,
}

impl Default for DevServer {
    fn default() -> Self {
        Self { https: false, host: DEFAULT_DEV_HOST.to_string(), port: DEFAULT_DEV_PORT }
    }
}

impl DevServer {
    /// 只有 ASSETS_HTTPS 恰为 `true` 时才使用 https；端口解析失败回退到 8080
    pub(crate) fn from_values(https: Option<&str>, host: Option<String>, port: Option<u16>) -> Self {
        Self {
            https: https == Some("true"),
            host: host.unwrap_or_else(|| DEFAULT_DEV_HOST.to_string()),
            port: port.filter(|p| *p != 0).unwrap_or(DEFAULT_DEV_PORT),
        }
    }

    pub(crate) fn protocol(&self) -> &'static str {
        if self.https { "https" } else { "http" }
    }

    pub(crate) fn server_base(&self) -> String {
        format!("{}://{}:{}", self.protocol(), self.host, self.port)
    }

    /// 开发环境下资源的完整对外地址
    pub(crate) fn public_url(&self, public_path: &str) -> Result<String> {
        let base = Url::parse(&self.server_base())
            .with_context(|| format!("invalid dev server address: {}", self.server_base()))?;
        let joined = base
            .join(public_path)
            .with_context(|| format!("invalid public path: {}", public_path))?;
        Ok(joined.to_string())
    }

    pub(crate) fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Output {
    pub(crate) path: PathBuf,
    pub(crate) filename: String,
    pub(crate) chunk_filename: String,
    pub(crate) pathinfo: bool,
    pub(crate) public_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Resolve {
    pub(crate) modules: Vec<PathBuf>,
    pub(crate) extensions: Vec<String>,
}

/// webpack 只接受 `false`、`"warning"`、`"error"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hints {
    Off,
    Warning,
}

impl Serialize for Hints {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Hints::Off => serializer.serialize_bool(false),
            Hints::Warning => serializer.serialize_str("warning"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Performance {
    pub(crate) hints: Hints,
}

/// 交给打包器的完整配置
#[derive(Debug, Clone, Serialize)]
pub(crate) struct BundleConfig {
    pub(crate) mode: Mode,
    pub(crate) context: PathBuf,
    pub(crate) devtool: String,
    pub(crate) entry: BTreeMap<String, Vec<PathBuf>>,
    pub(crate) output: Output,
    pub(crate) resolve: Resolve,
    pub(crate) performance: Performance,
    /// 交给 DefinePlugin，不进入 JSON
    #[serde(skip)]
    pub(crate) define: BTreeMap<String, String>,
    #[serde(skip)]
    pub(crate) css_filename: String,
}

impl BundleConfig {
    /// 开发配置：非 inline 入口前置开发辅助脚本，publicPath 指向开发服务器
    pub(crate) fn development(
        paths: &Paths,
        env: &ClientEnvironment,
        server: &DevServer,
        niceties: &Path,
        extensions: &[String],
    ) -> Result<Self> {
        let entry = paths
            .app_entries
            .iter()
            .map(|e| {
                let mut files = Vec::with_capacity(2);
                if !e.is_inline() {
                    files.push(niceties.to_path_buf());
                }
                files.push(e.target.clone());
                (e.name.clone(), files)
            })
            .collect();
        Ok(Self {
            mode: Mode::Development,
            context: paths.app_src.clone(),
            devtool: "cheap-module-source-map".to_string(),
            entry,
            output: Output {
                path: paths.app_build.clone(),
                filename: "[name].js".to_string(),
                chunk_filename: "chunk.[name].js".to_string(),
                pathinfo: true,
                public_path: server.public_url(&paths.public_path)?,
            },
            resolve: resolve_for(paths, extensions),
            performance: Performance { hints: Hints::Off },
            define: env.stringified(),
            css_filename: CSS_FILENAME.to_string(),
        })
    }

    pub(crate) fn production(paths: &Paths, env: &ClientEnvironment, extensions: &[String]) -> Self {
        let entry = paths
            .app_entries
            .iter()
            .map(|e| (e.name.clone(), vec![e.target.clone()]))
            .collect();
        Self {
            mode: Mode::Production,
            context: paths.app_src.clone(),
            devtool: "source-map".to_string(),
            entry,
            output: Output {
                path: paths.app_build.clone(),
                filename: "[name].js".to_string(),
                chunk_filename: "chunk.[name].js".to_string(),
                pathinfo: false,
                public_path: paths.served_path(),
            },
            resolve: resolve_for(paths, extensions),
            performance: Performance { hints: Hints::Warning },
            define: env.stringified(),
            css_filename: CSS_FILENAME.to_string(),
        }
    }

    pub(crate) fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize bundler config")
    }

    /// `inspect` 的输出：webpack 选项加上插件所用的 define 表
    pub(crate) fn inspect_json(&self) -> Result<String> {
        let view = serde_json::json!({
            "options": self,
            "define": self.define,
            "cssFilename": self.css_filename,
        });
        serde_json::to_string_pretty(&view).context("failed to serialize bundler config")
    }

    pub(crate) fn render_loader(&self, options_path: &Path) -> Result<String> {
        let mut ctx = TContext::new();
        ctx.insert("options_path", &options_path.display().to_string());
        ctx.insert("define", &self.define);
        ctx.insert("css_filename", &self.css_filename);
        Tera::one_off(LOADER_TEMPLATE, &ctx, false).context("failed to render bundler config loader")
    }

    /// 在 `dir` 下写出 `<stem>.json` 与 `<stem>.js`，返回交给打包器的 JS 路径
    pub(crate) fn write_to(&self, dir: &Path, stem: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir).with_context(|| format!("failed to create directory: {}", dir.display()))?;
        let options_path = dir.join(format!("{}.json", stem));
        fs::write(&options_path, self.to_json()?)
            .with_context(|| format!("failed to write bundler config: {}", options_path.display()))?;
        let loader_path = dir.join(format!("{}.js", stem));
        fs::write(&loader_path, self.render_loader(&options_path)?)
            .with_context(|| format!("failed to write bundler config: {}", loader_path.display()))?;
        Ok(loader_path)
    }
}

// node_modules 优先，其次 NODE_PATH，最后各入口目录
fn resolve_for(paths: &Paths, extensions: &[String]) -> Resolve {
    let mut modules = vec![PathBuf::from("node_modules")];
    modules.extend(paths.node_paths.iter().cloned());
    modules.extend(paths.entry_dirs());
    Resolve { modules, extensions: extensions.to_vec() }
}
