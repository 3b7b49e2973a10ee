//! 路径解析与入口发现模块：
//! - 项目根（解析符号链接）、源码根、输出目录、对外路径
//! - NODE_PATH 中的相对目录作为额外模块解析根
//! - 扫描 `<app-source>/<appName>/**/target.js`，生成 `<appName>__<entryName>` 入口

use std::{
    collections::{BTreeMap, BTreeSet},
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

pub(crate) const DEFAULT_APP_SOURCE: &str = "apps";
pub(crate) const DEFAULT_BUILD_PATH: &str = "public/assets";
pub(crate) const DEFAULT_PUBLIC_PATH: &str = "/assets/";
pub(crate) const TARGET_FILE: &str = "target.js";

/// 入口发现错误
#[derive(Debug, Error)]
pub(crate) enum DiscoveryError {
    #[error("duplicate entry `{name}`: {first} and {second}")]
    DuplicateEntry { name: String, first: PathBuf, second: PathBuf },
    #[error("failed to scan {path}: {source}")]
    Walk { path: PathBuf, source: walkdir::Error },
}

/// 一个打包入口
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    /// `<appName>__<entryName>`
    pub(crate) name: String,
    /// target.js 的完整路径
    pub(crate) target: PathBuf,
}

impl Entry {
    /// 名称中含 `__inline` 的入口不注入开发辅助脚本
    pub(crate) fn is_inline(&self) -> bool {
        self.name.contains("__inline")
    }
}

/// 解析后的项目路径集合（启动时计算一次）
#[derive(Debug, Clone)]
pub(crate) struct Paths {
    pub(crate) app_path: PathBuf,
    pub(crate) app_build: PathBuf,
    pub(crate) app_src: PathBuf,
    pub(crate) app_entries: Vec<Entry>,
    pub(crate) app_node_modules: PathBuf,
    pub(crate) node_paths: Vec<PathBuf>,
    pub(crate) public_path: String,
    /// PUBLIC_URL，设置时覆盖生产环境的对外路径
    pub(crate) public_url: Option<String>,
}

/// `Paths::resolve` 的输入（均为已合并 CLI/环境/配置后的有效值）
#[derive(Debug, Clone, Default)]
pub(crate) struct PathInputs {
    pub(crate) app_source: Option<PathBuf>,
    pub(crate) build_path: Option<PathBuf>,
    pub(crate) public_path: Option<String>,
    pub(crate) node_path: Option<String>,
    pub(crate) public_url: Option<String>,
}

impl Paths {
    pub(crate) fn resolve(app_dir: &Path, inputs: PathInputs) -> Result<Self> {
        let app_path = fs::canonicalize(app_dir)
            .with_context(|| format!("failed to resolve project directory: {}", app_dir.display()))?;
        let app_src = app_path.join(
            inputs.app_source.unwrap_or_else(|| PathBuf::from(DEFAULT_APP_SOURCE)),
        );
        let app_build = app_path.join(
            inputs.build_path.unwrap_or_else(|| PathBuf::from(DEFAULT_BUILD_PATH)),
        );
        let node_paths = node_paths(inputs.node_path.as_deref().unwrap_or(""), &app_path);
        let app_entries = discover_entries(&app_src)?;
        debug!(count = app_entries.len(), src = %app_src.display(), "discovered entries");
        Ok(Self {
            app_node_modules: app_path.join("node_modules"),
            public_path: inputs.public_path.unwrap_or_else(|| DEFAULT_PUBLIC_PATH.to_string()),
            public_url: inputs.public_url,
            app_path,
            app_build,
            app_src,
            app_entries,
            node_paths,
        })
    }

    /// 工具自身的缓存目录（生成的配置与开发脚本写在这里）
    pub(crate) fn cache_dir(&self) -> PathBuf {
        self.app_node_modules.join(".cache").join("icelab-assets")
    }

    /// 每个入口所在目录（去重），作为额外的模块解析根
    pub(crate) fn entry_dirs(&self) -> Vec<PathBuf> {
        let set: BTreeSet<PathBuf> = self
            .app_entries
            .iter()
            .filter_map(|e| e.target.parent().map(Path::to_path_buf))
            .collect();
        set.into_iter().collect()
    }

    /// 生产环境的对外路径：PUBLIC_URL 优先（补齐末尾 `/`），否则为 public_path
    pub(crate) fn served_path(&self) -> String {
        match self.public_url.as_deref() {
            Some(u) if u.ends_with('/') => u.to_string(),
            Some(u) => format!("{}/", u),
            None => self.public_path.clone(),
        }
    }

    /// 输出目录相对项目根的显示形式
    pub(crate) fn display_build(&self) -> String {
        match self.app_build.strip_prefix(&self.app_path) {
            Ok(rel) => rel.display().to_string(),
            Err(_) => self.app_build.display().to_string(),
        }
    }
}

/// 解析 NODE_PATH：只接受相对目录，并以项目根为基准
pub(crate) fn node_paths(raw: &str, app_path: &Path) -> Vec<PathBuf> {
    let sep = if cfg!(windows) { ';' } else { ':' };
    raw.split(sep)
        .filter(|s| !s.is_empty())
        .map(Path::new)
        .filter(|p| !p.is_absolute())
        .map(|p| app_path.join(p))
        .collect()
}

/// 扫描源码根下的每个应用目录，收集 target.js 入口（按名称排序）
pub(crate) fn discover_entries(app_src: &Path) -> Result<Vec<Entry>, DiscoveryError> {
    let mut found: BTreeMap<String, Entry> = BTreeMap::new();
    let apps = match fs::read_dir(app_src) {
        Ok(rd) => rd,
        Err(_) => return Ok(Vec::new()),
    };
    let mut app_dirs: Vec<PathBuf> = apps
        .flatten()
        .filter(|e| !is_hidden(&e.file_name()))
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    app_dirs.sort();

    for dir in app_dirs {
        let app = match dir.file_name().and_then(|s| s.to_str()) {
            Some(s) => s.to_string(),
            None => continue,
        };
        let walker = WalkDir::new(&dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));
        for item in walker {
            let item = item.map_err(|source| DiscoveryError::Walk { path: dir.clone(), source })?;
            if !item.file_type().is_file() || item.file_name() != TARGET_FILE {
                continue;
            }
            let target = item.into_path();
            let entry_name = target
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|s| s.to_str())
                .unwrap_or(&app)
                .to_string();
            let name = format!("{}__{}", app, entry_name);
            if let Some(prev) = found.get(&name) {
                return Err(DiscoveryError::DuplicateEntry {
                    name,
                    first: prev.target.clone(),
                    second: target,
                });
            }
            found.insert(name.clone(), Entry { name, target });
        }
    }
    Ok(found.into_values().collect())
}

// 以 `.` 开头的文件和目录不参与扫描
fn is_hidden(name: &OsStr) -> bool {
    name.to_str().map_or(false, |s| s.starts_with('.'))
}
