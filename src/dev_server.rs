//! 开发模式：
//! - 监视源码目录变更并调用打包器增量重建
//! - 内置极简 HTTP 静态资源服务（允许跨域），提供版本轮询接口
//! - 仅样式变更时通知浏览器原地刷新样式表，否则整页刷新

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use console::style;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tera::{Context as TContext, Tera};
use tracing::{debug, info, warn};

use crate::{
    bundle_config::{BundleConfig, DevServer, Mode},
    bundler::{print_errors, Bundler, Verdict, FAILED_TO_COMPILE},
    env::ClientEnvironment,
    niceties::{self, VERSION_PATH},
    paths::{PathInputs, Paths},
};

const INDEX_TEMPLATE: &str = include_str!("assets/index.html");
pub(crate) const DEV_CONFIG_STEM: &str = "bundler.config.dev";

/// 开发模式所需的全部输入（重建时重复使用）
#[derive(Debug, Clone)]
pub(crate) struct DevContext {
    pub(crate) app_dir: PathBuf,
    pub(crate) inputs: PathInputs,
    pub(crate) server: DevServer,
    pub(crate) bundler: Bundler,
    pub(crate) extensions: Vec<String>,
}

/// 最近一次重建的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    Full,
    Css,
}

impl ChangeKind {
    fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Full => "full",
            ChangeKind::Css => "css",
        }
    }
}

/// 服务线程与重建线程共享的状态
#[derive(Debug)]
struct LiveState {
    version: AtomicU64,
    css_only: AtomicBool,
    entries: Mutex<Vec<String>>,
}

impl LiveState {
    fn new(entries: Vec<String>) -> Self {
        Self { version: AtomicU64::new(0), css_only: AtomicBool::new(false), entries: Mutex::new(entries) }
    }

    fn version_body(&self) -> String {
        let kind = if self.css_only.load(Ordering::SeqCst) { ChangeKind::Css } else { ChangeKind::Full };
        format!("{}:{}", self.version.load(Ordering::SeqCst), kind.as_str())
    }

    fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_entries(&self, names: Vec<String>) {
        *self.entries.lock().unwrap_or_else(|e| e.into_inner()) = names;
    }
}

/// 监视回调写入、重建线程读取的标记
#[derive(Debug, Default)]
struct WatchFlags {
    dirty: AtomicBool,
    saw_non_css: AtomicBool,
}

impl WatchFlags {
    fn record(&self, changed: &[PathBuf]) {
        if !is_style_only(changed) {
            self.saw_non_css.store(true, Ordering::SeqCst);
        }
        self.dirty.store(true, Ordering::SeqCst);
    }
}

/// 有待处理的变更时重建一次并推进版本号；两次轮询之间的所有变更合并为一次
fn rebuild_if_dirty(ctx: &DevContext, flags: &WatchFlags, state: &LiveState) -> Result<Option<ChangeKind>> {
    if !flags.dirty.swap(false, Ordering::SeqCst) {
        return Ok(None);
    }
    let full = flags.saw_non_css.swap(false, Ordering::SeqCst);
    let paths = compile(ctx)?;
    state.set_entries(entry_names(&paths));
    state.css_only.store(!full, Ordering::SeqCst);
    let v = state.version.fetch_add(1, Ordering::SeqCst) + 1;
    info!(version = v, css_only = !full, "rebuilt");
    Ok(Some(if full { ChangeKind::Full } else { ChangeKind::Css }))
}

/// 变更路径全部是 .css 时视为仅样式变更
pub(crate) fn is_style_only(changed: &[PathBuf]) -> bool {
    !changed.is_empty()
        && changed
            .iter()
            .all(|p| p.extension().and_then(|e| e.to_str()) == Some("css"))
}

/// 解析路径、写出开发脚本与配置、调用一次打包器；编译失败只打印不退出
pub(crate) fn compile(ctx: &DevContext) -> Result<Paths> {
    let paths = Paths::resolve(&ctx.app_dir, ctx.inputs.clone())?;
    let env = ClientEnvironment::capture(None);
    let niceties_path = niceties::write_client(&paths.cache_dir(), &ctx.server.server_base())?;
    let config = BundleConfig::development(&paths, &env, &ctx.server, &niceties_path, &ctx.extensions)?;
    let config_path = config.write_to(&paths.cache_dir(), DEV_CONFIG_STEM)?;

    let stats = ctx.bundler.run(&config_path, Mode::Development, env.node_env())?;
    let stamp = chrono::Local::now().format("%H:%M:%S");
    match stats.verdict(false) {
        Verdict::Failed { summary, messages } => print_errors(summary, &messages),
        Verdict::Success { warnings } if !warnings.is_empty() => {
            println!("{} {}", style(stamp).dim(), style("Compiled with warnings.").yellow());
            for w in &warnings {
                println!("{}", w);
            }
        }
        Verdict::Success { .. } => {
            println!("{} {}", style(stamp).dim(), style("Compiled successfully.").green());
        }
    }
    Ok(paths)
}

/// 启动开发模式：首次编译、监视、后台重建、服务
pub(crate) fn start(ctx: DevContext, open: bool) -> Result<()> {
    println!("Starting the development build...");
    let paths = compile(&ctx)?;
    let public_url = ctx.server.public_url(&paths.public_path)?;
    let prefix = serve_prefix(&paths.public_path);

    let state = Arc::new(LiveState::new(entry_names(&paths)));
    let flags = Arc::new(WatchFlags::default());

    // 监视源码目录；watcher 需存活到服务结束
    let _watcher = {
        let flags = flags.clone();
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) if matches!(event.kind, EventKind::Access(_)) => {}
                Ok(event) => flags.record(&event.paths),
                Err(e) => warn!(error = %e, "watch error"),
            })?;
        if paths.app_src.exists() {
            watcher.watch(&paths.app_src, RecursiveMode::Recursive)?;
        } else {
            println!(
                "{}",
                style(format!("Source directory {} does not exist; not watching.", paths.app_src.display())).yellow()
            );
        }
        watcher
    };

    // 后台重建线程
    {
        let state = state.clone();
        let ctx = ctx.clone();
        thread::spawn(move || loop {
            thread::sleep(Duration::from_millis(400));
            if let Err(e) = rebuild_if_dirty(&ctx, &flags, &state) {
                print_errors(FAILED_TO_COMPILE, &[format!("{:#}", e)]);
            }
        });
    }

    fs::create_dir_all(&paths.app_build)
        .with_context(|| format!("failed to create directory: {}", paths.app_build.display()))?;
    let index_url = format!("{}/", ctx.server.server_base());
    println!("Serving {} at {}", style(paths.display_build()).green(), style(&public_url).green());
    println!("Entry index: {}", style(&index_url).cyan());
    if open {
        let _ = webbrowser::open(&index_url);
    }

    let site = SiteInfo {
        build_dir: paths.app_build.clone(),
        build_display: paths.display_build(),
        app_src: paths.app_src.display().to_string(),
        public_url,
        prefix,
        server_base: ctx.server.server_base(),
    };
    serve(&ctx.server.bind_addr(), &site, state)
}

fn entry_names(paths: &Paths) -> Vec<String> {
    paths.app_entries.iter().map(|e| e.name.clone()).collect()
}

/// 对外路径对应的 URL 前缀，例如 `/assets/`；完整 URL 取其 path 部分
pub(crate) fn serve_prefix(public_path: &str) -> String {
    let path = match url::Url::parse(public_path) {
        Ok(u) => u.path().to_string(),
        Err(_) => public_path.to_string(),
    };
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

/// 请求路由结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Route {
    Version,
    Index,
    /// 输出目录内的相对路径
    File(PathBuf),
    NotFound,
}

pub(crate) fn route(url: &str, prefix: &str) -> Route {
    let path_only = url.split('?').next().unwrap_or("/");
    if path_only == VERSION_PATH {
        return Route::Version;
    }
    if path_only == "/" && prefix != "/" {
        return Route::Index;
    }
    let rest = match path_only.strip_prefix(prefix) {
        Some(r) => r,
        None if path_only == prefix.trim_end_matches('/') => "",
        None => return Route::NotFound,
    };
    let mut rel = PathBuf::new();
    for s in rest.split('/') {
        let t = s.trim();
        if t.is_empty() || t == "." || t == ".." {
            continue;
        }
        rel.push(t);
    }
    if rel.as_os_str().is_empty() {
        Route::Index
    } else {
        Route::File(rel)
    }
}

struct SiteInfo {
    build_dir: PathBuf,
    build_display: String,
    app_src: String,
    public_url: String,
    prefix: String,
    server_base: String,
}

fn render_index(site: &SiteInfo, state: &LiveState) -> Result<String> {
    let mut ctx = TContext::new();
    ctx.insert("server_base", &site.server_base);
    ctx.insert("build_dir", &site.build_display);
    ctx.insert("app_src", &site.app_src);
    ctx.insert("public_url", &site.public_url);
    ctx.insert("version", &state.version.load(Ordering::SeqCst));
    ctx.insert("entries", &state.entries());
    Tera::one_off(INDEX_TEMPLATE, &ctx, true).context("failed to render index page")
}

fn header(name: &str, value: &str) -> Option<tiny_http::Header> {
    tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn serve(addr: &str, site: &SiteInfo, state: Arc<LiveState>) -> Result<()> {
    let server = tiny_http::Server::http(addr).map_err(|e| anyhow::anyhow!("failed to bind {}: {}", addr, e))?;
    for rq in server.incoming_requests() {
        let route = route(rq.url(), &site.prefix);
        debug!(url = rq.url(), ?route, "request");
        let (status, content_type, body) = match route {
            Route::Version => (200, "text/plain; charset=utf-8".to_string(), state.version_body().into_bytes()),
            Route::Index => match render_index(site, &state) {
                Ok(html) => (200, "text/html; charset=utf-8".to_string(), html.into_bytes()),
                Err(e) => (500, "text/plain; charset=utf-8".to_string(), format!("{:#}", e).into_bytes()),
            },
            Route::File(rel) => {
                let fpath = site.build_dir.join(&rel);
                match fs::read(&fpath) {
                    Ok(bytes) if fpath.is_file() => (200, content_type_for_path(&fpath).to_string(), bytes),
                    _ => (404, "text/plain; charset=utf-8".to_string(), b"Not Found".to_vec()),
                }
            }
            Route::NotFound => (404, "text/plain; charset=utf-8".to_string(), b"Not Found".to_vec()),
        };
        let mut resp = tiny_http::Response::from_data(body).with_status_code(status);
        for h in [
            header("Content-Type", &content_type),
            header("Access-Control-Allow-Origin", "*"),
            header("Cache-Control", "no-store"),
        ]
        .into_iter()
        .flatten()
        {
            resp.add_header(h);
        }
        if let Err(e) = rq.respond(resp) {
            debug!(error = %e, "failed to respond");
        }
    }
    Ok(())
}

fn content_type_for_path(p: &Path) -> &'static str {
    match p.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase().as_str() {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "map" | "json" => "application/json; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        _ => "application/octet-stream",
    }
}
