//! 通用辅助函数：
//! - 环境变量读取与解析
//! - CI 标记判断
//! - 体积的人类可读格式

use std::env;

/// 可选读取 String 环境变量。
pub(crate) fn env_opt_string(key: &str) -> Option<String> {
    env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// 可选读取 u16 环境变量（解析失败视为未设置）。
pub(crate) fn env_opt_u16(key: &str) -> Option<u16> {
    env_opt_string(key).and_then(|s| s.parse::<u16>().ok())
}

/// CI 标记：变量存在且不是空串、`0`、`false` 即视为处于 CI。
pub(crate) fn ci_flag(value: Option<&str>) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => false,
        Some(v) => !(v.is_empty() || v == "0" || v == "false"),
    }
}

/// 读取进程环境中的 CI 标记。
pub(crate) fn env_ci() -> bool {
    ci_flag(env::var("CI").ok().as_deref())
}

/// 字节数转为 `B` / `KB` / `MB` 文本。
pub(crate) fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < KB * KB {
        format!("{:.2} KB", b / KB)
    } else {
        format!("{:.2} MB", b / (KB * KB))
    }
}
