//! 客户端环境变量：收集 NODE_ENV 与 ASSETS_* 并转为打包器 define 所需的字符串字面量

use std::{collections::BTreeMap, sync::OnceLock};

use regex::Regex;

pub(crate) const DEFAULT_NODE_ENV: &str = "development";

fn assets_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^ASSETS_").expect("static regex"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClientEnvironment {
    raw: BTreeMap<String, String>,
}

impl ClientEnvironment {
    /// 从任意变量序列构建；`node_env` 为显式覆盖（例如生产构建固定为 production）
    pub(crate) fn from_vars<I>(vars: I, node_env: Option<&str>) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut raw = BTreeMap::new();
        let mut inherited_node_env = None;
        for (key, value) in vars {
            if key == "NODE_ENV" {
                inherited_node_env = Some(value);
            } else if assets_prefix().is_match(&key) {
                raw.insert(key, value);
            }
        }
        let node_env = node_env
            .map(str::to_string)
            .or(inherited_node_env.filter(|v| !v.is_empty()))
            .unwrap_or_else(|| DEFAULT_NODE_ENV.to_string());
        raw.insert("NODE_ENV".to_string(), node_env);
        Self { raw }
    }

    /// 读取当前进程环境（非 UTF-8 的变量被忽略）
    pub(crate) fn capture(node_env: Option<&str>) -> Self {
        Self::from_vars(std::env::vars_os().filter_map(|(k, v)| {
            Some((k.into_string().ok()?, v.into_string().ok()?))
        }), node_env)
    }

    pub(crate) fn raw(&self) -> &BTreeMap<String, String> {
        &self.raw
    }

    pub(crate) fn node_env(&self) -> &str {
        self.raw.get("NODE_ENV").map(String::as_str).unwrap_or(DEFAULT_NODE_ENV)
    }

    /// `process.env.<NAME>` -> JSON 字符串字面量
    pub(crate) fn stringified(&self) -> BTreeMap<String, String> {
        self.raw
            .iter()
            .map(|(k, v)| (format!("process.env.{}", k), serde_json::Value::from(v.as_str()).to_string()))
            .collect()
    }
}
