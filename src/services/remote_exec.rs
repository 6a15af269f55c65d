//! 远程安装脚本命令构造
//!
//! 把「脚本 URL + 参数」组合为一条命令：优先 curl、回退 wget，
//! 抓取的脚本直接通过管道交给 `bash -s --`，不落盘。纯函数，不执行任何 I/O

use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::OnceLock;

use crate::infra::shell::{double_quote, single_quote};

const NO_FETCH_TOOL_MESSAGE: &str = "ERROR: neither curl nor wget is available on the target host";

fn named_with_value() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-+[a-zA-Z][a-zA-Z0-9_\-+/.]*=.*$").expect("valid regex"))
}

fn named_flag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-+[a-zA-Z][a-zA-Z0-9_\-+/.]*$").expect("valid regex"))
}

/// 单个参数的分类
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptArg {
    /// `--key=value`
    Named { key: String, value: String },
    /// `--flag`
    Flag(String),
    /// 其余
    Positional(String),
}

impl ScriptArg {
    /// 按顺序匹配：带值的命名参数 -> 裸标志 -> 位置参数
    pub fn classify(arg: &str) -> Self {
        if named_with_value().is_match(arg) {
            if let Some((key, value)) = arg.split_once('=') {
                return ScriptArg::Named {
                    key: key.to_string(),
                    value: value.to_string(),
                };
            }
        }
        if named_flag().is_match(arg) {
            return ScriptArg::Flag(arg.to_string());
        }
        ScriptArg::Positional(arg.to_string())
    }

    /// 原始形式（不带 shell 引号），如 `--name=foo bar`
    pub fn raw(&self) -> String {
        match self {
            ScriptArg::Named { key, value } => format!("{}={}", key, value),
            ScriptArg::Flag(flag) => flag.clone(),
            ScriptArg::Positional(value) => value.clone(),
        }
    }

    /// 序列化为 shell 片段
    pub fn render(&self) -> String {
        match self {
            ScriptArg::Named { key, value } => format!("{}={}", key, double_quote(value)),
            ScriptArg::Flag(flag) => flag.clone(),
            ScriptArg::Positional(value) if value.contains(' ') || value.contains('"') => {
                double_quote(value)
            }
            ScriptArg::Positional(value) => value.clone(),
        }
    }
}

/// 命名参数，按首次出现的顺序保存；裸标志的值为 None
///
/// 重复的键覆盖原值但保留原位置
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamedParameters(Vec<(String, Option<String>)>);

impl NamedParameters {
    pub fn insert(&mut self, key: String, value: Option<String>) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// 键存在时返回 Some(值)
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for NamedParameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// 构造结果
#[derive(Clone, Debug, serde::Serialize)]
pub struct RemoteExec {
    pub url: String,
    pub command: String,
    pub positional_parameters: Vec<String>,
    pub named_parameters: NamedParameters,
    /// 按原顺序保存的原始参数（不带 shell 引号）
    pub parameters: Vec<String>,
}

/// 构造远程执行命令
pub fn build_remote_exec(url: &str, args: &[String]) -> RemoteExec {
    build(url, args, false)
}

/// 同 `build_remote_exec`，额外启用 `set -euo pipefail`
pub fn build_remote_exec_strict(url: &str, args: &[String]) -> RemoteExec {
    build(url, args, true)
}

fn build(url: &str, args: &[String], strict: bool) -> RemoteExec {
    let mut positional_parameters = Vec::new();
    let mut named_parameters = NamedParameters::default();
    let mut parameters = Vec::with_capacity(args.len());
    let mut rendered = Vec::with_capacity(args.len());

    for arg in args {
        let classified = ScriptArg::classify(arg);
        parameters.push(classified.raw());
        rendered.push(classified.render());
        match classified {
            ScriptArg::Named { key, value } => {
                named_parameters.insert(key, Some(value));
            }
            ScriptArg::Flag(flag) => {
                named_parameters.insert(flag, None);
            }
            ScriptArg::Positional(value) => positional_parameters.push(value),
        }
    }

    let quoted_url = single_quote(url);
    let prelude = if strict {
        "set -euo pipefail;"
    } else {
        "set -o pipefail;"
    };

    let mut command = format!(
        "{prelude} if command -v curl >/dev/null 2>&1; then curl -fsSL {url}; \
         elif command -v wget >/dev/null 2>&1; then wget -qO- {url}; \
         else echo {message} >&2; exit 2; fi | bash -s --",
        prelude = prelude,
        url = quoted_url,
        message = single_quote(NO_FETCH_TOOL_MESSAGE),
    );
    for param in &rendered {
        command.push(' ');
        command.push_str(param);
    }

    RemoteExec {
        url: url.to_string(),
        command,
        positional_parameters,
        named_parameters,
        parameters,
    }
}
