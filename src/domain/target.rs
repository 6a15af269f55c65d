//! 目标主机模型
//!
//! Target 是请求级的主机标识：两个保留别名表示本机，其余值必须先通过主机注册表校验

use std::fmt;

/// 表示本机的保留别名
pub const LOCAL_ALIASES: [&str; 2] = ["localhost", "127.0.0.1"];

/// 已解析的执行目标
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// 本机执行（直接调用本地 shell）
    Local,
    /// 远程主机（通过 ssh/scp 执行）
    Remote(String),
}

impl Target {
    /// 判断原始标识是否为本机别名
    pub fn is_local_alias(raw: &str) -> bool {
        LOCAL_ALIASES.contains(&raw)
    }

    /// 是否为本机
    pub fn is_local(&self) -> bool {
        matches!(self, Target::Local)
    }

    /// 主机名，本机返回 "localhost"
    pub fn host(&self) -> &str {
        match self {
            Target::Local => LOCAL_ALIASES[0],
            Target::Remote(host) => host,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.host())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_aliases() {
        assert!(Target::is_local_alias("localhost"));
        assert!(Target::is_local_alias("127.0.0.1"));
        assert!(!Target::is_local_alias("LOCALHOST"));
        assert!(!Target::is_local_alias("10.0.0.5"));
        assert!(!Target::is_local_alias(""));
    }

    #[test]
    fn test_host_and_display() {
        assert_eq!(Target::Local.host(), "localhost");
        let remote = Target::Remote("game-01".to_string());
        assert_eq!(remote.host(), "game-01");
        assert_eq!(remote.to_string(), "game-01");
        assert!(!remote.is_local());
    }
}
