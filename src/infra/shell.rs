//! Shell 转义
//!
//! 所有需要拼接 shell 字符串的地方都经过这里

/// 转义后可安全嵌入单引号字面量（`'` -> `'\''`）
pub fn escape_single_quoted(s: &str) -> String {
    s.replace('\'', "'\\''")
}

/// 包裹为单引号字面量
pub fn single_quote(s: &str) -> String {
    format!("'{}'", escape_single_quoted(s))
}

/// 转义双引号（仅处理 `"`，其余字符保持原样）
pub fn escape_double_quoted(s: &str) -> String {
    s.replace('"', "\\\"")
}

/// 包裹为双引号字面量
pub fn double_quote(s: &str) -> String {
    format!("\"{}\"", escape_double_quoted(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_quote() {
        assert_eq!(single_quote("plain"), "'plain'");
        assert_eq!(single_quote("it's"), "'it'\\''s'");
        assert_eq!(single_quote(""), "''");
    }

    #[test]
    fn test_double_quote() {
        assert_eq!(double_quote("foo bar"), "\"foo bar\"");
        assert_eq!(double_quote("say \"hi\""), "\"say \\\"hi\\\"\"");
    }

    #[tokio::test]
    async fn test_single_quote_survives_shell() {
        let nasty = "a'b \"c\" $HOME `id`";
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(format!("printf %s {}", single_quote(nasty)))
            .output()
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), nasty);
    }
}
