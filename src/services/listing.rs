//! 目录列表解析
//!
//! 解析 `ls -la` 的长格式输出。无法识别的行直接丢弃，不报错

use tracing::debug;

use crate::domain::exec::ExecOptions;
use crate::domain::file::{FileEntry, FileType};
use crate::error::ExecError;
use crate::infra::shell::single_quote;

use super::executor::CommandExecutor;

/// 长格式至少包含的字段数
const MIN_FIELDS: usize = 9;

const SYMLINK_SEPARATOR: &str = " -> ";

/// 解析单行，行过短或为隐藏项时返回 None
pub fn parse_line(line: &str, base_path: &str) -> Option<FileEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }

    let permissions = fields[0];
    let file_type = FileType::from_mode_char(permissions.chars().next());
    let full_name = fields[8..].join(" ");

    let (name, symlink_target) = match file_type {
        FileType::Symlink => match full_name.split_once(SYMLINK_SEPARATOR) {
            Some((name, target)) => (name.to_string(), Some(target.to_string())),
            None => (full_name, None),
        },
        _ => (full_name, None),
    };

    if name.starts_with('.') {
        return None;
    }

    let size = match file_type {
        FileType::Directory => None,
        _ => Some(fields[4].parse::<u64>().unwrap_or(0)),
    };

    Some(FileEntry {
        path: join_path(base_path, &name),
        name,
        file_type,
        size,
        permissions: permissions.to_string(),
        symlink_target,
    })
}

/// 解析完整输出
pub fn parse_listing(raw: &str, base_path: &str) -> Vec<FileEntry> {
    raw.lines()
        .filter_map(|line| parse_line(line, base_path))
        .collect()
}

/// basePath 与名称之间恰好一个 `/`
fn join_path(base_path: &str, name: &str) -> String {
    format!("{}/{}", base_path.trim_end_matches('/'), name)
}

/// 在目标上列出目录
pub async fn list_directory(
    executor: &CommandExecutor,
    target: &str,
    path: &str,
    options: ExecOptions,
) -> Result<Vec<FileEntry>, ExecError> {
    let command = format!("ls -la -- {}", single_quote(path));
    let output = executor.run_with(target, &command, options).await?;
    let entries = parse_listing(&output.stdout, path);
    debug!(target_host = %target, path = %path, entries = entries.len(), "Listed directory");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::executor::testing::executor;

    #[test]
    fn test_directory_entry() {
        let entry = parse_line("drwxr-xr-x 2 user user 4096 Jan 1 00:00 subdir", "/home/user").unwrap();
        assert_eq!(entry.name, "subdir");
        assert_eq!(entry.file_type, FileType::Directory);
        assert_eq!(entry.size, None);
        assert_eq!(entry.permissions, "drwxr-xr-x");
        assert_eq!(entry.path, "/home/user/subdir");
    }

    #[test]
    fn test_symlink_entry() {
        let entry = parse_line(
            "lrwxrwxrwx 1 root root 12 Mar 3 12:00 mylink -> /target/path",
            "/opt/",
        )
        .unwrap();
        assert_eq!(entry.file_type, FileType::Symlink);
        assert_eq!(entry.name, "mylink");
        assert_eq!(entry.symlink_target.as_deref(), Some("/target/path"));
        assert_eq!(entry.path, "/opt/mylink");
        assert_eq!(entry.size, Some(12));
    }

    #[test]
    fn test_name_with_spaces_and_bad_size() {
        let entry = parse_line("-rw-r--r-- 1 a b ?? Feb 2 2024 my  save file.dat", "/").unwrap();
        assert_eq!(entry.name, "my save file.dat");
        assert_eq!(entry.file_type, FileType::File);
        assert_eq!(entry.size, Some(0));
        assert_eq!(entry.path, "/my save file.dat");
    }

    #[test]
    fn test_listing_drops_hidden_and_short_lines() {
        let raw = "total 12\n\
                   drwxr-xr-x 3 root root 4096 Jan 1 00:00 .\n\
                   drwxr-xr-x 9 root root 4096 Jan 1 00:00 ..\n\
                   -rw------- 1 root root 220 Jan 1 00:00 .hidden\n\
                   -rw-r--r-- 1 root root 1024 Jan 1 00:00 server.cfg\n\
                   garbage line\n";
        let entries = parse_listing(raw, "/srv");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "server.cfg");
        assert_eq!(entries[0].size, Some(1024));
    }

    #[test]
    fn test_serialized_shape() {
        let entry = parse_line("drwxr-xr-x 2 u u 4096 Jan 1 00:00 logs", "/var").unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "directory");
        assert!(json["size"].is_null());
        assert!(json.get("symlink_target").is_none());
    }

    #[tokio::test]
    async fn test_list_directory_locally() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("saves")).unwrap();
        std::fs::write(dir.path().join("game.ini"), "x=1\n").unwrap();
        std::fs::write(dir.path().join(".secret"), "").unwrap();

        let base = dir.path().to_string_lossy().to_string();
        let entries = list_directory(&executor(&[]), "localhost", &base, ExecOptions::default())
            .await
            .unwrap();

        let mut names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["game.ini", "saves"]);
        let ini = entries.iter().find(|e| e.name == "game.ini").unwrap();
        assert_eq!(ini.size, Some(4));
        assert_eq!(ini.path, format!("{}/game.ini", base));
    }
}
