//! 文件列表领域模型

use serde::Serialize;

/// 条目类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    File,
    Directory,
    Symlink,
}

impl FileType {
    /// 由权限串首字符判定：`d` 目录，`l` 符号链接，其余为文件
    pub fn from_mode_char(c: Option<char>) -> Self {
        match c {
            Some('d') => FileType::Directory,
            Some('l') => FileType::Symlink,
            _ => FileType::File,
        }
    }
}

/// 目录条目
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    /// 目录总是 None
    pub size: Option<u64>,
    pub permissions: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symlink_target: Option<String>,
}
