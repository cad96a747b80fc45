use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 文件内容记录 (上传时由外部写入，本引擎只读)
///
/// `(tenant_id, content_hash, size_bytes)` 唯一确定一个内容等价类
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContentRecord {
    pub file_id: String,
    pub tenant_id: String,
    pub content_hash: String, // SHA-256 小写十六进制
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}
