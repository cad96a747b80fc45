use crate::db::RecordStore;
use crate::error::DedupResult;
use crate::models::DuplicateVerdict;
use std::sync::Arc;

use super::hasher::ContentHasher;

/// 文件级精确查重：哈希 + 大小完全一致，不做任何模糊匹配
pub struct FileDuplicateDetector {
    store: Arc<dyn RecordStore>,
}

impl FileDuplicateDetector {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// 多条历史记录命中时返回最早创建的那条 (原件)
    pub async fn check_file_duplicate(
        &self,
        content_hash: &str,
        size_bytes: u64,
        tenant_id: &str,
        exclude_file_id: Option<&str>,
    ) -> DedupResult<DuplicateVerdict> {
        let content_hash = content_hash.to_ascii_lowercase();
        let matches = self
            .store
            .find_files_by_hash_and_size(tenant_id, &content_hash, size_bytes, exclude_file_id)
            .await?;

        // 存储层的排序只作参考，这里自己选出最早的
        let original = matches
            .into_iter()
            .filter(|f| f.tenant_id == tenant_id)
            .filter(|f| f.content_hash == content_hash && f.size_bytes == size_bytes)
            .filter(|f| exclude_file_id != Some(f.file_id.as_str()))
            .min_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.file_id.cmp(&b.file_id))
            });

        match original {
            Some(file) => {
                tracing::info!(
                    "tenant {}: file content {} ({} bytes) duplicates {}",
                    tenant_id,
                    short_hash(&content_hash),
                    size_bytes,
                    file.file_id
                );
                Ok(DuplicateVerdict::file_match(file.file_id))
            }
            None => {
                tracing::debug!("tenant {}: no file with matching content", tenant_id);
                Ok(DuplicateVerdict::unique())
            }
        }
    }

    /// 先计算哈希再查重
    pub async fn check_file_bytes(
        &self,
        bytes: &[u8],
        tenant_id: &str,
        exclude_file_id: Option<&str>,
    ) -> DedupResult<DuplicateVerdict> {
        let content_hash = ContentHasher::hash(bytes);
        self.check_file_duplicate(&content_hash, bytes.len() as u64, tenant_id, exclude_file_id)
            .await
    }
}

fn short_hash(hash: &str) -> String {
    hash.chars().take(16).collect()
}
