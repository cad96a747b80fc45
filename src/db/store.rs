use crate::error::DedupResult;
use crate::models::{
    DuplicateCandidateLink, ExtractionRecord, FileContentRecord, InvoiceFingerprint, StatusUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 记录存储 - 引擎唯一的共享可变资源
///
/// 所有查询都必须限定在租户内；引擎本身不持有跨请求状态
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 按 (hash, size) 在租户内查文件，排除 `exclude_file_id`
    async fn find_files_by_hash_and_size(
        &self,
        tenant_id: &str,
        content_hash: &str,
        size_bytes: u64,
        exclude_file_id: Option<&str>,
    ) -> DedupResult<Vec<FileContentRecord>>;

    /// 租户内候选指纹：排除自身以及已标记为 duplicate 的记录，最新优先，最多 `limit` 条
    ///
    /// 给出 `created_before` 时只返回排在主体之前的记录：
    /// `(created_at, extraction_id) < (created_before, exclude_extraction_id)`
    async fn find_fingerprint_candidates(
        &self,
        tenant_id: &str,
        exclude_extraction_id: &str,
        created_before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> DedupResult<Vec<InvoiceFingerprint>>;

    /// 同一 (extraction, candidate) 对最多一条链接，重复写入为更新
    async fn save_duplicate_link(&self, link: &DuplicateCandidateLink) -> DedupResult<()>;

    /// 更新抽取记录状态；处于 reviewing 的记录保持不变
    async fn update_extraction_duplicate_status(&self, update: &StatusUpdate) -> DedupResult<()>;

    /// 状态与链接作为一个原子单元写入，不允许只写一半
    ///
    /// 状态被改写时，该抽取指向其他候选的旧链接一并删除；
    /// 结论为 unique 时删除全部链接。reviewing 记录的状态和已有链接保持不变
    async fn persist_duplicate_verdict(
        &self,
        link: Option<&DuplicateCandidateLink>,
        update: &StatusUpdate,
    ) -> DedupResult<()>;

    /// 仍为 unique 的抽取记录，最新创建优先，用于租户重扫
    ///
    /// 新记录先被检查，互为重复时较早的记录保持为原件
    async fn list_extractions_for_rescan(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> DedupResult<Vec<ExtractionRecord>>;
}
