use crate::config::DedupConfig;
use crate::db::RecordStore;
use crate::error::DedupResult;
use crate::models::{DuplicateType, DuplicateVerdict, ExtractedFields, RescanStats};
use std::sync::Arc;

use super::file_detector::FileDuplicateDetector;
use super::invoice_detector::{verdict_records, InvoiceDuplicateDetector};

/// 查重入口 - 只做委派和事务边界，不含业务逻辑
pub struct DeduplicationFacade {
    store: Arc<dyn RecordStore>,
    files: FileDuplicateDetector,
    invoices: InvoiceDuplicateDetector,
    rescan_limit: usize,
}

impl DeduplicationFacade {
    /// 配置在这里校验，错误配置在启动时就暴露
    pub fn new(store: Arc<dyn RecordStore>, config: &DedupConfig) -> DedupResult<Self> {
        Ok(Self {
            files: FileDuplicateDetector::new(store.clone()),
            invoices: InvoiceDuplicateDetector::new(store.clone(), config)?,
            rescan_limit: config.rescan_limit,
            store,
        })
    }

    pub async fn check_file_duplicate(
        &self,
        content_hash: &str,
        size_bytes: u64,
        tenant_id: &str,
        exclude_file_id: Option<&str>,
    ) -> DedupResult<DuplicateVerdict> {
        self.files
            .check_file_duplicate(content_hash, size_bytes, tenant_id, exclude_file_id)
            .await
    }

    pub async fn check_file_bytes(
        &self,
        bytes: &[u8],
        tenant_id: &str,
        exclude_file_id: Option<&str>,
    ) -> DedupResult<DuplicateVerdict> {
        self.files
            .check_file_bytes(bytes, tenant_id, exclude_file_id)
            .await
    }

    pub async fn check_invoice_duplicate(
        &self,
        extraction_id: &str,
        fields: &ExtractedFields,
        tenant_id: &str,
    ) -> DedupResult<DuplicateVerdict> {
        self.invoices
            .check_invoice_duplicate(extraction_id, fields, tenant_id)
            .await
    }

    pub async fn check_invoice_duplicate_with_limit(
        &self,
        extraction_id: &str,
        fields: &ExtractedFields,
        tenant_id: &str,
        candidate_limit: usize,
    ) -> DedupResult<DuplicateVerdict> {
        self.invoices
            .check_invoice_duplicate_with_limit(extraction_id, fields, tenant_id, candidate_limit)
            .await
    }

    /// 状态和候选链接在同一个原子单元里写入
    pub async fn update_invoice_duplicate_status(
        &self,
        extraction_id: &str,
        tenant_id: &str,
        verdict: &DuplicateVerdict,
    ) -> DedupResult<()> {
        let (link, update) = verdict_records(extraction_id, tenant_id, verdict);
        self.store
            .persist_duplicate_verdict(link.as_ref(), &update)
            .await
    }

    /// 重扫租户内仍为 unique 的抽取，补上并发窗口中漏掉的重复
    ///
    /// `limit` 为空时使用配置的 `rescan_limit`
    pub async fn rescan_tenant(
        &self,
        tenant_id: &str,
        limit: Option<usize>,
    ) -> DedupResult<RescanStats> {
        let limit = limit.unwrap_or(self.rescan_limit);
        let records = self.store.list_extractions_for_rescan(tenant_id, limit).await?;
        let total = records.len();
        let mut stats = RescanStats {
            tenant_id: tenant_id.to_string(),
            ..RescanStats::default()
        };

        tracing::info!("[Rescan] tenant {}: {} 条抽取待重扫", tenant_id, total);

        for (idx, record) in records.iter().enumerate() {
            let verdict = self.invoices.recheck_extraction(record).await?;
            stats.scanned += 1;

            match verdict.duplicate_type {
                DuplicateType::Unique => {}
                DuplicateType::Possible => {
                    stats.linked += 1;
                    stats.possible_duplicates += 1;
                }
                DuplicateType::Likely | DuplicateType::Exact => {
                    stats.linked += 1;
                    stats.duplicates += 1;
                }
            }

            let current = idx + 1;
            if current % 100 == 0 || current == total {
                tracing::info!(
                    "[Rescan] tenant {}: 进度 {}/{}, 新增链接: {}",
                    tenant_id, current, total, stats.linked
                );
            }
        }

        Ok(stats)
    }
}
