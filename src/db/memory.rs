use crate::db::store::RecordStore;
use crate::error::{DedupError, DedupResult};
use crate::models::{
    DuplicateCandidateLink, DuplicateStatus, ExtractedFields, ExtractionRecord, FileContentRecord,
    InvoiceFingerprint, StatusUpdate,
};
use crate::service::fingerprint::FingerprintBuilder;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredExtraction {
    record: ExtractionRecord,
    candidate_id: Option<String>,
    confidence: Option<f64>,
}

#[derive(Debug, Default)]
struct InvoiceState {
    extractions: HashMap<String, StoredExtraction>,
    links: HashMap<(String, String), DuplicateCandidateLink>,
}

/// 进程内记录存储 - 嵌入式使用与测试
///
/// 发票侧状态放在同一把锁下，保证状态与链接一起写入
pub struct MemoryRecordStore {
    files: DashMap<String, Vec<FileContentRecord>>, // tenant_id -> files
    invoices: RwLock<InvoiceState>,
    available: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
            invoices: RwLock::new(InvoiceState::default()),
            available: AtomicBool::new(true),
        }
    }

    pub fn insert_file(&self, record: FileContentRecord) {
        self.files
            .entry(record.tenant_id.clone())
            .or_default()
            .push(record);
    }

    pub async fn insert_extraction(
        &self,
        extraction_id: &str,
        tenant_id: &str,
        fields: ExtractedFields,
        created_at: DateTime<Utc>,
    ) {
        let record = ExtractionRecord {
            extraction_id: extraction_id.to_string(),
            tenant_id: tenant_id.to_string(),
            fields,
            duplicate_status: DuplicateStatus::Unique,
            created_at,
        };
        self.invoices.write().await.extractions.insert(
            extraction_id.to_string(),
            StoredExtraction {
                record,
                candidate_id: None,
                confidence: None,
            },
        );
    }

    /// 模拟外部流程 (例如人工复核) 直接改状态
    pub async fn set_status(&self, extraction_id: &str, status: DuplicateStatus) {
        if let Some(stored) = self.invoices.write().await.extractions.get_mut(extraction_id) {
            stored.record.duplicate_status = status;
        }
    }

    pub async fn status_of(&self, extraction_id: &str) -> Option<DuplicateStatus> {
        self.invoices
            .read()
            .await
            .extractions
            .get(extraction_id)
            .map(|s| s.record.duplicate_status)
    }

    pub async fn candidate_of(&self, extraction_id: &str) -> Option<(String, f64)> {
        let state = self.invoices.read().await;
        let stored = state.extractions.get(extraction_id)?;
        stored.candidate_id.clone().zip(stored.confidence)
    }

    pub async fn links(&self) -> Vec<DuplicateCandidateLink> {
        let mut links: Vec<_> = self.invoices.read().await.links.values().cloned().collect();
        links.sort_by(|a, b| {
            a.extraction_id
                .cmp(&b.extraction_id)
                .then_with(|| a.candidate_extraction_id.cmp(&b.candidate_extraction_id))
        });
        links
    }

    /// 关闭后所有操作返回存储错误，用来模拟数据库故障
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> DedupResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DedupError::Storage("record store unavailable".to_string()))
        }
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 返回是否真正写入了状态 (reviewing 时为 false)
fn apply_status(state: &mut InvoiceState, update: &StatusUpdate) -> DedupResult<bool> {
    let stored = state
        .extractions
        .get_mut(&update.extraction_id)
        .filter(|s| s.record.tenant_id == update.tenant_id)
        .ok_or_else(|| {
            DedupError::NotFound(format!(
                "extraction {} in tenant {}",
                update.extraction_id, update.tenant_id
            ))
        })?;

    if stored.record.duplicate_status == DuplicateStatus::Reviewing {
        tracing::info!("extraction {} is under review, keeping status", update.extraction_id);
        return Ok(false);
    }

    stored.record.duplicate_status = update.status;
    stored.candidate_id = update.candidate_id.clone();
    stored.confidence = Some(update.confidence);
    Ok(true)
}

fn remove_stale_links(state: &mut InvoiceState, extraction_id: &str, keep_candidate_id: Option<&str>) {
    state.links.retain(|(from, to), _| {
        from != extraction_id || keep_candidate_id == Some(to.as_str())
    });
}

fn apply_link(state: &mut InvoiceState, link: &DuplicateCandidateLink) {
    let key = (link.extraction_id.clone(), link.candidate_extraction_id.clone());
    match state.links.get_mut(&key) {
        Some(existing) => {
            existing.similarity_score = link.similarity_score;
            existing.duplicate_type = link.duplicate_type;
        }
        None => {
            state.links.insert(key, link.clone());
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_files_by_hash_and_size(
        &self,
        tenant_id: &str,
        content_hash: &str,
        size_bytes: u64,
        exclude_file_id: Option<&str>,
    ) -> DedupResult<Vec<FileContentRecord>> {
        self.ensure_available()?;
        let Some(files) = self.files.get(tenant_id) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<FileContentRecord> = files
            .iter()
            .filter(|f| f.content_hash == content_hash && f.size_bytes == size_bytes)
            .filter(|f| exclude_file_id != Some(f.file_id.as_str()))
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.file_id.cmp(&b.file_id))
        });
        Ok(matches)
    }

    async fn find_fingerprint_candidates(
        &self,
        tenant_id: &str,
        exclude_extraction_id: &str,
        created_before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> DedupResult<Vec<InvoiceFingerprint>> {
        self.ensure_available()?;
        let state = self.invoices.read().await;

        let mut records: Vec<&ExtractionRecord> = state
            .extractions
            .values()
            .map(|s| &s.record)
            .filter(|r| r.tenant_id == tenant_id)
            .filter(|r| r.extraction_id != exclude_extraction_id)
            .filter(|r| r.duplicate_status != DuplicateStatus::Duplicate)
            .filter(|r| match created_before {
                Some(bound) => {
                    (r.created_at, r.extraction_id.as_str()) < (bound, exclude_extraction_id)
                }
                None => true,
            })
            .collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.extraction_id.cmp(&b.extraction_id))
        });

        Ok(records
            .into_iter()
            .take(limit)
            .map(|r| FingerprintBuilder::build(&r.extraction_id, &r.tenant_id, &r.fields))
            .collect())
    }

    async fn save_duplicate_link(&self, link: &DuplicateCandidateLink) -> DedupResult<()> {
        self.ensure_available()?;
        apply_link(&mut *self.invoices.write().await, link);
        Ok(())
    }

    async fn update_extraction_duplicate_status(&self, update: &StatusUpdate) -> DedupResult<()> {
        self.ensure_available()?;
        apply_status(&mut *self.invoices.write().await, update)?;
        Ok(())
    }

    async fn persist_duplicate_verdict(
        &self,
        link: Option<&DuplicateCandidateLink>,
        update: &StatusUpdate,
    ) -> DedupResult<()> {
        self.ensure_available()?;
        let mut state = self.invoices.write().await;

        // 先校验再写，失败时两边都不落
        let exists = state
            .extractions
            .get(&update.extraction_id)
            .is_some_and(|s| s.record.tenant_id == update.tenant_id);
        if !exists {
            return Err(DedupError::NotFound(format!(
                "extraction {} in tenant {}",
                update.extraction_id, update.tenant_id
            )));
        }

        if apply_status(&mut state, update)? {
            let keep = link.map(|l| l.candidate_extraction_id.as_str());
            remove_stale_links(&mut state, &update.extraction_id, keep);
        }
        if let Some(link) = link {
            apply_link(&mut state, link);
        }
        Ok(())
    }

    async fn list_extractions_for_rescan(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> DedupResult<Vec<ExtractionRecord>> {
        self.ensure_available()?;
        let state = self.invoices.read().await;

        let mut records: Vec<ExtractionRecord> = state
            .extractions
            .values()
            .map(|s| &s.record)
            .filter(|r| r.tenant_id == tenant_id && r.duplicate_status == DuplicateStatus::Unique)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.extraction_id.cmp(&b.extraction_id))
        });
        records.truncate(limit);
        Ok(records)
    }
}
