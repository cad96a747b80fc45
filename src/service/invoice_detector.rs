use crate::config::DedupConfig;
use crate::db::RecordStore;
use crate::error::DedupResult;
use crate::models::{
    DuplicateCandidateLink, DuplicateType, DuplicateVerdict, ExtractedFields, ExtractionRecord,
    StatusUpdate,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

use super::classifier::ConfidenceClassifier;
use super::fingerprint::FingerprintBuilder;
use super::scorer::{FingerprintScore, SimilarityScorer};

/// 发票级语义查重：候选检索 -> 评分 -> 分档 -> 写入结论
///
/// 同租户内两条互为重复的新抽取并发检查时可能互相看不到，
/// 这是接受的竞争窗口，由租户重扫 (`DeduplicationFacade::rescan_tenant`) 事后修正
pub struct InvoiceDuplicateDetector {
    store: Arc<dyn RecordStore>,
    scorer: SimilarityScorer,
    classifier: ConfidenceClassifier,
    candidate_limit: usize,
}

impl InvoiceDuplicateDetector {
    /// 配置不合法 (权重和不为 1、阈值区间重叠) 时构造失败
    pub fn new(store: Arc<dyn RecordStore>, config: &DedupConfig) -> DedupResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            scorer: SimilarityScorer::new(config.weights)?,
            classifier: ConfidenceClassifier::new(config.thresholds)?,
            candidate_limit: config.candidate_limit,
        })
    }

    pub async fn check_invoice_duplicate(
        &self,
        extraction_id: &str,
        fields: &ExtractedFields,
        tenant_id: &str,
    ) -> DedupResult<DuplicateVerdict> {
        self.check_invoice_duplicate_with_limit(extraction_id, fields, tenant_id, self.candidate_limit)
            .await
    }

    /// 调用方可以收紧候选数量 (例如只看最近的开放抽取)
    pub async fn check_invoice_duplicate_with_limit(
        &self,
        extraction_id: &str,
        fields: &ExtractedFields,
        tenant_id: &str,
        candidate_limit: usize,
    ) -> DedupResult<DuplicateVerdict> {
        self.check(extraction_id, fields, tenant_id, None, candidate_limit)
            .await
    }

    /// 复查已入库的抽取：只与排在它之前的记录比较，链接始终由新记录指向旧记录
    pub async fn recheck_extraction(&self, record: &ExtractionRecord) -> DedupResult<DuplicateVerdict> {
        self.check(
            &record.extraction_id,
            &record.fields,
            &record.tenant_id,
            Some(record.created_at),
            self.candidate_limit,
        )
        .await
    }

    async fn check(
        &self,
        extraction_id: &str,
        fields: &ExtractedFields,
        tenant_id: &str,
        created_before: Option<DateTime<Utc>>,
        candidate_limit: usize,
    ) -> DedupResult<DuplicateVerdict> {
        let start_time = Instant::now();

        // 1. 构建指纹；全部字段缺失时不查库，直接判 unique
        let subject = FingerprintBuilder::build(extraction_id, tenant_id, fields);
        if subject.is_empty() {
            tracing::info!(
                "tenant {}: extraction {} has no comparable fields, marking unique",
                tenant_id, extraction_id
            );
            return Ok(DuplicateVerdict::unique());
        }

        // 2. 租户内候选
        let candidates = self
            .store
            .find_fingerprint_candidates(tenant_id, extraction_id, created_before, candidate_limit)
            .await
            .map_err(|e| {
                tracing::error!(
                    "tenant {}: candidate retrieval for {} failed: {}",
                    tenant_id, extraction_id, e
                );
                e
            })?;

        // 3. 逐一评分，取最高分 (同分保留先出现的)
        let mut best: Option<FingerprintScore> = None;
        for candidate in candidates
            .iter()
            .filter(|c| c.tenant_id == tenant_id && c.extraction_id != extraction_id)
        {
            let scored = self.scorer.score_detailed(candidate, &subject);
            tracing::debug!(
                "extraction {} vs {}: score {:.4} ({:?})",
                extraction_id, scored.candidate_id, scored.score, scored.fields
            );
            if best.as_ref().map_or(true, |b| scored.score > b.score) {
                best = Some(scored);
            }
        }

        // 4. 分档并写入
        let verdict = match best {
            Some(best) => {
                let duplicate_type = self.classifier.classify(best.score);
                DuplicateVerdict::classified(duplicate_type, Some(best.candidate_id), best.score)
            }
            None => DuplicateVerdict::unique(),
        };

        if verdict.duplicate_type.requires_link() {
            let (link, update) = verdict_records(extraction_id, tenant_id, &verdict);
            self.store
                .persist_duplicate_verdict(link.as_ref(), &update)
                .await?;
        }

        tracing::info!(
            "[Dedup] tenant {}: extraction {} -> {} (score {:.4}, candidate {:?}, {} candidates, {:?})",
            tenant_id,
            extraction_id,
            verdict.duplicate_type,
            verdict.confidence,
            verdict.duplicate_candidate_id,
            candidates.len(),
            start_time.elapsed()
        );

        // 5. 返回结论
        Ok(verdict)
    }
}

/// 把结论转换成要落库的链接和状态更新
///
/// 只有 possible 及以上且带候选 id 时才生成链接；没有链接的结论一律按 unique 写状态
pub fn verdict_records(
    extraction_id: &str,
    tenant_id: &str,
    verdict: &DuplicateVerdict,
) -> (Option<DuplicateCandidateLink>, StatusUpdate) {
    let link = match (&verdict.duplicate_candidate_id, verdict.duplicate_type) {
        (Some(candidate_id), duplicate_type) if duplicate_type != DuplicateType::Unique => {
            Some(DuplicateCandidateLink::new(
                extraction_id,
                candidate_id,
                tenant_id,
                verdict.confidence,
                duplicate_type,
            ))
        }
        _ => None,
    };

    let status = match &link {
        Some(link) => link.duplicate_type.status(),
        None => DuplicateType::Unique.status(),
    };

    let update = StatusUpdate {
        extraction_id: extraction_id.to_string(),
        tenant_id: tenant_id.to_string(),
        status,
        candidate_id: link.as_ref().map(|l| l.candidate_extraction_id.clone()),
        confidence: verdict.confidence,
    };

    (link, update)
}
