use crate::db::store::RecordStore;
use crate::error::{DedupError, DedupResult};
use crate::models::{
    DuplicateCandidateLink, DuplicateStatus, ExtractedFields, ExtractionRecord, FileContentRecord,
    InvoiceFingerprint, StatusUpdate,
};
use crate::service::fingerprint::FingerprintBuilder;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use std::time::{Duration, Instant};

/// 写操作超时
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, FromRow)]
struct FileContentRow {
    file_id: String,
    tenant_id: String,
    content_hash: String,
    size_bytes: i64,
    created_at: DateTime<Utc>,
}

impl From<FileContentRow> for FileContentRecord {
    fn from(row: FileContentRow) -> Self {
        Self {
            file_id: row.file_id,
            tenant_id: row.tenant_id,
            content_hash: row.content_hash,
            size_bytes: u64::try_from(row.size_bytes).unwrap_or_default(),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ExtractionRow {
    extraction_id: String,
    tenant_id: String,
    extracted_fields: Json<ExtractedFields>,
    duplicate_status: String,
    created_at: DateTime<Utc>,
}

impl ExtractionRow {
    fn fingerprint(&self) -> InvoiceFingerprint {
        FingerprintBuilder::build(&self.extraction_id, &self.tenant_id, &self.extracted_fields.0)
    }

    fn into_record(self) -> ExtractionRecord {
        let duplicate_status = DuplicateStatus::parse(&self.duplicate_status).unwrap_or_else(|| {
            tracing::warn!(
                "extraction {} has unknown duplicate_status '{}', treating as unique",
                self.extraction_id, self.duplicate_status
            );
            DuplicateStatus::Unique
        });
        ExtractionRecord {
            extraction_id: self.extraction_id,
            tenant_id: self.tenant_id,
            fields: self.extracted_fields.0,
            duplicate_status,
            created_at: self.created_at,
        }
    }
}

/// 按内容哈希和大小查询租户内文件 (最早创建优先)
pub async fn find_files_by_hash_and_size(
    pool: &PgPool,
    tenant_id: &str,
    content_hash: &str,
    size_bytes: u64,
    exclude_file_id: Option<&str>,
) -> Result<Vec<FileContentRecord>, sqlx::Error> {
    // 超出 bigint 范围的大小不可能存在于表中
    let Ok(size_bytes) = i64::try_from(size_bytes) else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query_as::<_, FileContentRow>(
        r#"
        SELECT file_id, tenant_id, content_hash, size_bytes, created_at
        FROM file_content
        WHERE tenant_id = $1
          AND content_hash = $2
          AND size_bytes = $3
          AND ($4::text IS NULL OR file_id <> $4)
        ORDER BY created_at ASC, file_id ASC
        "#,
    )
    .bind(tenant_id)
    .bind(content_hash)
    .bind(size_bytes)
    .bind(exclude_file_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(FileContentRecord::from).collect())
}

/// 查询候选抽取记录 (最新优先，排除已判定为 duplicate 的记录)
pub async fn find_candidate_extractions(
    pool: &PgPool,
    tenant_id: &str,
    exclude_extraction_id: &str,
    created_before: Option<DateTime<Utc>>,
    limit: usize,
) -> Result<Vec<InvoiceFingerprint>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ExtractionRow>(
        r#"
        SELECT extraction_id, tenant_id, extracted_fields, duplicate_status, created_at
        FROM invoice_extraction
        WHERE tenant_id = $1
          AND extraction_id <> $2
          AND duplicate_status <> 'duplicate'
          AND ($3::timestamptz IS NULL OR (created_at, extraction_id) < ($3, $2))
        ORDER BY created_at DESC, extraction_id ASC
        LIMIT $4
        "#,
    )
    .bind(tenant_id)
    .bind(exclude_extraction_id)
    .bind(created_before)
    .bind(i64::try_from(limit).unwrap_or(i64::MAX))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(ExtractionRow::fingerprint).collect())
}

/// 查询仍为 unique 的抽取记录 (最新创建优先)
pub async fn list_unique_extractions(
    pool: &PgPool,
    tenant_id: &str,
    limit: usize,
) -> Result<Vec<ExtractionRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ExtractionRow>(
        r#"
        SELECT extraction_id, tenant_id, extracted_fields, duplicate_status, created_at
        FROM invoice_extraction
        WHERE tenant_id = $1
          AND duplicate_status = 'unique'
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(tenant_id)
    .bind(i64::try_from(limit).unwrap_or(i64::MAX))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ExtractionRow::into_record).collect())
}

/// 写入候选链接 (同一对只保留一条)
pub async fn upsert_link(
    conn: &mut PgConnection,
    link: &DuplicateCandidateLink,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO duplicate_candidate_link (
            extraction_id, candidate_extraction_id, tenant_id,
            similarity_score, duplicate_type, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (extraction_id, candidate_extraction_id)
        DO UPDATE SET similarity_score = EXCLUDED.similarity_score,
                      duplicate_type = EXCLUDED.duplicate_type
        "#,
    )
    .bind(&link.extraction_id)
    .bind(&link.candidate_extraction_id)
    .bind(&link.tenant_id)
    .bind(link.similarity_score)
    .bind(link.duplicate_type.as_str())
    .bind(link.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// 删除抽取记录上除 `keep_candidate_id` 之外的链接，返回删除条数
pub async fn delete_stale_links(
    conn: &mut PgConnection,
    tenant_id: &str,
    extraction_id: &str,
    keep_candidate_id: Option<&str>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM duplicate_candidate_link
        WHERE extraction_id = $1
          AND tenant_id = $2
          AND ($3::text IS NULL OR candidate_extraction_id <> $3)
        "#,
    )
    .bind(extraction_id)
    .bind(tenant_id)
    .bind(keep_candidate_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// 更新抽取记录状态；reviewing 状态不被覆盖
///
/// 返回是否真正写入了状态 (reviewing 时为 false)
pub async fn update_status(conn: &mut PgConnection, update: &StatusUpdate) -> DedupResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE invoice_extraction
        SET duplicate_status = $1,
            duplicate_candidate_id = $2,
            duplicate_confidence = $3,
            updated_at = now()
        WHERE extraction_id = $4
          AND tenant_id = $5
          AND duplicate_status <> 'reviewing'
        "#,
    )
    .bind(update.status.as_str())
    .bind(update.candidate_id.as_deref())
    .bind(update.confidence)
    .bind(&update.extraction_id)
    .bind(&update.tenant_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(true);
    }

    // 没有更新到行：要么不存在，要么处于 reviewing
    let current = sqlx::query_scalar::<_, String>(
        "SELECT duplicate_status FROM invoice_extraction WHERE extraction_id = $1 AND tenant_id = $2",
    )
    .bind(&update.extraction_id)
    .bind(&update.tenant_id)
    .fetch_optional(&mut *conn)
    .await?;

    match current {
        Some(_) => {
            tracing::info!(
                "extraction {} is under review, keeping status",
                update.extraction_id
            );
            Ok(false)
        }
        None => Err(DedupError::NotFound(format!(
            "extraction {} in tenant {}",
            update.extraction_id, update.tenant_id
        ))),
    }
}

/// 基于 sqlx 连接池的记录存储
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn persist_in_transaction(
        &self,
        link: Option<&DuplicateCandidateLink>,
        update: &StatusUpdate,
    ) -> DedupResult<()> {
        let mut tx = self.pool.begin().await?;
        let applied = update_status(&mut tx, update).await?;
        // 状态被改写时，旧候选的链接随之作废
        if applied {
            let keep = link.map(|l| l.candidate_extraction_id.as_str());
            let removed =
                delete_stale_links(&mut tx, &update.tenant_id, &update.extraction_id, keep).await?;
            if removed > 0 {
                tracing::debug!(
                    "extraction {}: 删除 {} 条过期链接",
                    update.extraction_id, removed
                );
            }
        }
        if let Some(link) = link {
            upsert_link(&mut tx, link).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn find_files_by_hash_and_size(
        &self,
        tenant_id: &str,
        content_hash: &str,
        size_bytes: u64,
        exclude_file_id: Option<&str>,
    ) -> DedupResult<Vec<FileContentRecord>> {
        Ok(find_files_by_hash_and_size(
            &self.pool,
            tenant_id,
            content_hash,
            size_bytes,
            exclude_file_id,
        )
        .await?)
    }

    async fn find_fingerprint_candidates(
        &self,
        tenant_id: &str,
        exclude_extraction_id: &str,
        created_before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> DedupResult<Vec<InvoiceFingerprint>> {
        Ok(find_candidate_extractions(
            &self.pool,
            tenant_id,
            exclude_extraction_id,
            created_before,
            limit,
        )
        .await?)
    }

    async fn save_duplicate_link(&self, link: &DuplicateCandidateLink) -> DedupResult<()> {
        let mut conn = self.pool.acquire().await?;
        upsert_link(&mut conn, link).await?;
        Ok(())
    }

    async fn update_extraction_duplicate_status(&self, update: &StatusUpdate) -> DedupResult<()> {
        let mut conn = self.pool.acquire().await?;
        update_status(&mut conn, update).await?;
        Ok(())
    }

    async fn persist_duplicate_verdict(
        &self,
        link: Option<&DuplicateCandidateLink>,
        update: &StatusUpdate,
    ) -> DedupResult<()> {
        tracing::debug!("开始写入查重结论, extraction {}", update.extraction_id);
        let start_time = Instant::now();

        // 超时后事务随 future 一起丢弃并回滚
        match tokio::time::timeout(WRITE_TIMEOUT, self.persist_in_transaction(link, update)).await {
            Ok(Ok(())) => {
                tracing::debug!(
                    "✓ 查重结论写入成功, extraction {}, 耗时: {:?}",
                    update.extraction_id,
                    start_time.elapsed()
                );
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!(
                    "✗ 查重结论写入失败, extraction {}, 耗时: {:?}, 错误: {}",
                    update.extraction_id,
                    start_time.elapsed(),
                    e
                );
                Err(e)
            }
            Err(_) => {
                tracing::error!("✗ 查重结论写入超时 (>{:?})!", WRITE_TIMEOUT);
                Err(DedupError::Storage(format!(
                    "writing verdict for {} timed out",
                    update.extraction_id
                )))
            }
        }
    }

    async fn list_extractions_for_rescan(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> DedupResult<Vec<ExtractionRecord>> {
        Ok(list_unique_extractions(&self.pool, tenant_id, limit).await?)
    }
}
