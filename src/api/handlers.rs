use crate::error::{DedupError, DedupResult};
use crate::models::{DuplicateVerdict, ExtractedFields, RescanStats};
use crate::service::DeduplicationFacade;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 请求体: 单个文件查重
#[derive(Debug, Deserialize)]
pub struct FileCheckRequest {
    pub tenant_id: String,
    /// 待检查文件自身的 ID，查询时排除
    pub file_id: Option<String>,
    pub content_hash: String,
    pub size_bytes: u64,
}

/// 批量文件中的一项
#[derive(Debug, Deserialize)]
pub struct BatchFileItem {
    pub file_id: Option<String>,
    pub content_hash: String,
    pub size_bytes: u64,
}

/// 请求体: 同一租户下的批量文件查重
#[derive(Debug, Deserialize)]
pub struct BatchFileCheckRequest {
    pub tenant_id: String,
    pub files: Vec<BatchFileItem>,
}

/// 请求体: 发票语义查重
#[derive(Debug, Deserialize)]
pub struct InvoiceCheckRequest {
    pub tenant_id: String,
    pub extraction_id: String,
    #[serde(default)]
    pub extracted_fields: ExtractedFields,
    pub candidate_limit: Option<usize>,
}

/// 请求体: 写回查重结论
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub tenant_id: String,
    pub extraction_id: String,
    pub verdict: DuplicateVerdict,
}

/// 请求体: 租户重扫
#[derive(Debug, Deserialize)]
pub struct RescanRequest {
    pub tenant_id: String,
    pub limit: Option<usize>,
}

/// 响应体
#[derive(Debug, Serialize)]
pub struct DedupResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

fn status_for(error: &DedupError) -> StatusCode {
    match error {
        DedupError::Input(_) | DedupError::InvariantViolation(_) => StatusCode::BAD_REQUEST,
        DedupError::NotFound(_) => StatusCode::NOT_FOUND,
        DedupError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        DedupError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn require_tenant(tenant_id: &str) -> DedupResult<()> {
    if tenant_id.trim().is_empty() {
        return Err(DedupError::Input("tenant_id must not be empty".to_string()));
    }
    Ok(())
}

fn respond<T: Serialize>(result: DedupResult<T>, message: impl FnOnce(&T) -> String) -> Response {
    match result {
        Ok(data) => {
            let response = DedupResponse {
                success: true,
                message: message(&data),
                data: Some(data),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            if e.is_retryable() {
                tracing::warn!("request failed with retryable error: {}", e);
            }
            let response = DedupResponse::<T> {
                success: false,
                message: format!("Error: {}", e),
                data: None,
            };
            (status_for(&e), Json(response)).into_response()
        }
    }
}

fn verdict_message(verdict: &DuplicateVerdict) -> String {
    format!(
        "{} (confidence {:.4})",
        verdict.duplicate_type, verdict.confidence
    )
}

/// 单文件精确查重
pub async fn check_file(
    State(facade): State<Arc<DeduplicationFacade>>,
    Json(req): Json<FileCheckRequest>,
) -> Response {
    let result = match require_tenant(&req.tenant_id) {
        Ok(()) => {
            facade
                .check_file_duplicate(
                    &req.content_hash,
                    req.size_bytes,
                    &req.tenant_id,
                    req.file_id.as_deref(),
                )
                .await
        }
        Err(e) => Err(e),
    };
    respond(result, verdict_message)
}

/// 批量文件精确查重，任一项失败则整体失败
pub async fn check_file_batch(
    State(facade): State<Arc<DeduplicationFacade>>,
    Json(req): Json<BatchFileCheckRequest>,
) -> Response {
    let result = match require_tenant(&req.tenant_id) {
        Ok(()) => {
            try_join_all(req.files.iter().map(|file| {
                facade.check_file_duplicate(
                    &file.content_hash,
                    file.size_bytes,
                    &req.tenant_id,
                    file.file_id.as_deref(),
                )
            }))
            .await
        }
        Err(e) => Err(e),
    };
    respond(result, |verdicts: &Vec<DuplicateVerdict>| {
        let duplicates = verdicts.iter().filter(|v| v.is_duplicate).count();
        format!("Checked {} files, {} duplicates", verdicts.len(), duplicates)
    })
}

/// 发票语义查重
pub async fn check_invoice(
    State(facade): State<Arc<DeduplicationFacade>>,
    Json(req): Json<InvoiceCheckRequest>,
) -> Response {
    let result = match require_tenant(&req.tenant_id) {
        Ok(()) => match req.candidate_limit {
            Some(limit) => {
                facade
                    .check_invoice_duplicate_with_limit(
                        &req.extraction_id,
                        &req.extracted_fields,
                        &req.tenant_id,
                        limit,
                    )
                    .await
            }
            None => {
                facade
                    .check_invoice_duplicate(&req.extraction_id, &req.extracted_fields, &req.tenant_id)
                    .await
            }
        },
        Err(e) => Err(e),
    };
    respond(result, verdict_message)
}

/// 写回查重结论 (状态与候选链接原子写入)
pub async fn update_invoice_status(
    State(facade): State<Arc<DeduplicationFacade>>,
    Json(req): Json<StatusUpdateRequest>,
) -> Response {
    let result = match require_tenant(&req.tenant_id) {
        Ok(()) => {
            facade
                .update_invoice_duplicate_status(&req.extraction_id, &req.tenant_id, &req.verdict)
                .await
        }
        Err(e) => Err(e),
    };
    respond(result, |_| format!("Updated extraction {}", req.extraction_id))
}

/// 租户重扫
pub async fn rescan_tenant(
    State(facade): State<Arc<DeduplicationFacade>>,
    Json(req): Json<RescanRequest>,
) -> Response {
    let result = match require_tenant(&req.tenant_id) {
        Ok(()) => facade.rescan_tenant(&req.tenant_id, req.limit).await,
        Err(e) => Err(e),
    };
    respond(result, |stats: &RescanStats| {
        format!(
            "Rescanned {} extractions, {} duplicates, {} possible duplicates",
            stats.scanned, stats.duplicates, stats.possible_duplicates
        )
    })
}
