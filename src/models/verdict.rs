use serde::{Deserialize, Serialize};

use super::link::DuplicateType;

/// 查重结论 - 文件级与发票级统一结构，方便调用方分支
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateVerdict {
    pub is_duplicate: bool,
    pub duplicate_type: DuplicateType,
    pub duplicate_candidate_id: Option<String>,
    pub confidence: f64,
}

impl DuplicateVerdict {
    pub fn unique() -> Self {
        Self {
            is_duplicate: false,
            duplicate_type: DuplicateType::Unique,
            duplicate_candidate_id: None,
            confidence: 0.0,
        }
    }

    /// 字节级完全一致的文件
    pub fn file_match(file_id: String) -> Self {
        Self {
            is_duplicate: true,
            duplicate_type: DuplicateType::Exact,
            duplicate_candidate_id: Some(file_id),
            confidence: 1.0,
        }
    }

    /// 由分档结果构造；unique 时仍保留最高分，便于排查
    pub fn classified(duplicate_type: DuplicateType, candidate_id: Option<String>, score: f64) -> Self {
        let candidate_id = if duplicate_type.requires_link() {
            candidate_id
        } else {
            None
        };
        Self {
            is_duplicate: duplicate_type.is_duplicate(),
            duplicate_type,
            duplicate_candidate_id: candidate_id,
            confidence: score,
        }
    }
}

/// 租户重扫统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RescanStats {
    pub tenant_id: String,
    pub scanned: usize,
    pub linked: usize,
    pub duplicates: usize,
    pub possible_duplicates: usize,
}
