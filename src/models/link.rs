use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::extraction::DuplicateStatus;

/// 置信度分档
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateType {
    Unique,
    Possible,
    Likely,
    Exact,
}

impl DuplicateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateType::Unique => "unique",
            DuplicateType::Possible => "possible",
            DuplicateType::Likely => "likely",
            DuplicateType::Exact => "exact",
        }
    }

    /// possible 及以上需要写候选链接
    pub fn requires_link(&self) -> bool {
        *self >= DuplicateType::Possible
    }

    /// 调用方据此跳过后续处理；possible 只标记待复核，不丢弃文档
    pub fn is_duplicate(&self) -> bool {
        *self >= DuplicateType::Likely
    }

    /// 分档 -> 抽取记录状态
    pub fn status(&self) -> DuplicateStatus {
        match self {
            DuplicateType::Unique => DuplicateStatus::Unique,
            DuplicateType::Possible => DuplicateStatus::PossibleDuplicate,
            DuplicateType::Likely | DuplicateType::Exact => DuplicateStatus::Duplicate,
        }
    }
}

impl fmt::Display for DuplicateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 候选链接：新抽取 -> 已存在抽取 (有向存储)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCandidateLink {
    pub extraction_id: String,
    pub candidate_extraction_id: String,
    pub tenant_id: String,
    pub similarity_score: f64,
    pub duplicate_type: DuplicateType,
    pub created_at: DateTime<Utc>,
}

impl DuplicateCandidateLink {
    pub fn new(
        extraction_id: &str,
        candidate_extraction_id: &str,
        tenant_id: &str,
        similarity_score: f64,
        duplicate_type: DuplicateType,
    ) -> Self {
        Self {
            extraction_id: extraction_id.to_string(),
            candidate_extraction_id: candidate_extraction_id.to_string(),
            tenant_id: tenant_id.to_string(),
            similarity_score,
            duplicate_type,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_maps_to_status() {
        assert_eq!(DuplicateType::Unique.status(), DuplicateStatus::Unique);
        assert_eq!(DuplicateType::Possible.status(), DuplicateStatus::PossibleDuplicate);
        assert_eq!(DuplicateType::Likely.status(), DuplicateStatus::Duplicate);
        assert_eq!(DuplicateType::Exact.status(), DuplicateStatus::Duplicate);
    }

    #[test]
    fn only_possible_and_above_require_link() {
        assert!(!DuplicateType::Unique.requires_link());
        assert!(DuplicateType::Possible.requires_link());
        assert!(!DuplicateType::Possible.is_duplicate());
        assert!(DuplicateType::Likely.is_duplicate());
    }

    #[test]
    fn stored_name_matches_serde_name() {
        for t in [
            DuplicateType::Unique,
            DuplicateType::Possible,
            DuplicateType::Likely,
            DuplicateType::Exact,
        ] {
            assert_eq!(serde_json::to_value(t).unwrap(), serde_json::json!(t.as_str()));
        }
    }
}
