use crate::config::ConfidenceThresholds;
use crate::error::DedupResult;
use crate::models::DuplicateType;

/// 置信度分档：下限包含，恰好落在边界时归入更高一档
///
/// | score            | 分档     |
/// |------------------|----------|
/// | >= exact         | Exact    |
/// | [likely, exact)  | Likely   |
/// | [possible,likely)| Possible |
/// | < possible       | Unique   |
#[derive(Debug, Clone)]
pub struct ConfidenceClassifier {
    thresholds: ConfidenceThresholds,
}

impl ConfidenceClassifier {
    pub fn new(thresholds: ConfidenceThresholds) -> DedupResult<Self> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &ConfidenceThresholds {
        &self.thresholds
    }

    pub fn classify(&self, score: f64) -> DuplicateType {
        if score >= self.thresholds.exact {
            DuplicateType::Exact
        } else if score >= self.thresholds.likely {
            DuplicateType::Likely
        } else if score >= self.thresholds.possible {
            DuplicateType::Possible
        } else {
            // NaN 也落在这里
            DuplicateType::Unique
        }
    }
}

impl Default for ConfidenceClassifier {
    fn default() -> Self {
        Self {
            thresholds: ConfidenceThresholds::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_resolve_to_higher_tier() {
        let classifier = ConfidenceClassifier::default();
        assert_eq!(classifier.classify(0.95), DuplicateType::Exact);
        assert_eq!(classifier.classify(0.85), DuplicateType::Likely);
        assert_eq!(classifier.classify(0.70), DuplicateType::Possible);
    }

    #[test]
    fn just_below_boundaries_drop_a_tier() {
        let classifier = ConfidenceClassifier::default();
        assert_eq!(classifier.classify(0.9499), DuplicateType::Likely);
        assert_eq!(classifier.classify(0.8499), DuplicateType::Possible);
        assert_eq!(classifier.classify(0.6999), DuplicateType::Unique);
    }

    #[test]
    fn full_range() {
        let classifier = ConfidenceClassifier::default();
        assert_eq!(classifier.classify(1.0), DuplicateType::Exact);
        assert_eq!(classifier.classify(0.9), DuplicateType::Likely);
        assert_eq!(classifier.classify(0.75), DuplicateType::Possible);
        assert_eq!(classifier.classify(0.0), DuplicateType::Unique);
        assert_eq!(classifier.classify(f64::NAN), DuplicateType::Unique);
    }

    #[test]
    fn invalid_thresholds_fail_construction() {
        let thresholds = ConfidenceThresholds {
            exact: 0.80,
            likely: 0.85,
            possible: 0.70,
        };
        assert!(ConfidenceClassifier::new(thresholds).is_err());
    }
}
