use crate::config::FieldWeights;
use crate::error::DedupResult;
use crate::models::{InvoiceFingerprint, TokenSet};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::str::FromStr;

/// 日期容差 (含)
const DATE_TOLERANCE_DAYS: i64 = 1;
/// 金额绝对容差 (含)
const AMOUNT_TOLERANCE: &str = "0.01";
/// 合成得分按 1e-9 取整，消除浮点累加误差，保证边界分数落在阈值上
const SCORE_GRID: f64 = 1e9;

/// 单字段得分；None 表示任一侧缺失，该字段不参与加权
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldScores {
    pub vendor_name: Option<f64>,
    pub invoice_number: Option<f64>,
    pub invoice_date: Option<f64>,
    pub total_amount: Option<f64>,
}

/// 一次比较的临时结果，不落库
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintScore {
    pub candidate_id: String,
    pub score: f64,
    pub fields: FieldScores,
}

/// 加权相似度评分
///
/// 缺失字段的权重按比例分摊给两侧都存在的字段：
/// `score = Σ w_i·s_i / Σ w_i`，没有可比较字段时得分为 0
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    weights: FieldWeights,
    amount_tolerance: BigDecimal,
}

impl SimilarityScorer {
    /// 权重不合法时构造即失败
    pub fn new(weights: FieldWeights) -> DedupResult<Self> {
        weights.validate()?;
        Ok(Self {
            weights,
            amount_tolerance: amount_tolerance(),
        })
    }

    pub fn weights(&self) -> &FieldWeights {
        &self.weights
    }

    pub fn score(&self, candidate: &InvoiceFingerprint, subject: &InvoiceFingerprint) -> f64 {
        self.score_detailed(candidate, subject).score
    }

    pub fn score_detailed(
        &self,
        candidate: &InvoiceFingerprint,
        subject: &InvoiceFingerprint,
    ) -> FingerprintScore {
        let fields = FieldScores {
            vendor_name: both(&candidate.vendor_name, &subject.vendor_name)
                .map(|(a, b)| vendor_similarity(a, b)),
            invoice_number: both(&candidate.invoice_number, &subject.invoice_number)
                .map(|(a, b)| invoice_number_similarity(a, b)),
            invoice_date: both(&candidate.invoice_date, &subject.invoice_date)
                .map(|(a, b)| date_similarity(*a, *b)),
            total_amount: both(&candidate.total_amount, &subject.total_amount)
                .map(|(a, b)| self.amount_similarity(a, b)),
        };

        FingerprintScore {
            candidate_id: candidate.extraction_id.clone(),
            score: self.combine(&fields),
            fields,
        }
    }

    fn combine(&self, fields: &FieldScores) -> f64 {
        let weighted_fields = [
            (self.weights.vendor_name, fields.vendor_name),
            (self.weights.invoice_number, fields.invoice_number),
            (self.weights.invoice_date, fields.invoice_date),
            (self.weights.total_amount, fields.total_amount),
        ];

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for (weight, score) in weighted_fields {
            if let Some(score) = score {
                weighted_sum += weight * score;
                weight_total += weight;
            }
        }

        if weight_total <= 0.0 {
            return 0.0;
        }
        let score = ((weighted_sum / weight_total) * SCORE_GRID).round() / SCORE_GRID;
        score.clamp(0.0, 1.0)
    }

    fn amount_similarity(&self, a: &BigDecimal, b: &BigDecimal) -> f64 {
        if (a - b).abs() <= self.amount_tolerance {
            1.0
        } else {
            0.0
        }
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self {
            weights: FieldWeights::default(),
            amount_tolerance: amount_tolerance(),
        }
    }
}

fn amount_tolerance() -> BigDecimal {
    BigDecimal::from_str(AMOUNT_TOLERANCE).unwrap_or_else(|_| BigDecimal::from(0))
}

fn both<'a, T>(a: &'a Option<T>, b: &'a Option<T>) -> Option<(&'a T, &'a T)> {
    a.as_ref().zip(b.as_ref())
}

/// Jaccard 相似度；两个空集合视为无法比较出相似 (0)
pub fn vendor_similarity(a: &TokenSet, b: &TokenSet) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// 发票号只有完全一致才得分，部分匹配误报风险太高
pub fn invoice_number_similarity(a: &str, b: &str) -> f64 {
    if !a.is_empty() && a == b {
        1.0
    } else {
        0.0
    }
}

pub fn date_similarity(a: NaiveDate, b: NaiveDate) -> f64 {
    if (a - b).num_days().abs() <= DATE_TOLERANCE_DAYS {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DuplicateType;
    use crate::service::classifier::ConfidenceClassifier;
    use crate::service::normalizer::FieldNormalizer;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    fn fp(
        id: &str,
        vendor: Option<&str>,
        number: Option<&str>,
        date: Option<(i32, u32, u32)>,
        amount: Option<&str>,
    ) -> InvoiceFingerprint {
        InvoiceFingerprint {
            extraction_id: id.to_string(),
            tenant_id: "tenant-a".to_string(),
            vendor_name: vendor.map(FieldNormalizer::normalize_name),
            invoice_number: number.map(FieldNormalizer::normalize_invoice_number),
            invoice_date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            total_amount: amount.and_then(FieldNormalizer::normalize_amount),
        }
    }

    fn full(id: &str) -> InvoiceFingerprint {
        fp(
            id,
            Some("Acme Ltd"),
            Some("INV-100"),
            Some((2024, 1, 10)),
            Some("500.00"),
        )
    }

    #[test]
    fn identical_fingerprints_score_one() {
        let scorer = SimilarityScorer::default();
        assert_eq!(scorer.score(&full("a"), &full("b")), 1.0);
    }

    #[test]
    fn missing_invoice_number_on_one_side_is_redistributed() {
        let scorer = SimilarityScorer::default();
        let a = full("a");
        let b = fp("b", Some("ACME LTD."), None, Some((2024, 1, 10)), Some("500.00"));

        let result = scorer.score_detailed(&a, &b);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.fields.invoice_number, None);
    }

    #[test]
    fn hand_computed_partial_score() {
        let scorer = SimilarityScorer::default();
        // vendor 1/2, number 1, date 0 (2 days), amount 1
        let a = fp("a", Some("Acme Ltd"), Some("INV-1"), Some((2024, 1, 10)), Some("10"));
        let b = fp("b", Some("Acme"), Some("inv 1"), Some((2024, 1, 12)), Some("10.00"));
        let expected = 0.30 * 0.5 + 0.30 * 1.0 + 0.20 * 0.0 + 0.20 * 1.0;
        assert!((scorer.score(&a, &b) - expected).abs() < EPS);

        // 去掉发票号后: (0.15 + 0 + 0.2) / 0.7
        let b = fp("b", Some("Acme"), None, Some((2024, 1, 12)), Some("10.00"));
        assert!((scorer.score(&a, &b) - 0.5).abs() < EPS);
    }

    #[test]
    fn boundary_scores_reach_the_higher_tier() {
        let scorer = SimilarityScorer::default();
        let classifier = ConfidenceClassifier::default();

        // vendor 1/2, 其余全中: 0.15 + 0.3 + 0.2 + 0.2 = 0.85
        let a = full("a");
        let b = fp("b", Some("Acme"), Some("INV-100"), Some((2024, 1, 10)), Some("500.00"));
        let score = scorer.score(&a, &b);
        assert_eq!(score, 0.85);
        assert_eq!(classifier.classify(score), DuplicateType::Likely);

        // vendor 全中, 发票号不同: 0.3 + 0 + 0.2 + 0.2 = 0.70
        let c = fp("c", Some("Acme Ltd"), Some("INV-999"), Some((2024, 1, 10)), Some("500.00"));
        let score = scorer.score(&a, &c);
        assert_eq!(score, 0.70);
        assert_eq!(classifier.classify(score), DuplicateType::Possible);
    }

    #[test]
    fn amount_tolerance_is_inclusive_one_cent() {
        let scorer = SimilarityScorer::default();
        let base = fp("a", None, None, None, Some("100.00"));
        let near = fp("b", None, None, None, Some("100.01"));
        let far = fp("c", None, None, None, Some("100.02"));

        assert_eq!(scorer.score_detailed(&base, &near).fields.total_amount, Some(1.0));
        assert_eq!(scorer.score_detailed(&base, &far).fields.total_amount, Some(0.0));
    }

    #[test]
    fn credit_note_does_not_match_invoice_amount() {
        let scorer = SimilarityScorer::default();
        let invoice = fp("a", None, None, None, Some("500.00"));
        let credit = fp("b", None, None, None, Some("-500.00"));
        assert_eq!(scorer.score(&invoice, &credit), 0.0);
    }

    #[test]
    fn date_tolerance_is_one_day() {
        let scorer = SimilarityScorer::default();
        let base = fp("a", None, None, Some((2024, 1, 10)), None);
        let next_day = fp("b", None, None, Some((2024, 1, 11)), None);
        let two_days = fp("c", None, None, Some((2024, 1, 12)), None);
        let prev_day = fp("d", None, None, Some((2024, 1, 9)), None);

        assert_eq!(scorer.score_detailed(&base, &next_day).fields.invoice_date, Some(1.0));
        assert_eq!(scorer.score_detailed(&base, &prev_day).fields.invoice_date, Some(1.0));
        assert_eq!(scorer.score_detailed(&base, &two_days).fields.invoice_date, Some(0.0));
    }

    #[test]
    fn invoice_numbers_are_exact_or_nothing() {
        assert_eq!(invoice_number_similarity("inv100", "inv100"), 1.0);
        assert_eq!(invoice_number_similarity("inv100", "inv1000"), 0.0);
        assert_eq!(invoice_number_similarity("", ""), 0.0);
    }

    #[test]
    fn jaccard_over_token_sets() {
        let a = FieldNormalizer::normalize_name("Acme Widgets Ltd");
        let b = FieldNormalizer::normalize_name("Acme Ltd");
        assert!((vendor_similarity(&a, &b) - 2.0 / 3.0).abs() < EPS);
        assert_eq!(vendor_similarity(&TokenSet::new(), &TokenSet::new()), 0.0);
    }

    #[test]
    fn no_comparable_fields_scores_zero() {
        let scorer = SimilarityScorer::default();
        let empty = fp("a", None, None, None, None);
        assert_eq!(scorer.score(&empty, &full("b")), 0.0);

        let vendor_only = fp("b", Some("Acme"), None, None, None);
        let amount_only = fp("c", None, None, None, Some("1.00"));
        assert_eq!(scorer.score(&vendor_only, &amount_only), 0.0);
    }

    #[test]
    fn invalid_weights_fail_construction() {
        let weights = FieldWeights {
            total_amount: 0.5,
            ..FieldWeights::default()
        };
        assert!(SimilarityScorer::new(weights).is_err());
        assert!(SimilarityScorer::new(FieldWeights::default()).is_ok());
    }

    fn arb_fingerprint() -> impl Strategy<Value = InvoiceFingerprint> {
        let vendors = prop::sample::select(vec!["Acme Ltd", "ACME", "Globex Corp", "acme corp", ""]);
        let numbers = prop::sample::select(vec!["INV-100", "inv100", "INV-101", ""]);
        (
            prop::option::of(vendors),
            prop::option::of(numbers),
            prop::option::of(0i64..5),
            prop::option::of(-3i64..3),
        )
            .prop_map(|(vendor, number, day, cents)| InvoiceFingerprint {
                extraction_id: "p".to_string(),
                tenant_id: "tenant-a".to_string(),
                vendor_name: vendor.map(FieldNormalizer::normalize_name),
                invoice_number: number.map(FieldNormalizer::normalize_invoice_number),
                invoice_date: day.and_then(|d| {
                    NaiveDate::from_ymd_opt(2024, 1, 10)
                        .and_then(|base| base.checked_add_signed(chrono::Duration::days(d)))
                }),
                total_amount: cents.map(|c| BigDecimal::new((50_000 + c).into(), 2)),
            })
    }

    proptest! {
        #[test]
        fn prop_score_is_symmetric(a in arb_fingerprint(), b in arb_fingerprint()) {
            let scorer = SimilarityScorer::default();
            prop_assert_eq!(scorer.score(&a, &b), scorer.score(&b, &a));
        }

        #[test]
        fn prop_score_is_bounded(a in arb_fingerprint(), b in arb_fingerprint()) {
            let score = SimilarityScorer::default().score(&a, &b);
            prop_assert!((0.0..=1.0).contains(&score), "score {} out of bounds", score);
        }
    }
}
