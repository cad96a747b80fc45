use crate::models::TokenSet;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::str::FromStr;

/// 金额整数部分最多位数，超出视为非法 (科学计数法 "1e50000000" 之类)
const MAX_AMOUNT_INTEGER_DIGITS: i64 = 30;
/// 金额小数位 (指数) 上限
const MAX_AMOUNT_SCALE: i64 = 30;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// 字段归一化：名称、发票号、日期、金额
///
/// 非法输入一律视为 "字段不存在" (None)，不返回错误
pub struct FieldNormalizer;

impl FieldNormalizer {
    /// 小写 + 按空白/标点切分 + 丢弃空 token
    /// 不去除 "Ltd"/"Inc" 等法人后缀，避免把不同法人合并
    pub fn normalize_name(raw: &str) -> TokenSet {
        Self::tokens(raw).collect()
    }

    /// 发票号：同样切分，但按原顺序拼接成单个可比较字符串
    pub fn normalize_invoice_number(raw: &str) -> String {
        Self::tokens(raw).collect::<Vec<_>>().concat()
    }

    /// 解析为不含时间的日历日期，时间和时区直接丢弃
    pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(date);
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.date_naive());
        }
        NAIVE_DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .map(|dt| dt.date())
    }

    /// 四舍五入到 2 位小数 (0.5 远离零)；负数保留，贷项通知单不与发票混淆
    pub fn normalize_amount(raw: &str) -> Option<BigDecimal> {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| *c != ',' && *c != '_')
            .collect();
        if cleaned.is_empty() {
            return None;
        }
        let value = BigDecimal::from_str(&cleaned).ok()?;
        if !Self::amount_within_bounds(&value) {
            tracing::debug!("total amount {} is out of range, treating as absent", raw);
            return None;
        }
        Some(Self::round_amount(&value))
    }

    /// 在取整之前检查量级；超大指数会让 `with_scale` 展开出巨大的整数
    fn amount_within_bounds(value: &BigDecimal) -> bool {
        let (digits, scale) = value.as_bigint_and_exponent();
        if !(-MAX_AMOUNT_SCALE..=MAX_AMOUNT_SCALE).contains(&scale) {
            return false;
        }
        let digit_count = digits.to_string().trim_start_matches('-').len() as i64;
        digit_count - scale <= MAX_AMOUNT_INTEGER_DIGITS
    }

    pub fn round_amount(value: &BigDecimal) -> BigDecimal {
        value.round(2).with_scale(2)
    }

    pub fn name_from_value(value: &Value) -> Option<TokenSet> {
        match value {
            Value::String(s) => Some(Self::normalize_name(s)),
            Value::Number(n) => Some(Self::normalize_name(&n.to_string())),
            other => {
                tracing::debug!("vendor name has unexpected type, treating as absent: {}", other);
                None
            }
        }
    }

    pub fn invoice_number_from_value(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(Self::normalize_invoice_number(s)),
            Value::Number(n) => Some(Self::normalize_invoice_number(&n.to_string())),
            other => {
                tracing::debug!("invoice number has unexpected type, treating as absent: {}", other);
                None
            }
        }
    }

    pub fn date_from_value(value: &Value) -> Option<NaiveDate> {
        let parsed = value.as_str().and_then(Self::normalize_date);
        if parsed.is_none() {
            tracing::debug!("invoice date is not a valid date, treating as absent: {}", value);
        }
        parsed
    }

    pub fn amount_from_value(value: &Value) -> Option<BigDecimal> {
        let parsed = match value {
            Value::Number(n) => Self::normalize_amount(&n.to_string()),
            Value::String(s) => Self::normalize_amount(s),
            _ => None,
        };
        if parsed.is_none() {
            tracing::debug!("total amount is not numeric, treating as absent: {}", value);
        }
        parsed
    }

    fn tokens(raw: &str) -> impl Iterator<Item = String> + '_ {
        raw.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
    }
}
