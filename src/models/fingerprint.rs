use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use indexmap::IndexSet;

/// 归一化后的名称 token 集合 (保留首次出现顺序，便于日志阅读)
pub type TokenSet = IndexSet<String>;

/// 发票指纹 - 派生数据，不原样落库；构建后不可变
///
/// 每个字段用 Option 表示 "存在 / 不存在"，空字符串属于 "存在"
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceFingerprint {
    pub extraction_id: String,
    pub tenant_id: String,
    pub vendor_name: Option<TokenSet>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub total_amount: Option<BigDecimal>, // scale = 2
}

impl InvoiceFingerprint {
    /// 四个字段全部缺失时无法据此判断任何相似度
    pub fn is_empty(&self) -> bool {
        self.present_field_count() == 0
    }

    pub fn present_field_count(&self) -> usize {
        [
            self.vendor_name.is_some(),
            self.invoice_number.is_some(),
            self.invoice_date.is_some(),
            self.total_amount.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}
