use crate::models::{ExtractedFields, InvoiceFingerprint};

use super::normalizer::FieldNormalizer;

/// 抽取字段名 (与抽取流水线输出约定一致)
pub const FIELD_VENDOR_NAME: &str = "vendorName";
pub const FIELD_INVOICE_NUMBER: &str = "invoiceNumber";
pub const FIELD_INVOICE_DATE: &str = "invoiceDate";
pub const FIELD_TOTAL_AMOUNT: &str = "totalAmount";

/// 指纹构建器：从抽取字段表派生发票指纹
pub struct FingerprintBuilder;

impl FingerprintBuilder {
    /// 部分字段缺失是常态，绝不报错；缺失字段为 None 而不是空字符串
    pub fn build(extraction_id: &str, tenant_id: &str, fields: &ExtractedFields) -> InvoiceFingerprint {
        InvoiceFingerprint {
            extraction_id: extraction_id.to_string(),
            tenant_id: tenant_id.to_string(),
            vendor_name: fields
                .value(FIELD_VENDOR_NAME)
                .and_then(FieldNormalizer::name_from_value),
            invoice_number: fields
                .value(FIELD_INVOICE_NUMBER)
                .and_then(FieldNormalizer::invoice_number_from_value),
            invoice_date: fields
                .value(FIELD_INVOICE_DATE)
                .and_then(FieldNormalizer::date_from_value),
            total_amount: fields
                .value(FIELD_TOTAL_AMOUNT)
                .and_then(FieldNormalizer::amount_from_value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn builds_all_fields() {
        let fields = ExtractedFields::new()
            .with(FIELD_VENDOR_NAME, "Acme Ltd")
            .with(FIELD_INVOICE_NUMBER, "INV-100")
            .with(FIELD_INVOICE_DATE, "2024-01-10")
            .with(FIELD_TOTAL_AMOUNT, 500.0);

        let fp = FingerprintBuilder::build("ext-1", "tenant-a", &fields);

        assert_eq!(fp.extraction_id, "ext-1");
        assert_eq!(fp.tenant_id, "tenant-a");
        assert_eq!(fp.vendor_name.as_ref().map(|t| t.len()), Some(2));
        assert_eq!(fp.invoice_number.as_deref(), Some("inv100"));
        assert_eq!(fp.invoice_date, NaiveDate::from_ymd_opt(2024, 1, 10));
        assert_eq!(fp.total_amount, Some(BigDecimal::from_str("500.00").unwrap()));
        assert_eq!(fp.present_field_count(), 4);
    }

    #[test]
    fn missing_fields_are_none() {
        let fields = ExtractedFields::new().with(FIELD_VENDOR_NAME, "Acme");
        let fp = FingerprintBuilder::build("ext-1", "tenant-a", &fields);

        assert!(fp.vendor_name.is_some());
        assert!(fp.invoice_number.is_none());
        assert!(fp.invoice_date.is_none());
        assert!(fp.total_amount.is_none());
    }

    #[test]
    fn empty_string_is_present_not_absent() {
        let fields = ExtractedFields::new().with(FIELD_INVOICE_NUMBER, "");
        let fp = FingerprintBuilder::build("ext-1", "tenant-a", &fields);

        assert_eq!(fp.invoice_number.as_deref(), Some(""));
        assert!(!fp.is_empty());
    }

    #[test]
    fn invalid_values_become_absent() {
        let fields: ExtractedFields = serde_json::from_value(json!({
            "vendorName": { "value": null },
            "invoiceDate": { "value": "not a date", "confidence": 0.2 },
            "totalAmount": { "value": "abc" }
        }))
        .unwrap();
        let fp = FingerprintBuilder::build("ext-1", "tenant-a", &fields);

        assert!(fp.is_empty());
    }
}
