use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// 抽取字段：AI 抽取流水线给出的 `{ value, confidence }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub value: Value,
    pub confidence: Option<f64>,
}

/// 抽取字段表 - 字段缺失、JSON null 均视为 "不存在"
///
/// 反序列化时宽松处理：字段既可以是 `{ "value": .., "confidence": .. }`，
/// 也可以是裸值；非对象的整体输入得到空表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct ExtractedFields {
    fields: HashMap<String, ExtractedField>,
}

impl ExtractedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: Value, confidence: Option<f64>) {
        self.fields
            .insert(name.to_string(), ExtractedField { value, confidence });
    }

    /// 构建器写法，主要用于测试与调用方拼装
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value.into(), None);
        self
    }

    /// 取字段值；缺失或为 null 时返回 None
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.fields
            .get(name)
            .map(|f| &f.value)
            .filter(|v| !v.is_null())
    }

    pub fn confidence(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(|f| f.confidence)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Value> for ExtractedFields {
    fn from(raw: Value) -> Self {
        let Value::Object(map) = raw else {
            tracing::debug!("extracted fields payload is not an object, treating as empty");
            return Self::default();
        };

        let fields = map
            .into_iter()
            .map(|(name, entry)| {
                let field = match entry {
                    Value::Object(mut obj) if obj.contains_key("value") => {
                        let confidence = obj.get("confidence").and_then(Value::as_f64);
                        ExtractedField {
                            value: obj.remove("value").unwrap_or(Value::Null),
                            confidence,
                        }
                    }
                    bare => ExtractedField {
                        value: bare,
                        confidence: None,
                    },
                };
                (name, field)
            })
            .collect();

        Self { fields }
    }
}

impl From<ExtractedFields> for Value {
    fn from(fields: ExtractedFields) -> Self {
        let map: Map<String, Value> = fields
            .fields
            .into_iter()
            .map(|(name, field)| {
                let mut entry = Map::new();
                entry.insert("value".to_string(), field.value);
                if let Some(confidence) = field.confidence {
                    entry.insert("confidence".to_string(), Value::from(confidence));
                }
                (name, Value::Object(entry))
            })
            .collect();
        Value::Object(map)
    }
}

/// 抽取记录上的查重状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStatus {
    Unique,
    PossibleDuplicate,
    Duplicate,
    /// 人工/外部流程设置，引擎从不自动改回
    Reviewing,
}

impl DuplicateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateStatus::Unique => "unique",
            DuplicateStatus::PossibleDuplicate => "possible_duplicate",
            DuplicateStatus::Duplicate => "duplicate",
            DuplicateStatus::Reviewing => "reviewing",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unique" => Some(DuplicateStatus::Unique),
            "possible_duplicate" => Some(DuplicateStatus::PossibleDuplicate),
            "duplicate" => Some(DuplicateStatus::Duplicate),
            "reviewing" => Some(DuplicateStatus::Reviewing),
            _ => None,
        }
    }
}

impl fmt::Display for DuplicateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 状态更新请求
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub extraction_id: String,
    pub tenant_id: String,
    pub status: DuplicateStatus,
    pub candidate_id: Option<String>,
    pub confidence: f64,
}

/// 待重扫的抽取记录
#[derive(Debug, Clone)]
pub struct ExtractionRecord {
    pub extraction_id: String,
    pub tenant_id: String,
    pub fields: ExtractedFields,
    pub duplicate_status: DuplicateStatus,
    pub created_at: DateTime<Utc>,
}
