//! 规则领域模型

use crate::condition::Condition;
use crate::error::{Result, RuleError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 规则命中时产生的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            params: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}

fn default_priority() -> i64 {
    1
}

/// 规则定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i64,
    pub conditions: Condition,
    pub event: Event,
}

impl Rule {
    /// 创建规则，顶层条件必须是 all / any / not 或条件引用
    pub fn new(conditions: Condition, event: Event) -> Result<Self> {
        let rule = Self {
            name: None,
            priority: default_priority(),
            conditions,
            event,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Result<Self> {
        self.priority = priority;
        self.validate()?;
        Ok(self)
    }

    /// 从 JSON 字符串解析并校验规则
    pub fn from_json(json: &str) -> Result<Self> {
        let rule: Rule = serde_json::from_str(json)?;
        rule.validate()?;
        Ok(rule)
    }

    pub fn validate(&self) -> Result<()> {
        if self.priority <= 0 {
            return Err(RuleError::InvalidField {
                field: "priority",
                message: "必须大于 0".to_string(),
            });
        }
        if !self.conditions.is_boolean() && !self.conditions.is_reference() {
            return Err(RuleError::InvalidField {
                field: "conditions",
                message: "顶层条件必须是 all、any、not 或条件引用".to_string(),
            });
        }
        Ok(())
    }
}
