//! 规则执行结果

use crate::almanac::FactProvider;
use crate::condition::Condition;
use crate::error::{Result, RuleError};
use crate::models::Event;
use futures::future::try_join_all;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

/// 规则执行结果
///
/// 构造时取得条件树与事件的独立副本，之后修改原规则不会影响已产生的结果。
#[derive(Debug, Clone, PartialEq)]
pub struct RuleResult {
    conditions: Condition,
    event: Event,
    priority: i64,
    name: Option<String>,
    result: Option<bool>,
}

impl RuleResult {
    pub fn new(conditions: &Condition, event: &Event, priority: i64, name: Option<&str>) -> Self {
        Self {
            conditions: conditions.clone(),
            event: event.clone(),
            priority,
            name: name.map(str::to_string),
            result: None,
        }
    }

    pub fn conditions(&self) -> &Condition {
        &self.conditions
    }

    pub(crate) fn conditions_mut(&mut self) -> &mut Condition {
        &mut self.conditions
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 规则结论，未设置时为 None
    pub fn result(&self) -> Option<bool> {
        self.result
    }

    /// 设置规则结论，每个结果只能设置一次
    pub fn set_result(&mut self, result: bool) -> Result<()> {
        if self.result.is_some() {
            return Err(RuleError::ResultAlreadySet);
        }
        self.result = Some(result);
        Ok(())
    }

    /// 并发解析事件参数中的事实引用，任一失败则整体失败且参数保持不变
    pub async fn resolve_event_params(&mut self, almanac: &dyn FactProvider) -> Result<()> {
        let Some(params) = &self.event.params else {
            return Ok(());
        };

        let resolved = try_join_all(params.iter().map(|(key, value)| async move {
            almanac.get_value(value).await.map(|v| (key.clone(), v))
        }))
        .await?;

        self.event.params = Some(resolved.into_iter().collect::<Map<_, _>>());
        Ok(())
    }

    /// 结构化序列化
    pub fn to_serializable(&self) -> Value {
        json!({
            "conditions": self.conditions.to_serializable(),
            "event": self.event,
            "priority": self.priority,
            "name": self.name,
            "result": self.result,
        })
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> String {
        self.to_serializable().to_string()
    }
}

impl Serialize for RuleResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_serializable().serialize(serializer)
    }
}
