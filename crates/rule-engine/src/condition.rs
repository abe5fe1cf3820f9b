//! 条件树
//!
//! 条件是声明式布尔树中的节点：`all` / `any` / `not` 组合、命名条件引用，或叶子比较
//! `{fact, operator, value}`。JSON 定义在解析边界上被转换为 [`Condition`] 枚举，
//! 各变体的约束在这里一次性校验。
//!
//! 只有叶子条件可以直接求值；组合节点由 [`RuleExecutor`](crate::executor::RuleExecutor) 负责。

use crate::almanac::FactProvider;
use crate::error::{Result, RuleError};
use crate::operator_map::OperatorMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// 逻辑操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BooleanOperator {
    All,
    Any,
    Not,
}

impl BooleanOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
            Self::Not => "not",
        }
    }
}

impl fmt::Display for BooleanOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 条件节点
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    All(BooleanCondition),
    Any(BooleanCondition),
    Not(NotCondition),
    Reference(ConditionReference),
    Leaf(LeafCondition),
}

/// `all` / `any` 组合
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanCondition {
    pub priority: i64,
    pub name: Option<String>,
    pub conditions: Vec<Condition>,
    /// 调用方附带的其他字段，序列化时原样输出
    pub extra: Map<String, Value>,
}

/// `not` 组合
#[derive(Debug, Clone, PartialEq)]
pub struct NotCondition {
    pub priority: i64,
    pub name: Option<String>,
    pub condition: Box<Condition>,
    pub extra: Map<String, Value>,
}

/// 命名条件引用
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionReference {
    pub condition: String,
    pub name: Option<String>,
    pub priority: Option<i64>,
    pub extra: Map<String, Value>,
}

/// 叶子比较条件
///
/// `fact_result` / `value_result` / `result` 是求值产物，不参与相等比较。
#[derive(Debug, Clone)]
pub struct LeafCondition {
    pub fact: String,
    pub operator: String,
    pub value: Value,
    pub params: Option<Value>,
    pub path: Option<String>,
    /// 未声明时由事实自身的优先级决定
    pub priority: Option<i64>,
    pub name: Option<String>,
    pub extra: Map<String, Value>,
    pub fact_result: Option<Value>,
    pub value_result: Option<Value>,
    pub result: Option<bool>,
}

/// 叶子条件的求值结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionOutcome {
    pub result: bool,
    pub left_hand_side_value: Value,
    pub right_hand_side_value: Value,
    pub operator: String,
}

impl Condition {
    /// 从 JSON 定义构造条件
    ///
    /// 按 any、all、not、condition 的顺序判定变体，都不存在时按叶子条件解析。
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(props) = value else {
            return Err(RuleError::InvalidCondition(type_name(value)));
        };

        if let Some(operator) = Self::boolean_operator_of(value) {
            return Self::parse_boolean(operator, props);
        }
        if props.contains_key("condition") {
            return Self::parse_reference(props).map(Condition::Reference);
        }
        Self::parse_leaf(props).map(Condition::Leaf)
    }

    /// 从 JSON 字符串构造条件
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// 判断 JSON 定义对应的逻辑操作符
    pub fn boolean_operator_of(value: &Value) -> Option<BooleanOperator> {
        let props = value.as_object()?;
        if props.contains_key("any") {
            Some(BooleanOperator::Any)
        } else if props.contains_key("all") {
            Some(BooleanOperator::All)
        } else if props.contains_key("not") {
            Some(BooleanOperator::Not)
        } else {
            None
        }
    }

    /// 节点的逻辑操作符，非组合节点返回 None
    pub fn boolean_operator(&self) -> Option<BooleanOperator> {
        match self {
            Self::All(_) => Some(BooleanOperator::All),
            Self::Any(_) => Some(BooleanOperator::Any),
            Self::Not(_) => Some(BooleanOperator::Not),
            Self::Reference(_) | Self::Leaf(_) => None,
        }
    }

    pub fn is_boolean(&self) -> bool {
        self.boolean_operator().is_some()
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }

    pub fn priority(&self) -> Option<i64> {
        match self {
            Self::All(c) | Self::Any(c) => Some(c.priority),
            Self::Not(c) => Some(c.priority),
            Self::Reference(c) => c.priority,
            Self::Leaf(c) => c.priority,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::All(c) | Self::Any(c) => c.name.as_deref(),
            Self::Not(c) => c.name.as_deref(),
            Self::Reference(c) => c.name.as_deref(),
            Self::Leaf(c) => c.name.as_deref(),
        }
    }

    /// 对叶子条件求值
    ///
    /// 组合节点与未解析的引用不能直接求值。
    pub async fn evaluate(
        &self,
        almanac: &dyn FactProvider,
        operator_map: &OperatorMap,
    ) -> Result<ConditionOutcome> {
        match self {
            Self::Leaf(leaf) => leaf.evaluate(almanac, operator_map).await,
            Self::Reference(reference) => Err(RuleError::UnresolvedConditionReference(
                reference.condition.clone(),
            )),
            Self::All(_) | Self::Any(_) | Self::Not(_) => {
                let operator = self.boolean_operator().map(|o| o.to_string()).unwrap_or_default();
                Err(RuleError::BooleanConditionNotEvaluable(operator))
            }
        }
    }

    /// 递归清除叶子节点上的求值结果
    pub fn clear_results(&mut self) {
        match self {
            Self::All(c) | Self::Any(c) => c.conditions.iter_mut().for_each(Self::clear_results),
            Self::Not(c) => c.condition.clear_results(),
            Self::Reference(_) => {}
            Self::Leaf(c) => c.clear_result(),
        }
    }

    /// 用条件引用上的名称、优先级和附加字段补全本节点，本节点已有的值优先
    pub fn inherit_reference_metadata(&mut self, reference: &ConditionReference) {
        let (name, extra) = match self {
            Self::All(c) | Self::Any(c) => (&mut c.name, &mut c.extra),
            Self::Not(c) => (&mut c.name, &mut c.extra),
            Self::Reference(c) => {
                c.priority = c.priority.or(reference.priority);
                (&mut c.name, &mut c.extra)
            }
            Self::Leaf(c) => {
                c.priority = c.priority.or(reference.priority);
                (&mut c.name, &mut c.extra)
            }
        };

        if name.is_none() {
            name.clone_from(&reference.name);
        }
        for (key, value) in &reference.extra {
            extra.entry(key.as_str()).or_insert_with(|| value.clone());
        }
    }

    /// 结构化序列化
    pub fn to_serializable(&self) -> Value {
        match self {
            Self::All(c) => c.to_serializable(BooleanOperator::All),
            Self::Any(c) => c.to_serializable(BooleanOperator::Any),
            Self::Not(c) => c.to_serializable(),
            Self::Reference(c) => c.to_serializable(),
            Self::Leaf(c) => c.to_serializable(),
        }
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> String {
        self.to_serializable().to_string()
    }

    fn parse_boolean(operator: BooleanOperator, props: &Map<String, Value>) -> Result<Self> {
        let key = operator.as_str();
        let payload = &props[key];
        let priority = parse_priority(props.get("priority"))?
            .filter(|p| *p != 0)
            .unwrap_or(1);
        let name = parse_optional_string(props, "name")?;
        let extra = extra_fields(props, &[key, "priority", "name"]);

        match operator {
            BooleanOperator::All | BooleanOperator::Any => {
                let Value::Array(items) = payload else {
                    return Err(RuleError::NotAnArray(key));
                };
                let group = BooleanCondition {
                    priority,
                    name,
                    conditions: items
                        .iter()
                        .map(Self::from_value)
                        .collect::<Result<Vec<_>>>()?,
                    extra,
                };
                Ok(if operator == BooleanOperator::All {
                    Self::All(group)
                } else {
                    Self::Any(group)
                })
            }
            BooleanOperator::Not => {
                if payload.is_array() {
                    return Err(RuleError::UnexpectedArray(key));
                }
                Ok(Self::Not(NotCondition {
                    priority,
                    name,
                    condition: Box::new(Self::from_value(payload)?),
                    extra,
                }))
            }
        }
    }

    fn parse_reference(props: &Map<String, Value>) -> Result<ConditionReference> {
        let condition = props["condition"]
            .as_str()
            .ok_or_else(|| RuleError::InvalidField {
                field: "condition",
                message: "必须是字符串".to_string(),
            })?
            .to_string();

        Ok(ConditionReference {
            condition,
            name: parse_optional_string(props, "name")?,
            priority: parse_priority(props.get("priority"))?,
            extra: extra_fields(props, &["condition", "name", "priority"]),
        })
    }

    fn parse_leaf(props: &Map<String, Value>) -> Result<LeafCondition> {
        let fact = required_string(props, "fact")?;
        let operator = required_string(props, "operator")?;
        let value = props
            .get("value")
            .cloned()
            .ok_or(RuleError::MissingField("value"))?;

        let params = props.get("params").filter(|p| !p.is_null()).cloned();

        Ok(LeafCondition {
            fact,
            operator,
            value,
            params,
            path: parse_optional_string(props, "path")?,
            priority: parse_priority(props.get("priority"))?,
            name: parse_optional_string(props, "name")?,
            extra: extra_fields(props, LeafCondition::DECLARED_FIELDS),
            fact_result: None,
            value_result: None,
            result: None,
        })
    }
}

impl TryFrom<Value> for Condition {
    type Error = RuleError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(&value)
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_serializable().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

impl BooleanCondition {
    fn to_serializable(&self, operator: BooleanOperator) -> Value {
        let mut props = self.extra.clone();
        props.insert("priority".into(), self.priority.into());
        insert_name(&mut props, &self.name);
        props.insert(
            operator.as_str().into(),
            Value::Array(self.conditions.iter().map(Condition::to_serializable).collect()),
        );
        Value::Object(props)
    }
}

impl NotCondition {
    fn to_serializable(&self) -> Value {
        let mut props = self.extra.clone();
        props.insert("priority".into(), self.priority.into());
        insert_name(&mut props, &self.name);
        props.insert("not".into(), self.condition.to_serializable());
        Value::Object(props)
    }
}

impl ConditionReference {
    fn to_serializable(&self) -> Value {
        let mut props = self.extra.clone();
        insert_name(&mut props, &self.name);
        if let Some(priority) = self.priority {
            props.insert("priority".into(), priority.into());
        }
        props.insert("condition".into(), self.condition.clone().into());
        Value::Object(props)
    }
}

impl LeafCondition {
    const DECLARED_FIELDS: &'static [&'static str] = &[
        "fact",
        "operator",
        "value",
        "params",
        "path",
        "priority",
        "name",
        "factResult",
        "valueResult",
        "result",
    ];

    pub fn new(fact: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            fact: fact.into(),
            operator: operator.into(),
            value: value.into(),
            params: None,
            path: None,
            priority: None,
            name: None,
            extra: Map::new(),
            fact_result: None,
            value_result: None,
            result: None,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// 解析操作符，并发获取事实值与比较值后求值
    pub async fn evaluate(
        &self,
        almanac: &dyn FactProvider,
        operator_map: &OperatorMap,
    ) -> Result<ConditionOutcome> {
        let operator = operator_map.resolve(&self.operator)?;
        let params = self.params.as_ref().unwrap_or(&Value::Null);

        let (right_hand_side_value, left_hand_side_value) = tokio::try_join!(
            almanac.get_value(&self.value),
            almanac.fact_value(&self.fact, params, self.path.as_deref()),
        )?;

        let result = operator.evaluate(&left_hand_side_value, &right_hand_side_value);
        debug!(
            fact = %self.fact,
            operator = %self.operator,
            lhs = %left_hand_side_value,
            rhs = %right_hand_side_value,
            result,
            "condition evaluated"
        );

        Ok(ConditionOutcome {
            result,
            left_hand_side_value,
            right_hand_side_value,
            operator: self.operator.clone(),
        })
    }

    /// 把求值结果记录到节点上
    pub fn record(&mut self, outcome: &ConditionOutcome) {
        self.fact_result = Some(outcome.left_hand_side_value.clone());
        self.value_result = Some(outcome.right_hand_side_value.clone());
        self.result = Some(outcome.result);
    }

    pub fn clear_result(&mut self) {
        self.fact_result = None;
        self.value_result = None;
        self.result = None;
    }

    fn to_serializable(&self) -> Value {
        let mut props = self.extra.clone();
        if let Some(priority) = self.priority {
            props.insert("priority".into(), priority.into());
        }
        insert_name(&mut props, &self.name);
        props.insert("operator".into(), self.operator.clone().into());
        props.insert("value".into(), self.value.clone());
        props.insert("fact".into(), self.fact.clone().into());
        if let Some(fact_result) = &self.fact_result {
            props.insert("factResult".into(), fact_result.clone());
        }
        if let Some(value_result) = &self.value_result {
            props.insert("valueResult".into(), value_result.clone());
        }
        if let Some(result) = self.result {
            props.insert("result".into(), result.into());
        }
        if let Some(params) = &self.params {
            props.insert("params".into(), params.clone());
        }
        if let Some(path) = &self.path {
            props.insert("path".into(), path.clone().into());
        }
        Value::Object(props)
    }
}

impl PartialEq for LeafCondition {
    fn eq(&self, other: &Self) -> bool {
        self.fact == other.fact
            && self.operator == other.operator
            && self.value == other.value
            && self.params == other.params
            && self.path == other.path
            && self.priority == other.priority
            && self.name == other.name
            && self.extra == other.extra
    }
}

impl From<LeafCondition> for Condition {
    fn from(leaf: LeafCondition) -> Self {
        Condition::Leaf(leaf)
    }
}

fn insert_name(props: &mut Map<String, Value>, name: &Option<String>) {
    if let Some(name) = name {
        props.insert("name".into(), name.clone().into());
    }
}

fn extra_fields(props: &Map<String, Value>, declared: &[&str]) -> Map<String, Value> {
    props
        .iter()
        .filter(|(key, _)| !declared.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn required_string(props: &Map<String, Value>, field: &'static str) -> Result<String> {
    match props.get(field) {
        None => Err(RuleError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(RuleError::InvalidField {
            field,
            message: format!("必须是字符串, 实际为 {}", type_name(other)),
        }),
    }
}

fn parse_optional_string(props: &Map<String, Value>, field: &'static str) -> Result<Option<String>> {
    match props.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(RuleError::InvalidField {
            field,
            message: format!("必须是字符串, 实际为 {}", type_name(other)),
        }),
    }
}

/// 解析优先级，接受整数、浮点数（截断）与数字字符串
fn parse_priority(value: Option<&Value>) -> Result<Option<i64>> {
    let invalid = |value: &Value| RuleError::InvalidField {
        field: "priority",
        message: format!("无法解析为整数: {}", value),
    };

    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(float_priority))
            .map(Some)
            .ok_or_else(|| invalid(&Value::Number(n.clone()))),
        Some(v @ Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_priority))
                .map(Some)
                .ok_or_else(|| invalid(v))
        }
        Some(other) => Err(invalid(other)),
    }
}

/// 截断为整数，超出 i64 范围或非有限值返回 None
fn float_priority(f: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    let t = f.trunc();
    (t.is_finite() && (-LIMIT..LIMIT).contains(&t)).then_some(t as i64)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::almanac::Almanac;
    use crate::fact::Fact;
    use serde_json::json;

    fn leaf_json() -> Value {
        json!({
            "fact": "age",
            "operator": "greaterThanInclusive",
            "value": 18
        })
    }

    fn nested_json() -> Value {
        json!({
            "all": [
                {"fact": "age", "operator": "greaterThanInclusive", "value": 18},
                {
                    "any": [
                        {"fact": "segment", "operator": "equal", "value": "vip", "priority": 2},
                        {"not": {"fact": "tags", "operator": "contains", "value": "blocked"}},
                        {"condition": "isActive"}
                    ],
                    "name": "eligibility"
                }
            ],
            "priority": 3
        })
    }

    #[test]
    fn test_construct_leaf() {
        let condition = Condition::from_value(&leaf_json()).unwrap();
        let Condition::Leaf(leaf) = &condition else {
            panic!("expected leaf condition");
        };
        assert_eq!(leaf.fact, "age");
        assert_eq!(leaf.operator, "greaterThanInclusive");
        assert_eq!(leaf.value, json!(18));
        assert_eq!(leaf.priority, None);
        assert_eq!(condition.boolean_operator(), None);
    }

    #[test]
    fn test_leaf_requires_fields() {
        for field in ["fact", "operator", "value"] {
            let mut props = leaf_json();
            props.as_object_mut().unwrap().remove(field);

            let err = Condition::from_value(&props).unwrap_err();
            assert!(matches!(err, RuleError::MissingField(f) if f == field));
            assert!(err.to_string().contains(&format!("\"{}\"", field)));
        }
    }

    #[test]
    fn test_null_value_is_accepted() {
        let condition = Condition::from_value(&json!({
            "fact": "nickname",
            "operator": "equal",
            "value": null
        }))
        .unwrap();
        assert!(matches!(condition, Condition::Leaf(ref l) if l.value.is_null()));
    }

    #[test]
    fn test_boolean_payload_validation() {
        let err = Condition::from_value(&json!({"all": {"fact": "a", "operator": "equal", "value": 1}}))
            .unwrap_err();
        assert!(err.to_string().contains("\"all\" must be an array"));

        let err = Condition::from_value(&json!({"any": "nope"})).unwrap_err();
        assert!(err.to_string().contains("\"any\" must be an array"));

        let err = Condition::from_value(&json!({"not": [leaf_json()]})).unwrap_err();
        assert!(err.to_string().contains("\"not\" cannot be an array"));

        let err = Condition::from_value(&json!([leaf_json()])).unwrap_err();
        assert!(matches!(err, RuleError::InvalidCondition("array")));
    }

    #[test]
    fn test_priorities() {
        let all = Condition::from_value(&json!({"all": []})).unwrap();
        assert_eq!(all.priority(), Some(1));

        let any = Condition::from_value(&json!({"any": [], "priority": "5"})).unwrap();
        assert_eq!(any.priority(), Some(5));

        let not = Condition::from_value(&json!({"not": leaf_json(), "priority": 0})).unwrap();
        assert_eq!(not.priority(), Some(1));

        let mut props = leaf_json();
        props["priority"] = json!("10");
        let leaf = Condition::from_value(&props).unwrap();
        assert_eq!(leaf.priority(), Some(10));

        props["priority"] = json!("high");
        let err = Condition::from_value(&props).unwrap_err();
        assert!(err.to_string().contains("priority"));

        props["priority"] = json!(2.9);
        assert_eq!(Condition::from_value(&props).unwrap().priority(), Some(2));

        for out_of_range in [json!(1e30), json!("-1e30"), json!(u64::MAX), json!("inf")] {
            props["priority"] = out_of_range;
            let err = Condition::from_value(&props).unwrap_err();
            assert!(matches!(err, RuleError::InvalidField { field: "priority", .. }));
        }
    }

    #[test]
    fn test_dispatch_order() {
        assert_eq!(
            Condition::boolean_operator_of(&json!({"all": [], "any": []})),
            Some(BooleanOperator::Any)
        );
        assert_eq!(
            Condition::boolean_operator_of(&json!({"not": {}, "all": []})),
            Some(BooleanOperator::All)
        );
        assert_eq!(Condition::boolean_operator_of(&leaf_json()), None);

        let reference = Condition::from_value(&json!({"condition": "isAdult", "name": "adult"})).unwrap();
        assert!(reference.is_reference());
        assert_eq!(reference.name(), Some("adult"));
        assert_eq!(reference.priority(), None);
    }

    #[test]
    fn test_serialization_shapes() {
        let condition = Condition::from_value(&nested_json()).unwrap();
        let serialized = condition.to_serializable();

        assert_eq!(serialized["priority"], json!(3));
        assert_eq!(serialized["all"][0]["fact"], json!("age"));
        assert!(serialized["all"][0].get("priority").is_none());
        assert!(serialized["all"][0].get("result").is_none());
        assert_eq!(serialized["all"][1]["name"], json!("eligibility"));
        assert_eq!(serialized["all"][1]["priority"], json!(1));
        assert_eq!(serialized["all"][1]["any"][0]["priority"], json!(2));
        assert_eq!(serialized["all"][1]["any"][1]["not"]["value"], json!("blocked"));
        assert_eq!(
            serialized["all"][1]["any"][2],
            json!({"condition": "isActive"})
        );

        let text = condition.to_json();
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, serialized);
    }

    #[test]
    fn test_round_trip() {
        let condition = Condition::from_value(&nested_json()).unwrap();
        let first = condition.to_serializable();
        let rebuilt = Condition::from_value(&first).unwrap();

        assert_eq!(rebuilt, condition);
        assert_eq!(rebuilt.to_serializable(), first);
    }

    #[test]
    fn test_extra_fields_survive_round_trip() {
        let props = json!({
            "fact": "age",
            "operator": "equal",
            "value": 1,
            "name": "exact-age",
            "description": "age check",
            "params": {"unit": "years"},
            "path": "$.value"
        });
        let condition = Condition::from_value(&props).unwrap();
        assert_eq!(condition.to_serializable(), props);
    }

    #[test]
    fn test_serde_integration() {
        let condition: Condition = serde_json::from_value(nested_json()).unwrap();
        assert_eq!(condition.boolean_operator(), Some(BooleanOperator::All));

        let value = serde_json::to_value(&condition).unwrap();
        assert_eq!(value, condition.to_serializable());

        let err = serde_json::from_value::<Condition>(json!({"all": 1})).unwrap_err();
        assert!(err.to_string().contains("must be an array"));
    }

    #[test]
    fn test_equality_ignores_results() {
        let mut a = Condition::from_value(&leaf_json()).unwrap();
        let b = a.clone();
        if let Condition::Leaf(leaf) = &mut a {
            leaf.record(&ConditionOutcome {
                result: true,
                left_hand_side_value: json!(21),
                right_hand_side_value: json!(18),
                operator: "greaterThanInclusive".into(),
            });
        }
        assert_eq!(a, b);

        let serialized = a.to_serializable();
        assert_eq!(serialized["factResult"], json!(21));
        assert_eq!(serialized["valueResult"], json!(18));
        assert_eq!(serialized["result"], json!(true));

        a.clear_results();
        assert!(a.to_serializable().get("result").is_none());
    }

    #[tokio::test]
    async fn test_evaluate_leaf() {
        let almanac = Almanac::new();
        almanac.add_runtime_fact("age", 21).unwrap();
        let operators = OperatorMap::with_defaults();

        let condition = Condition::from_value(&leaf_json()).unwrap();
        let outcome = condition.evaluate(&almanac, &operators).await.unwrap();

        assert_eq!(
            outcome,
            ConditionOutcome {
                result: true,
                left_hand_side_value: json!(21),
                right_hand_side_value: json!(18),
                operator: "greaterThanInclusive".to_string(),
            }
        );
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "result": true,
                "leftHandSideValue": 21,
                "rightHandSideValue": 18,
                "operator": "greaterThanInclusive"
            })
        );
        // 求值不修改节点本身
        assert!(condition.to_serializable().get("result").is_none());
    }

    #[tokio::test]
    async fn test_evaluate_with_fact_reference_value_and_path() {
        let almanac = Almanac::new();
        almanac
            .add_runtime_fact("account", json!({"balance": 250, "limits": {"daily": 200}}))
            .unwrap();
        let operators = OperatorMap::with_defaults();

        let condition = Condition::from_value(&json!({
            "fact": "account",
            "path": "$.balance",
            "operator": "greaterThan",
            "value": {"fact": "account", "path": "$.limits.daily"}
        }))
        .unwrap();

        let outcome = condition.evaluate(&almanac, &operators).await.unwrap();
        assert!(outcome.result);
        assert_eq!(outcome.left_hand_side_value, json!(250));
        assert_eq!(outcome.right_hand_side_value, json!(200));
    }

    #[tokio::test]
    async fn test_evaluate_with_params() {
        let almanac = Almanac::new();
        almanac.add_fact(
            Fact::dynamic("score", |params, _almanac| {
                let base = params.get("base").and_then(Value::as_i64).unwrap_or(0);
                Box::pin(async move { Ok(json!(base + 10)) })
            })
            .unwrap(),
        );
        let operators = OperatorMap::with_defaults();

        let leaf = LeafCondition::new("score", "equal", 15).with_params(json!({"base": 5}));
        let outcome = leaf.evaluate(&almanac, &operators).await.unwrap();
        assert!(outcome.result);
    }

    #[tokio::test]
    async fn test_evaluate_errors() {
        let almanac = Almanac::new();
        almanac.add_runtime_fact("age", 21).unwrap();
        let operators = OperatorMap::with_defaults();

        let boolean = Condition::from_value(&nested_json()).unwrap();
        let err = boolean.evaluate(&almanac, &operators).await.unwrap_err();
        assert!(matches!(err, RuleError::BooleanConditionNotEvaluable(ref o) if o == "all"));

        let reference = Condition::from_value(&json!({"condition": "isAdult"})).unwrap();
        let err = reference.evaluate(&almanac, &operators).await.unwrap_err();
        assert!(err.to_string().contains("isAdult"));

        let unknown = Condition::from(LeafCondition::new("age", "bogus", 1));
        let err = unknown.evaluate(&almanac, &operators).await.unwrap_err();
        assert!(matches!(err, RuleError::UnknownOperator(ref o) if o == "bogus"));

        let undefined = Condition::from(LeafCondition::new("height", "equal", 1));
        let err = undefined.evaluate(&almanac, &operators).await.unwrap_err();
        assert!(err.is_undefined_fact());
    }

    #[tokio::test]
    async fn test_evaluate_decorated_operator() {
        let almanac = Almanac::new();
        almanac.add_runtime_fact("scores", json!([1, 2, 3])).unwrap();
        let operators = OperatorMap::with_defaults();

        let passing = LeafCondition::new("scores", "everyFact:greaterThan", 0);
        assert!(passing.evaluate(&almanac, &operators).await.unwrap().result);

        almanac.add_runtime_fact("scores", json!([0, 2, 3])).unwrap();
        assert!(!passing.evaluate(&almanac, &operators).await.unwrap().result);
    }
}
