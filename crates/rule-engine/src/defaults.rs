//! 默认操作符与装饰器
//!
//! `OperatorMap::with_defaults` 使用这里的定义预先填充注册表。

use crate::operators::{FactValueGuard, Operator, OperatorDecorator};
use serde_json::Value;
use std::sync::Arc;

/// 默认操作符集合
pub fn default_operators() -> Vec<Operator> {
    vec![
        operator("equal", strict_equal, None),
        operator("notEqual", |a, b| !strict_equal(a, b), None),
        operator("in", |a, b| includes(b, a), None),
        operator("notIn", |a, b| excludes(b, a), None),
        operator("contains", includes, Some(Value::is_array)),
        operator("doesNotContain", excludes, Some(Value::is_array)),
        operator("lessThan", |a, b| compare(a, b, |x, y| x < y), Some(is_numeric)),
        operator("lessThanInclusive", |a, b| compare(a, b, |x, y| x <= y), Some(is_numeric)),
        operator("greaterThan", |a, b| compare(a, b, |x, y| x > y), Some(is_numeric)),
        operator("greaterThanInclusive", |a, b| compare(a, b, |x, y| x >= y), Some(is_numeric)),
    ]
}

/// 默认装饰器集合
pub fn default_decorators() -> Vec<OperatorDecorator> {
    vec![
        decorator(
            "someFact",
            |fact, value, next| each(fact).is_some_and(|mut items| items.any(|item| next(item, value))),
            Some(Value::is_array),
        ),
        decorator(
            "someValue",
            |fact, value, next| each(value).is_some_and(|mut items| items.any(|item| next(fact, item))),
            None,
        ),
        decorator(
            "everyFact",
            |fact, value, next| each(fact).is_some_and(|mut items| items.all(|item| next(item, value))),
            Some(Value::is_array),
        ),
        decorator(
            "everyValue",
            |fact, value, next| each(value).is_some_and(|mut items| items.all(|item| next(fact, item))),
            None,
        ),
        decorator("swap", |fact, value, next| next(value, fact), None),
        decorator("not", |fact, value, next| !next(fact, value), None),
    ]
}

fn operator(
    name: &str,
    callback: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    guard: Option<fn(&Value) -> bool>,
) -> Operator {
    Operator::from_parts(
        name.to_string(),
        Arc::new(callback),
        guard.map(|g| Arc::new(g) as Arc<FactValueGuard>),
    )
}

fn decorator(
    name: &str,
    callback: impl Fn(&Value, &Value, &dyn Fn(&Value, &Value) -> bool) -> bool + Send + Sync + 'static,
    guard: Option<fn(&Value) -> bool>,
) -> OperatorDecorator {
    OperatorDecorator::from_parts(
        name.to_string(),
        Arc::new(callback),
        guard.map(|g| Arc::new(g) as Arc<FactValueGuard>),
    )
}

fn each(value: &Value) -> Option<std::slice::Iter<'_, Value>> {
    value.as_array().map(|items| items.iter())
}

/// 严格相等：数值按浮点比较（`5 == 5.0`），其余类型必须同类型且相等（`5 != "5"`）
pub fn strict_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// 数组包含元素，或字符串包含子串
fn includes(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| strict_equal(item, needle)),
        Value::String(s) => needle.as_str().is_some_and(|n| s.contains(n)),
        _ => false,
    }
}

/// 可检索的集合中不含该元素；集合本身不可检索时不成立
fn excludes(haystack: &Value, needle: &Value) -> bool {
    matches!(haystack, Value::Array(_) | Value::String(_)) && !includes(haystack, needle)
}

/// 事实值是否为数字或可解析为数字的字符串
pub fn is_numeric(value: &Value) -> bool {
    as_f64(value).is_some()
}

fn compare<F>(a: &Value, b: &Value, cmp: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => cmp(x, y),
        _ => false,
    }
}

/// 尝试将 Value 转换为 f64
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        // 整个字符串必须是有限数字："3px"、"inf"、"NaN" 都不算数字
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}
