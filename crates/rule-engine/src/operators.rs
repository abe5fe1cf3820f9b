//! 规则操作符定义
//!
//! 操作符是带名称的二元谓词 `(事实值, 比较值) -> bool`，可附带事实值类型守卫。
//! 装饰器把已有操作符包装成新的操作符，名称形如 `"<装饰器>:<操作符>"`。

use crate::error::{Result, RuleError};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// 操作符回调
pub type OperatorFn = dyn Fn(&Value, &Value) -> bool + Send + Sync;

/// 事实值类型守卫
pub type FactValueGuard = dyn Fn(&Value) -> bool + Send + Sync;

/// 装饰器回调，第三个参数是被包装操作符的 `evaluate`
pub type DecoratorFn = dyn Fn(&Value, &Value, &dyn Fn(&Value, &Value) -> bool) -> bool + Send + Sync;

/// 条件操作符
#[derive(Clone)]
pub struct Operator {
    name: String,
    callback: Arc<OperatorFn>,
    guard: Option<Arc<FactValueGuard>>,
}

impl Operator {
    /// 创建操作符，名称不能为空
    pub fn new<F>(name: impl Into<String>, callback: F) -> Result<Self>
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(RuleError::MissingOperatorName);
        }
        Ok(Self::from_parts(name, Arc::new(callback), None))
    }

    /// 创建带事实值守卫的操作符
    ///
    /// 守卫返回 false 时，操作符直接判定为不成立，回调不会被调用。
    pub fn with_guard<F, G>(name: impl Into<String>, callback: F, guard: G) -> Result<Self>
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
        G: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(RuleError::MissingOperatorName);
        }
        Ok(Self::from_parts(name, Arc::new(callback), Some(Arc::new(guard))))
    }

    pub(crate) fn from_parts(
        name: String,
        callback: Arc<OperatorFn>,
        guard: Option<Arc<FactValueGuard>>,
    ) -> Self {
        Self {
            name,
            callback,
            guard,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 事实值是否通过类型守卫
    pub fn accepts(&self, fact_value: &Value) -> bool {
        self.guard.as_ref().is_none_or(|guard| guard(fact_value))
    }

    /// 评估 `guard(fact_value) && callback(fact_value, value)`
    pub fn evaluate(&self, fact_value: &Value, value: &Value) -> bool {
        self.accepts(fact_value) && (self.callback)(fact_value, value)
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("name", &self.name)
            .field("guarded", &self.guard.is_some())
            .finish()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// 操作符装饰器
#[derive(Clone)]
pub struct OperatorDecorator {
    name: String,
    callback: Arc<DecoratorFn>,
    guard: Option<Arc<FactValueGuard>>,
}

impl OperatorDecorator {
    pub fn new<F>(name: impl Into<String>, callback: F) -> Result<Self>
    where
        F: Fn(&Value, &Value, &dyn Fn(&Value, &Value) -> bool) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(RuleError::MissingDecoratorName);
        }
        Ok(Self::from_parts(name, Arc::new(callback), None))
    }

    /// 创建带事实值守卫的装饰器，守卫作用于装饰后的操作符
    pub fn with_guard<F, G>(name: impl Into<String>, callback: F, guard: G) -> Result<Self>
    where
        F: Fn(&Value, &Value, &dyn Fn(&Value, &Value) -> bool) -> bool + Send + Sync + 'static,
        G: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(RuleError::MissingDecoratorName);
        }
        Ok(Self::from_parts(name, Arc::new(callback), Some(Arc::new(guard))))
    }

    pub(crate) fn from_parts(
        name: String,
        callback: Arc<DecoratorFn>,
        guard: Option<Arc<FactValueGuard>>,
    ) -> Self {
        Self {
            name,
            callback,
            guard,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 包装操作符，生成名为 `"<装饰器>:<操作符>"` 的新操作符
    ///
    /// 被包装操作符自身的守卫仍通过 `next` 生效。
    pub fn decorate(&self, operator: &Operator) -> Operator {
        let inner = operator.clone();
        let decorator = Arc::clone(&self.callback);
        let callback: Arc<OperatorFn> = Arc::new(move |fact_value: &Value, value: &Value| {
            let next = |fact_value: &Value, value: &Value| inner.evaluate(fact_value, value);
            decorator(fact_value, value, &next)
        });

        Operator::from_parts(
            format!("{}:{}", self.name, operator.name()),
            callback,
            self.guard.clone(),
        )
    }
}

impl fmt::Debug for OperatorDecorator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorDecorator")
            .field("name", &self.name)
            .field("guarded", &self.guard.is_some())
            .finish()
    }
}
