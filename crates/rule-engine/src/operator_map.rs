//! 操作符注册表
//!
//! 使用 DashMap 保存操作符与装饰器。`"everyFact:someValue:greaterThan"` 这类组合名称
//! 在首次查询时按冒号拆分、逐层装饰，并把每一层结果写回注册表，后续查询直接命中。

use crate::defaults::{default_decorators, default_operators};
use crate::error::{Result, RuleError};
use crate::operators::{Operator, OperatorDecorator};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// 操作符注册表
#[derive(Debug, Default)]
pub struct OperatorMap {
    operators: DashMap<String, Arc<Operator>>,
    decorators: DashMap<String, Arc<OperatorDecorator>>,
}

impl OperatorMap {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建预置默认操作符与装饰器的注册表
    pub fn with_defaults() -> Self {
        let map = Self::new();
        for operator in default_operators() {
            map.operators
                .insert(operator.name().to_string(), Arc::new(operator));
        }
        for decorator in default_decorators() {
            map.decorators
                .insert(decorator.name().to_string(), Arc::new(decorator));
        }
        map
    }

    /// 注册操作符，同名操作符及其派生的组合操作符会被替换
    pub fn add_operator(&self, operator: Operator) {
        let name = operator.name().to_string();
        self.purge_derived_from_operator(&name);
        self.operators.insert(name.clone(), Arc::new(operator));
        info!("操作符已注册: {}", name);
    }

    /// 以名称和回调注册操作符
    pub fn add_operator_fn<F>(&self, name: impl Into<String>, callback: F) -> Result<()>
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.add_operator(Operator::new(name, callback)?);
        Ok(())
    }

    /// 删除操作符，同时删除所有由它派生的组合操作符
    pub fn remove_operator(&self, name: &str) -> bool {
        let removed = self.operators.remove(name).is_some();
        self.purge_derived_from_operator(name);
        if removed {
            info!("操作符已删除: {}", name);
        }
        removed
    }

    /// 注册装饰器，使用同名旧装饰器生成的组合操作符会被清除
    pub fn add_decorator(&self, decorator: OperatorDecorator) {
        let name = decorator.name().to_string();
        self.purge_derived_from_decorator(&name);
        self.decorators.insert(name.clone(), Arc::new(decorator));
        info!("装饰器已注册: {}", name);
    }

    /// 以名称和回调注册装饰器
    pub fn add_decorator_fn<F>(&self, name: impl Into<String>, callback: F) -> Result<()>
    where
        F: Fn(&Value, &Value, &dyn Fn(&Value, &Value) -> bool) -> bool + Send + Sync + 'static,
    {
        self.add_decorator(OperatorDecorator::new(name, callback)?);
        Ok(())
    }

    /// 删除装饰器，同时删除所有使用它生成的组合操作符
    pub fn remove_decorator(&self, name: &str) -> bool {
        let removed = self.decorators.remove(name).is_some();
        self.purge_derived_from_decorator(name);
        if removed {
            info!("装饰器已删除: {}", name);
        }
        removed
    }

    /// 查询操作符，无法解析时返回 None
    pub fn get(&self, name: &str) -> Option<Arc<Operator>> {
        self.resolve(name).ok()
    }

    /// 解析操作符名称
    ///
    /// 先精确匹配；未命中时从左到右剥离 `装饰器:` 前缀，直到剩余部分是已注册的操作符。
    /// 之后由内向外依次套用装饰器，每一层的结果都以组合名称写回注册表。
    pub fn resolve(&self, name: &str) -> Result<Arc<Operator>> {
        if let Some(operator) = self.operators.get(name) {
            return Ok(Arc::clone(operator.value()));
        }

        let mut pending = Vec::new();
        let mut remaining = name;
        let base = loop {
            let Some((decorator_name, rest)) = remaining.split_once(':') else {
                debug!(operator = name, "unknown operator");
                return Err(RuleError::UnknownOperator(name.to_string()));
            };

            let decorator = self
                .decorators
                .get(decorator_name)
                .map(|d| Arc::clone(d.value()))
                .ok_or_else(|| {
                    debug!(operator = name, decorator = decorator_name, "unknown decorator");
                    RuleError::UnknownDecorator {
                        decorator: decorator_name.to_string(),
                        name: name.to_string(),
                    }
                })?;
            pending.push(decorator);
            remaining = rest;

            if let Some(operator) = self.operators.get(remaining) {
                break Arc::clone(operator.value());
            }
        };

        // pending 按名称从左到右排列，最左侧是最外层装饰器
        let operator = pending.iter().rev().fold(base, |inner, decorator| {
            let decorated = Arc::new(decorator.decorate(&inner));
            self.operators
                .insert(decorated.name().to_string(), Arc::clone(&decorated));
            decorated
        });
        debug!(operator = operator.name(), "decorated operator memoized");
        Ok(operator)
    }

    /// 是否已注册（或已缓存）该名称的操作符
    pub fn has_operator(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorators.contains_key(name)
    }

    /// 当前操作符数量，包含已缓存的组合操作符
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    fn purge_derived_from_operator(&self, name: &str) {
        let suffix = format!(":{}", name);
        self.operators.retain(|key, _| !key.ends_with(&suffix));
    }

    fn purge_derived_from_decorator(&self, name: &str) {
        // 组合名称中除最后一段外的每一段都是装饰器
        self.operators.retain(|key, _| {
            let mut segments = key.rsplit(':').skip(1);
            !segments.any(|segment| segment == name)
        });
    }
}
