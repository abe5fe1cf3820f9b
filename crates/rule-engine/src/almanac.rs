//! 事实取值
//!
//! [`FactProvider`] 是条件求值与事件参数解析所依赖的取值接口；
//! [`Almanac`] 是它的内存实现，负责事实注册、按缓存键记忆化以及路径投影。

use crate::error::{Result, RuleError};
use crate::fact::Fact;
use async_trait::async_trait;
use dashmap::DashMap;
use rules_shared::EngineConfig;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// 事实取值接口
#[async_trait]
pub trait FactProvider: Send + Sync {
    /// 按参数获取事实值，`path` 非空时返回结构化结果中的对应位置
    async fn fact_value(&self, fact_id: &str, params: &Value, path: Option<&str>)
    -> Result<Value>;

    /// 解析比较值：`{"fact": ..., "params"?, "path"?}` 形式的事实引用会被替换为事实值，
    /// 其余字面量原样返回
    async fn get_value(&self, value: &Value) -> Result<Value> {
        match fact_reference(value) {
            Some((fact_id, params, path)) => self.fact_value(fact_id, params, path).await,
            None => Ok(value.clone()),
        }
    }

    /// 事实自身的优先级，条件未声明优先级时使用
    fn fact_priority(&self, _fact_id: &str) -> Option<i64> {
        None
    }
}

/// 拆解事实引用对象
pub fn fact_reference(value: &Value) -> Option<(&str, &Value, Option<&str>)> {
    let map = value.as_object()?;
    let fact_id = map.get("fact")?.as_str()?;
    let params = map.get("params").unwrap_or(&Value::Null);
    let path = map.get("path").and_then(Value::as_str);
    Some((fact_id, params, path))
}

/// 按路径取值
///
/// 同时支持 `$.user.tags[0]` 与 `user.tags.0` 两种写法，`$` 表示整个值。
pub fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix('$').unwrap_or(path);
    let mut current = value;

    for part in path
        .split(['.', '[', ']'])
        .filter(|part| !part.is_empty())
    {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            Value::Array(arr) => {
                let index: usize = part.parse().ok()?;
                current = arr.get(index)?;
            }
            _ => return None,
        }
    }

    Some(current)
}

/// Almanac 行为选项
#[derive(Debug, Clone)]
pub struct AlmanacOptions {
    /// 未定义的事实返回 null 而不是报错
    pub allow_undefined_facts: bool,
    /// 是否启用事实值缓存
    pub fact_cache: bool,
}

impl Default for AlmanacOptions {
    fn default() -> Self {
        Self {
            allow_undefined_facts: false,
            fact_cache: true,
        }
    }
}

impl From<&EngineConfig> for AlmanacOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            allow_undefined_facts: config.allow_undefined_facts,
            fact_cache: config.fact_cache,
        }
    }
}

/// 内存事实仓库
#[derive(Debug, Default)]
pub struct Almanac {
    facts: DashMap<String, Arc<Fact>>,
    /// 每个缓存键一个单次初始化单元，并发请求共享同一次计算
    cache: DashMap<String, Arc<OnceCell<Value>>>,
    options: AlmanacOptions,
}

impl Almanac {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: AlmanacOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &AlmanacOptions {
        &self.options
    }

    /// 注册事实，同名事实会被替换，已缓存的值一并失效
    pub fn add_fact(&self, fact: Fact) {
        let id = fact.id().to_string();
        if self.facts.insert(id.clone(), Arc::new(fact)).is_some() {
            self.cache.clear();
        }
        debug!(fact = %id, "fact registered");
    }

    /// 注册运行时常量事实
    pub fn add_runtime_fact(&self, id: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.add_fact(Fact::constant(id, value)?);
        Ok(())
    }

    /// 删除事实
    pub fn remove_fact(&self, id: &str) -> bool {
        let removed = self.facts.remove(id).is_some();
        if removed {
            self.cache.clear();
            info!("事实已删除: {}", id);
        }
        removed
    }

    pub fn has_fact(&self, id: &str) -> bool {
        self.facts.contains_key(id)
    }

    pub fn get_fact(&self, id: &str) -> Option<Arc<Fact>> {
        self.facts.get(id).map(|f| Arc::clone(f.value()))
    }

    /// 已缓存的事实值数量
    pub fn cached_len(&self) -> usize {
        self.cache
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn compute(&self, fact: &Fact, params: &Value) -> Result<Value> {
        let cache_key = if self.options.fact_cache {
            fact.cache_key(params)
        } else {
            None
        };

        let Some(key) = cache_key else {
            return self.calculate(fact, params).await;
        };

        let cell = Arc::clone(self.cache.entry(key).or_default().value());
        if let Some(value) = cell.get() {
            debug!(fact = fact.id(), "fact cache hit");
            return Ok(value.clone());
        }

        // 计算失败时单元保持未初始化，下一次请求会重新计算
        cell.get_or_try_init(|| self.calculate(fact, params))
            .await
            .cloned()
    }

    async fn calculate(&self, fact: &Fact, params: &Value) -> Result<Value> {
        let value = fact.calculate(params, self).await?;
        debug!(fact = fact.id(), value = %value, "fact calculated");
        Ok(value)
    }
}

#[async_trait]
impl FactProvider for Almanac {
    async fn fact_value(
        &self,
        fact_id: &str,
        params: &Value,
        path: Option<&str>,
    ) -> Result<Value> {
        let Some(fact) = self.get_fact(fact_id) else {
            if self.options.allow_undefined_facts {
                debug!(fact = fact_id, "undefined fact resolved to null");
                return Ok(Value::Null);
            }
            return Err(RuleError::UndefinedFact(fact_id.to_string()));
        };

        let value = self.compute(&fact, params).await?;

        match path {
            Some(path) => {
                let projected = resolve_path(&value, path).cloned().unwrap_or(Value::Null);
                debug!(fact = fact_id, path, value = %projected, "fact path resolved");
                Ok(projected)
            }
            None => Ok(value),
        }
    }

    fn fact_priority(&self, fact_id: &str) -> Option<i64> {
        self.facts.get(fact_id).map(|f| f.priority())
    }
}
