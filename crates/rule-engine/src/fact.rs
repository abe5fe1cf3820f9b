//! 事实定义
//!
//! 事实是规则条件的取值来源：常量，或按参数计算的无副作用函数。
//! 缓存键由事实 ID 与参数确定性地哈希得到，供 [`Almanac`](crate::almanac::Almanac) 做记忆化。

use crate::almanac::FactProvider;
use crate::error::{Result, RuleError};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// 动态事实计算返回的 future
pub type FactFuture<'a> = BoxFuture<'a, Result<Value>>;

/// 动态事实的计算函数
pub type CalculationFn =
    dyn for<'a> Fn(&'a Value, &'a dyn FactProvider) -> FactFuture<'a> + Send + Sync;

/// 缓存键属性生成函数，输入事实 ID 与参数
pub type CacheKeyFn = dyn Fn(&str, &Value) -> Value + Send + Sync;

/// 事实类型
#[derive(Clone)]
pub enum FactKind {
    Constant(Value),
    Dynamic(Arc<CalculationFn>),
}

/// 事实选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactOptions {
    /// 是否缓存计算结果
    pub cache: bool,
    /// 优先级，高优先级事实对应的条件先求值
    pub priority: i64,
}

impl Default for FactOptions {
    fn default() -> Self {
        Self {
            cache: true,
            priority: 1,
        }
    }
}

/// 事实
#[derive(Clone)]
pub struct Fact {
    id: String,
    kind: FactKind,
    options: FactOptions,
    cache_key_method: Arc<CacheKeyFn>,
}

impl Fact {
    /// 创建常量事实
    pub fn constant(id: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        Self::build(id.into(), FactKind::Constant(value.into()))
    }

    /// 创建动态事实
    ///
    /// ```ignore
    /// let fact = Fact::dynamic("account", |params, almanac| {
    ///     Box::pin(async move {
    ///         let id = almanac.fact_value("accountId", params, None).await?;
    ///         Ok(json!({ "id": id }))
    ///     })
    /// })?;
    /// ```
    pub fn dynamic<F>(id: impl Into<String>, calculation: F) -> Result<Self>
    where
        F: for<'a> Fn(&'a Value, &'a dyn FactProvider) -> FactFuture<'a> + Send + Sync + 'static,
    {
        Self::build(id.into(), FactKind::Dynamic(Arc::new(calculation)))
    }

    fn build(id: String, kind: FactKind) -> Result<Self> {
        if id.is_empty() {
            return Err(RuleError::MissingFactId);
        }
        Ok(Self {
            id,
            kind,
            options: FactOptions::default(),
            cache_key_method: Arc::new(Self::default_cache_keys),
        })
    }

    pub fn with_options(mut self, options: FactOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.options.priority = priority;
        self
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.options.cache = cache;
        self
    }

    /// 替换缓存键属性的生成方式，例如只按部分参数缓存
    pub fn with_cache_key_method<F>(mut self, method: F) -> Self
    where
        F: Fn(&str, &Value) -> Value + Send + Sync + 'static,
    {
        self.cache_key_method = Arc::new(method);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &FactKind {
        &self.kind
    }

    pub fn options(&self) -> &FactOptions {
        &self.options
    }

    pub fn priority(&self) -> i64 {
        self.options.priority
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, FactKind::Constant(_))
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.kind, FactKind::Dynamic(_))
    }

    /// 计算事实值，常量事实直接返回其值
    pub async fn calculate(&self, params: &Value, almanac: &dyn FactProvider) -> Result<Value> {
        match &self.kind {
            FactKind::Constant(value) => Ok(value.clone()),
            FactKind::Dynamic(calculation) => calculation(params, almanac).await,
        }
    }

    /// 默认缓存键属性：事实 ID 与完整参数
    pub fn default_cache_keys(id: &str, params: &Value) -> Value {
        json!({ "id": id, "params": params })
    }

    /// 对任意 JSON 对象计算 SHA-256 十六进制摘要
    ///
    /// serde_json 的对象按键排序输出，结构相等的对象得到相同摘要。
    pub fn hash_from_object(obj: &Value) -> String {
        format!("{:x}", Sha256::digest(obj.to_string().as_bytes()))
    }

    /// 生成缓存键，禁用缓存时返回 None
    pub fn cache_key(&self, params: &Value) -> Option<String> {
        if !self.options.cache {
            return None;
        }
        let properties = (self.cache_key_method)(&self.id, params);
        Some(Self::hash_from_object(&properties))
    }
}

impl fmt::Debug for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            FactKind::Constant(value) => format!("Constant({})", value),
            FactKind::Dynamic(_) => "Dynamic".to_string(),
        };
        f.debug_struct("Fact")
            .field("id", &self.id)
            .field("kind", &kind)
            .field("options", &self.options)
            .finish()
    }
}
