//! 命名条件存储
//!
//! 多条规则共享的条件以名称注册，规则中通过 `{"condition": "<name>"}` 引用。

use crate::condition::Condition;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 命名条件存储（线程安全）
#[derive(Debug, Default)]
pub struct ConditionStore {
    conditions: DashMap<String, Arc<Condition>>,
}

impl ConditionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册命名条件，同名条件会被替换
    #[instrument(skip(self, condition))]
    pub fn set(&self, name: &str, condition: Condition) {
        if self
            .conditions
            .insert(name.to_string(), Arc::new(condition))
            .is_some()
        {
            info!("命名条件已替换: {}", name);
        } else {
            info!("命名条件已注册: {}", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Condition>> {
        self.conditions.get(name).map(|c| Arc::clone(c.value()))
    }

    #[instrument(skip(self))]
    pub fn remove(&self, name: &str) -> bool {
        if self.conditions.remove(name).is_some() {
            info!("命名条件已删除: {}", name);
            true
        } else {
            warn!("删除不存在的命名条件: {}", name);
            false
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.conditions.iter().map(|e| e.key().clone()).collect()
    }
}
