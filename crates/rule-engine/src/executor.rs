//! 规则执行器
//!
//! 在规则条件树的副本上求值：组合节点按优先级分批执行并短路，叶子节点委托
//! [`LeafCondition::evaluate`] 完成，结果记录在副本上并由 [`RuleResult`] 持有。

use crate::almanac::FactProvider;
use crate::condition::{BooleanCondition, BooleanOperator, Condition, LeafCondition};
use crate::error::{Result, RuleError};
use crate::models::Rule;
use crate::operator_map::OperatorMap;
use crate::rule_result::RuleResult;
use crate::store::ConditionStore;
use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use rules_shared::EngineConfig;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// 执行选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// 引用未注册的命名条件时按 false 处理，而不是报错
    pub allow_undefined_conditions: bool,
    /// 执行完成后把事件参数中的事实引用替换为事实值
    pub replace_facts_in_event_params: bool,
}

impl From<&EngineConfig> for ExecutorOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            allow_undefined_conditions: config.allow_undefined_conditions,
            replace_facts_in_event_params: config.replace_facts_in_event_params,
        }
    }
}

/// 规则执行器
#[derive(Debug, Clone)]
pub struct RuleExecutor {
    operators: Arc<OperatorMap>,
    conditions: Arc<ConditionStore>,
    options: ExecutorOptions,
}

impl RuleExecutor {
    pub fn new(operators: Arc<OperatorMap>) -> Self {
        Self {
            operators,
            conditions: Arc::new(ConditionStore::new()),
            options: ExecutorOptions::default(),
        }
    }

    /// 使用默认操作符集合创建执行器
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(OperatorMap::with_defaults()))
    }

    pub fn with_condition_store(mut self, conditions: Arc<ConditionStore>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn operators(&self) -> &OperatorMap {
        &self.operators
    }

    pub fn conditions(&self) -> &ConditionStore {
        &self.conditions
    }

    pub fn options(&self) -> ExecutorOptions {
        self.options
    }

    /// 执行单条规则
    #[instrument(skip(self, rule, almanac), fields(rule = rule.name.as_deref().unwrap_or("<anonymous>")))]
    pub async fn execute(&self, rule: &Rule, almanac: &dyn FactProvider) -> Result<RuleResult> {
        let mut result = RuleResult::new(
            &rule.conditions,
            &rule.event,
            rule.priority,
            rule.name.as_deref(),
        );

        let outcome = self
            .evaluate_node(result.conditions_mut(), almanac, &[])
            .await?;
        result.set_result(outcome)?;

        if self.options.replace_facts_in_event_params {
            result.resolve_event_params(almanac).await?;
        }

        info!(
            event = %rule.event.event_type,
            result = outcome,
            "规则执行完成"
        );
        Ok(result)
    }

    /// 按规则优先级从高到低依次执行
    #[instrument(skip(self, rules, almanac), fields(count = rules.len()))]
    pub async fn execute_all(&self, rules: &[Rule], almanac: &dyn FactProvider) -> Result<Vec<RuleResult>> {
        let mut ordered: Vec<&Rule> = rules.iter().collect();
        ordered.sort_by_key(|rule| Reverse(rule.priority));

        let mut results = Vec::with_capacity(ordered.len());
        for rule in ordered {
            results.push(self.execute(rule, almanac).await?);
        }
        Ok(results)
    }

    fn evaluate_node<'a>(
        &'a self,
        node: &'a mut Condition,
        almanac: &'a dyn FactProvider,
        chain: &'a [String],
    ) -> BoxFuture<'a, Result<bool>> {
        async move {
            let reference = match node {
                Condition::All(group) => {
                    return self
                        .evaluate_group(group, BooleanOperator::All, almanac, chain)
                        .await;
                }
                Condition::Any(group) => {
                    return self
                        .evaluate_group(group, BooleanOperator::Any, almanac, chain)
                        .await;
                }
                Condition::Not(not) => {
                    let inner = self.evaluate_node(&mut not.condition, almanac, chain).await?;
                    return Ok(!inner);
                }
                Condition::Leaf(leaf) => return self.evaluate_leaf(leaf, almanac).await,
                Condition::Reference(reference) => reference.condition.clone(),
            };
            self.realize(node, reference, almanac, chain).await
        }
        .boxed()
    }

    async fn evaluate_leaf(&self, leaf: &mut LeafCondition, almanac: &dyn FactProvider) -> Result<bool> {
        let outcome = leaf.evaluate(almanac, &self.operators).await?;
        leaf.record(&outcome);
        Ok(outcome.result)
    }

    /// 同优先级的子条件并发求值，批次之间按优先级从高到低短路
    async fn evaluate_group(
        &self,
        group: &mut BooleanCondition,
        operator: BooleanOperator,
        almanac: &dyn FactProvider,
        chain: &[String],
    ) -> Result<bool> {
        let all = operator == BooleanOperator::All;
        if group.conditions.is_empty() {
            return Ok(all);
        }

        let mut children: Vec<(i64, &mut Condition)> = group
            .conditions
            .iter_mut()
            .map(|child| (Self::priority_of(child, almanac), child))
            .collect();
        children.sort_by_key(|(priority, _)| Reverse(*priority));

        for batch in children.chunk_by_mut(|a, b| a.0 == b.0) {
            let results = try_join_all(
                batch
                    .iter_mut()
                    .map(|(_, child)| self.evaluate_node(child, almanac, chain)),
            )
            .await?;

            if all && results.contains(&false) {
                debug!(operator = %operator, "short-circuit on false");
                return Ok(false);
            }
            if !all && results.contains(&true) {
                debug!(operator = %operator, "short-circuit on true");
                return Ok(true);
            }
        }
        Ok(all)
    }

    /// 将条件引用替换为命名条件的副本后求值
    async fn realize(
        &self,
        node: &mut Condition,
        name: String,
        almanac: &dyn FactProvider,
        chain: &[String],
    ) -> Result<bool> {
        if chain.contains(&name) {
            let mut cycle = chain.to_vec();
            cycle.push(name);
            return Err(RuleError::CircularConditionReference(cycle.join(" -> ")));
        }

        let Some(named) = self.conditions.get(&name) else {
            if !self.options.allow_undefined_conditions {
                return Err(RuleError::UndefinedCondition(name));
            }
            warn!("引用了未注册的命名条件, 按 false 处理: {}", name);
            if let Condition::Reference(reference) = node {
                reference.extra.insert("result".into(), false.into());
            }
            return Ok(false);
        };

        let mut realized = (*named).clone();
        realized.clear_results();
        if let Condition::Reference(reference) = node {
            realized.inherit_reference_metadata(reference);
        }
        *node = realized;

        let mut next = chain.to_vec();
        next.push(name);
        self.evaluate_node(node, almanac, &next).await
    }

    fn priority_of(condition: &Condition, almanac: &dyn FactProvider) -> i64 {
        match condition {
            Condition::Leaf(leaf) => leaf
                .priority
                .or_else(|| almanac.fact_priority(&leaf.fact))
                .unwrap_or(1),
            other => other.priority().unwrap_or(1),
        }
    }
}
