//! JSON 规则引擎
//!
//! 提供声明式规则条件的求值能力：
//! - 可组合的操作符与装饰器（如 `everyFact:greaterThan`），按名称惰性构造并缓存
//! - 常量事实与按参数计算的动态事实，结果按确定性缓存键记忆化
//! - all / any / not 条件树，按优先级分批短路求值
//! - 规则结果的 JSON 序列化与事件参数解析

pub mod almanac;
pub mod condition;
pub mod defaults;
pub mod error;
pub mod executor;
pub mod fact;
pub mod models;
pub mod operator_map;
pub mod operators;
pub mod rule_result;
pub mod store;

pub use almanac::{Almanac, AlmanacOptions, FactProvider};
pub use condition::{
    BooleanCondition, BooleanOperator, Condition, ConditionOutcome, ConditionReference,
    LeafCondition, NotCondition,
};
pub use error::{Result, RuleError};
pub use executor::{ExecutorOptions, RuleExecutor};
pub use fact::{Fact, FactKind, FactOptions};
pub use models::{Event, Rule};
pub use operator_map::OperatorMap;
pub use operators::{Operator, OperatorDecorator};
pub use rule_result::RuleResult;
pub use store::ConditionStore;
