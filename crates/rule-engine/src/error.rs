//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    // ==================== 配置错误 ====================
    #[error("Condition: constructor \"{0}\" property required")]
    MissingField(&'static str),

    #[error("Condition: \"{0}\" must be an array")]
    NotAnArray(&'static str),

    #[error("Condition: \"{0}\" cannot be an array")]
    UnexpectedArray(&'static str),

    #[error("Condition: 条件定义必须是 JSON 对象, 实际为 {0}")]
    InvalidCondition(&'static str),

    #[error("Condition: 字段 \"{field}\" 无效: {message}")]
    InvalidField { field: &'static str, message: String },

    #[error("Missing operator name")]
    MissingOperatorName,

    #[error("Missing decorator name")]
    MissingDecoratorName,

    #[error("factId required")]
    MissingFactId,

    // ==================== 求值错误 ====================
    #[error("Cannot evaluate() a boolean condition: \"{0}\"")]
    BooleanConditionNotEvaluable(String),

    #[error("条件引用 \"{0}\" 必须先解析为具体条件才能求值")]
    UnresolvedConditionReference(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Unknown operator decorator: \"{decorator}\" (in \"{name}\")")]
    UnknownDecorator { decorator: String, name: String },

    #[error("Undefined fact: {0}")]
    UndefinedFact(String),

    #[error("No condition {0} exists")]
    UndefinedCondition(String),

    #[error("条件引用存在循环: {0}")]
    CircularConditionReference(String),

    #[error("规则结果已设置, 不能重复设置")]
    ResultAlreadySet,

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;

impl RuleError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELD",
            Self::NotAnArray(_) | Self::UnexpectedArray(_) => "INVALID_BOOLEAN_PAYLOAD",
            Self::InvalidCondition(_) | Self::InvalidField { .. } => "INVALID_CONDITION",
            Self::MissingOperatorName => "MISSING_OPERATOR_NAME",
            Self::MissingDecoratorName => "MISSING_DECORATOR_NAME",
            Self::MissingFactId => "MISSING_FACT_ID",
            Self::BooleanConditionNotEvaluable(_) => "BOOLEAN_CONDITION_NOT_EVALUABLE",
            Self::UnresolvedConditionReference(_) => "UNRESOLVED_CONDITION_REFERENCE",
            Self::UnknownOperator(_) => "UNKNOWN_OPERATOR",
            Self::UnknownDecorator { .. } => "UNKNOWN_DECORATOR",
            Self::UndefinedFact(_) => "UNDEFINED_FACT",
            Self::UndefinedCondition(_) => "UNDEFINED_CONDITION",
            Self::CircularConditionReference(_) => "CIRCULAR_CONDITION_REFERENCE",
            Self::ResultAlreadySet => "RESULT_ALREADY_SET",
            Self::JsonError(_) => "JSON_ERROR",
        }
    }

    /// 是否为未定义事实错误
    ///
    /// 上层编排逻辑可据此把条件视为“不适用”而非“求值崩溃”。
    pub fn is_undefined_fact(&self) -> bool {
        matches!(self, Self::UndefinedFact(_))
    }

    /// 是否为规则定义阶段的错误
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_)
                | Self::NotAnArray(_)
                | Self::UnexpectedArray(_)
                | Self::InvalidCondition(_)
                | Self::InvalidField { .. }
                | Self::MissingOperatorName
                | Self::MissingDecoratorName
                | Self::MissingFactId
        )
    }
}
