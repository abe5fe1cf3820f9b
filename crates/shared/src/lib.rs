//! 共享库
//!
//! 规则引擎各入口共用的配置加载与日志初始化代码。

pub mod config;
pub mod observability;

pub use config::{AppConfig, EngineConfig};
pub use observability::ObservabilityConfig;
