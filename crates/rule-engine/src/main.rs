//! 规则求值命令行工具
//!
//! 读取规则文件与事实文件，执行规则并把结果以 JSON 输出到标准输出。

use anyhow::{Context, Result, bail};
use clap::Parser;
use rule_engine::{
    Almanac, AlmanacOptions, Condition, ConditionStore, ExecutorOptions, OperatorMap, Rule,
    RuleExecutor,
};
use rules_shared::config::AppConfig;
use rules_shared::observability;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// 规则求值工具
///
/// 事实文件的每个顶层字段注册为一个常量事实。
#[derive(Parser, Debug)]
#[command(name = "rule-eval")]
#[command(version, about = "JSON 规则求值工具")]
struct Cli {
    /// 规则文件，内容为单条规则或规则数组
    #[arg(short, long)]
    rule: PathBuf,

    /// 事实文件，内容为 JSON 对象
    #[arg(short, long)]
    facts: PathBuf,

    /// 命名条件文件，内容为 名称 -> 条件 的 JSON 对象
    #[arg(short, long)]
    conditions: Option<PathBuf>,

    /// 日志级别，覆盖配置文件中的设置
    #[arg(short, long)]
    log_level: Option<String>,

    /// 格式化输出
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load("rule-eval").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    observability::init(&config.observability)?;

    let rules = load_rules(&cli.rule).await?;
    let almanac = Almanac::with_options(AlmanacOptions::from(&config.engine));
    register_facts(&almanac, read_json(&cli.facts).await?)?;

    let store = Arc::new(ConditionStore::new());
    if let Some(path) = &cli.conditions {
        register_conditions(&store, read_json(path).await?)?;
    }

    let executor = RuleExecutor::new(Arc::new(OperatorMap::with_defaults()))
        .with_condition_store(store)
        .with_options(ExecutorOptions::from(&config.engine));

    info!("开始执行 {} 条规则", rules.len());
    let results = executor.execute_all(&rules, &almanac).await?;

    let output = Value::Array(results.iter().map(|r| r.to_serializable()).collect());
    let text = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        output.to_string()
    };
    println!("{}", text);
    Ok(())
}

async fn read_json(path: &Path) -> Result<Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("读取文件失败: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("JSON 解析失败: {}", path.display()))
}

async fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    let value = read_json(path).await?;
    let items = match value {
        Value::Array(items) => items,
        single => vec![single],
    };

    items
        .into_iter()
        .map(|item| -> Result<Rule> {
            let rule: Rule = serde_json::from_value(item)?;
            rule.validate()?;
            Ok(rule)
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("规则文件无效: {}", path.display()))
}

fn register_facts(almanac: &Almanac, facts: Value) -> Result<()> {
    let Value::Object(facts) = facts else {
        bail!("事实文件必须是 JSON 对象");
    };
    for (id, value) in facts {
        almanac.add_runtime_fact(id, value)?;
    }
    Ok(())
}

fn register_conditions(store: &ConditionStore, conditions: Value) -> Result<()> {
    let Value::Object(conditions) = conditions else {
        bail!("命名条件文件必须是 JSON 对象");
    };
    for (name, definition) in conditions {
        let condition = Condition::from_value(&definition)
            .with_context(|| format!("命名条件无效: {}", name))?;
        store.set(&name, condition);
    }
    Ok(())
}
