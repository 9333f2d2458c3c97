//! 配置校验模块
//!
//! 两层校验：
//! 1. 字段级规则 (`validator` derive，定义在 contracts 中)
//! 2. 跨字段规则：
//!    - broker 地址可解析，端口合法
//!    - initial_delay_ms <= max_delay_ms
//!    - 主题前缀不含通配符、不以 `/` 结尾
//!    - 订阅过滤器合法，且覆盖全部数据流主题
//!    - 按数据流覆盖的容量：名称已知，值 >= 1
//!    - 时间格式串可解析

use contracts::{
    is_valid_filter, parse_broker_address, topic_matches, ContractError, ReaderBlueprint,
    StreamKind,
};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 单个数据流容量上限
const MAX_CAPACITY: usize = 1_000_000;

/// 校验 ReaderBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &ReaderBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_broker(blueprint)?;
    validate_topics(blueprint)?;
    validate_store(blueprint)?;
    validate_normalizer(blueprint)?;
    Ok(())
}

/// 字段级规则
fn validate_fields(blueprint: &ReaderBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let (field, message) = first_violation(&errors, "");
        ContractError::config_validation(field, message)
    })
}

/// 取第一条违规 (按字段名排序，结果稳定)
fn first_violation(errors: &ValidationErrors, prefix: &str) -> (String, String) {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Struct(inner) => return first_violation(inner, &path),
            ValidationErrorsKind::List(items) => {
                if let Some((index, inner)) = items.iter().next() {
                    return first_violation(inner, &format!("{path}[{index}]"));
                }
            }
            ValidationErrorsKind::Field(violations) => {
                if let Some(violation) = violations.first() {
                    let message = violation
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed '{}' check", violation.code));
                    return (path, message);
                }
            }
        }
    }

    (prefix.to_string(), errors.to_string())
}

/// 校验 broker 配置
fn validate_broker(blueprint: &ReaderBlueprint) -> Result<(), ContractError> {
    let broker = &blueprint.broker;
    parse_broker_address(&broker.address)?;

    let retry = &broker.retry;
    if retry.initial_delay_ms > retry.max_delay_ms {
        return Err(ContractError::config_validation(
            "broker.retry.initial_delay_ms / broker.retry.max_delay_ms",
            format!(
                "initial_delay_ms ({}) must be <= max_delay_ms ({})",
                retry.initial_delay_ms, retry.max_delay_ms
            ),
        ));
    }
    Ok(())
}

/// 校验主题前缀与订阅过滤器
fn validate_topics(blueprint: &ReaderBlueprint) -> Result<(), ContractError> {
    let topics = &blueprint.topics;

    if topics.prefix.contains(['+', '#']) {
        return Err(ContractError::config_validation(
            "topics.prefix",
            format!("prefix '{}' must not contain wildcards", topics.prefix),
        ));
    }
    if topics.prefix.ends_with('/') {
        return Err(ContractError::config_validation(
            "topics.prefix",
            format!("prefix '{}' must not end with '/'", topics.prefix),
        ));
    }

    let filter = topics.subscription_filter();
    if !is_valid_filter(&filter) {
        return Err(ContractError::config_validation(
            "topics.subscription",
            format!("'{filter}' is not a valid subscription filter"),
        ));
    }

    for kind in StreamKind::ALL {
        let topic = topics.topic_for(kind);
        if !topic_matches(&filter, &topic) {
            return Err(ContractError::config_validation(
                "topics.subscription",
                format!("subscription '{filter}' does not cover stream topic '{topic}'"),
            ));
        }
    }
    Ok(())
}

/// 校验按数据流覆盖的容量
fn validate_store(blueprint: &ReaderBlueprint) -> Result<(), ContractError> {
    for (name, &capacity) in &blueprint.store.capacities {
        if name.parse::<StreamKind>().is_err() {
            return Err(ContractError::config_validation(
                format!("store.capacities.{name}"),
                format!("unknown stream '{name}'"),
            ));
        }
        if !(1..=MAX_CAPACITY).contains(&capacity) {
            return Err(ContractError::config_validation(
                format!("store.capacities.{name}"),
                format!("capacity must be in 1..={MAX_CAPACITY}, got {capacity}"),
            ));
        }
    }
    Ok(())
}

/// 校验时间格式串
fn validate_normalizer(blueprint: &ReaderBlueprint) -> Result<(), ContractError> {
    blueprint.normalizer.check_timestamp_format()
}
