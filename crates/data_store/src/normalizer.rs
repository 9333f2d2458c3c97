//! PayloadNormalizer - 载荷解码与归一化
//!
//! JSON 字段 map → [`Reading`]：
//! 1. 解析 JSON，要求顶层为 object
//! 2. 取出 `ts` (epoch 秒)，按配置格式化为显示字符串
//! 3. 按数据流字段目录取值，四舍五入到配置的小数位 (`ts` 不参与)
//!
//! 舍入规则：round-half-away-from-zero (`f64::round` 作用于放大后的值)。

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};
use contracts::{
    ContractError, NormalizerConfig, Reading, StreamKind, TimeZoneMode, MAX_DECIMALS,
};
use serde_json::{Map, Value};

use crate::error::{DecodeError, Result};

/// 时间戳字段名
pub const TIMESTAMP_FIELD: &str = "ts";

/// 载荷归一化器
#[derive(Debug, Clone)]
pub struct PayloadNormalizer {
    scale: f64,
    timestamp_format: String,
    timezone: TimeZoneMode,
}

impl PayloadNormalizer {
    /// 创建归一化器
    ///
    /// 时间格式在此处校验，运行期格式化不会因格式串失败。
    /// 小数位截断到 [`MAX_DECIMALS`]。
    pub fn new(config: &NormalizerConfig) -> std::result::Result<Self, ContractError> {
        config.check_timestamp_format()?;

        let decimals = config.decimals.min(MAX_DECIMALS) as i32;
        Ok(Self {
            scale: 10f64.powi(decimals),
            timestamp_format: config.timestamp_format.clone(),
            timezone: config.timezone,
        })
    }

    /// 解码一条载荷
    pub fn normalize(&self, stream: StreamKind, payload: &[u8]) -> Result<Reading> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let Value::Object(object) = value else {
            return Err(DecodeError::NotAnObject);
        };

        let epoch_secs = match object.get(TIMESTAMP_FIELD) {
            None | Some(Value::Null) => return Err(DecodeError::MissingTimestamp),
            Some(ts) => ts
                .as_f64()
                .ok_or_else(|| DecodeError::InvalidTimestamp(ts.to_string()))?,
        };
        let timestamp = self.format_timestamp(epoch_secs)?;
        let fields = self.extract_fields(stream, &object)?;

        Ok(Reading::new(stream, epoch_secs, timestamp, fields))
    }

    fn extract_fields(
        &self,
        stream: StreamKind,
        object: &Map<String, Value>,
    ) -> Result<Vec<(&'static str, f64)>> {
        let catalog = stream.fields();
        let mut fields = Vec::with_capacity(catalog.len());

        for field in catalog {
            match object.get(field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(DecodeError::MissingField(field.name));
                }
                None | Some(Value::Null) => {}
                Some(value) => {
                    let raw = value.as_f64().ok_or_else(|| DecodeError::InvalidField {
                        field: field.name,
                        value: value.to_string(),
                    })?;
                    fields.push((field.name, self.round(raw)));
                }
            }
        }

        Ok(fields)
    }

    /// 按配置小数位舍入 (half away from zero)
    ///
    /// 放大后溢出的值原样返回。
    #[inline]
    pub fn round(&self, value: f64) -> f64 {
        let scaled = value * self.scale;
        if !scaled.is_finite() {
            return value;
        }
        scaled.round() / self.scale
    }

    /// epoch 秒 → 显示字符串
    pub fn format_timestamp(&self, epoch_secs: f64) -> Result<String> {
        if !epoch_secs.is_finite() {
            return Err(DecodeError::InvalidTimestamp(epoch_secs.to_string()));
        }

        let secs = epoch_secs.floor();
        let nanos = ((epoch_secs - secs) * 1e9).round().min(999_999_999.0) as u32;
        let utc = DateTime::<Utc>::from_timestamp(secs as i64, nanos)
            .ok_or_else(|| DecodeError::InvalidTimestamp(epoch_secs.to_string()))?;

        let mut out = String::with_capacity(self.timestamp_format.len() + 8);
        let written = match self.timezone {
            TimeZoneMode::Utc => write!(out, "{}", utc.format(&self.timestamp_format)),
            TimeZoneMode::Local => write!(
                out,
                "{}",
                utc.with_timezone(&Local).format(&self.timestamp_format)
            ),
        };
        written.map_err(|_| DecodeError::InvalidTimestamp(epoch_secs.to_string()))?;

        Ok(out)
    }
}
