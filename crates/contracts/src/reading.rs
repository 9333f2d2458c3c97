//! Reading - 存储层的基本单元
//!
//! 一条经过解码、归一化后的遥测样本。

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::StreamKind;

/// 遥测读数
///
/// 构造后不可变：字段均为私有，只提供只读访问。
/// 序列化为与发布端相同形状的扁平 map（`ts` 为格式化后的时间字符串）。
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// 所属数据流
    stream: StreamKind,

    /// 发布端嵌入的原始 epoch 秒
    epoch_secs: f64,

    /// 按配置格式化后的显示时间戳
    timestamp: String,

    /// 数值字段 (按数据流字段目录顺序)
    fields: Vec<(&'static str, f64)>,
}

impl Reading {
    /// 创建读数
    pub fn new(
        stream: StreamKind,
        epoch_secs: f64,
        timestamp: impl Into<String>,
        fields: Vec<(&'static str, f64)>,
    ) -> Self {
        Self {
            stream,
            epoch_secs,
            timestamp: timestamp.into(),
            fields,
        }
    }

    /// 所属数据流
    #[inline]
    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    /// 原始 epoch 秒
    #[inline]
    pub fn epoch_secs(&self) -> f64 {
        self.epoch_secs
    }

    /// 显示时间戳
    #[inline]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// 按名称读取字段
    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| *value)
    }

    /// 遍历所有字段
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.fields.iter().copied()
    }
}

impl Serialize for Reading {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("ts", &self.timestamp)?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Reading {
        Reading::new(
            StreamKind::Orientation,
            1_700_000_000.0,
            "14/11/2023, 22:13:20.000000",
            vec![("roll", 1.5), ("pitch", 2.0), ("yaw", 359.25)],
        )
    }

    #[test]
    fn test_field_access() {
        let reading = sample();
        assert_eq!(reading.get("yaw"), Some(359.25));
        assert_eq!(reading.get("humidity"), None);
        assert_eq!(reading.fields().count(), 3);
        assert_eq!(reading.stream(), StreamKind::Orientation);
    }

    #[test]
    fn test_serialize_flat_map() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["ts"], "14/11/2023, 22:13:20.000000");
        assert_eq!(json["roll"], 1.5);
        assert_eq!(json.as_object().unwrap().len(), 4);
    }
}
