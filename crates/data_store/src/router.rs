//! TopicRouter - 主题到数据流的静态映射
//!
//! 启动时根据主题前缀为目录中每个数据流生成完整主题，之后只读。

use std::collections::HashMap;

use contracts::{StreamKind, TopicConfig};

/// 主题路由表
#[derive(Debug, Clone)]
pub struct TopicRouter {
    routes: HashMap<String, StreamKind>,
    subscription: String,
}

impl TopicRouter {
    /// 按主题配置构建
    pub fn new(config: &TopicConfig) -> Self {
        let routes = StreamKind::ALL
            .iter()
            .map(|&kind| (config.topic_for(kind), kind))
            .collect();

        Self {
            routes,
            subscription: config.subscription_filter(),
        }
    }

    /// 解析主题；不在目录中的主题返回 `None`
    #[inline]
    pub fn resolve(&self, topic: &str) -> Option<StreamKind> {
        self.routes.get(topic).copied()
    }

    /// 订阅过滤器
    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    /// 所有已绑定的 (主题, 数据流)，按数据流顺序
    pub fn topics(&self) -> Vec<(&str, StreamKind)> {
        let mut topics: Vec<_> = self
            .routes
            .iter()
            .map(|(topic, &kind)| (topic.as_str(), kind))
            .collect();
        topics.sort_by_key(|&(_, kind)| kind.index());
        topics
    }
}

impl Default for TopicRouter {
    fn default() -> Self {
        Self::new(&TopicConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routes() {
        let router = TopicRouter::default();

        assert_eq!(router.resolve("sense_hat/data/basic"), Some(StreamKind::Basic));
        assert_eq!(router.resolve("sense_hat/data/gyro"), Some(StreamKind::Gyro));
        assert_eq!(
            router.resolve("sense_hat/data/orientation"),
            Some(StreamKind::Orientation)
        );
        assert_eq!(router.subscription(), "sense_hat/#");
    }

    #[test]
    fn test_unknown_topics() {
        let router = TopicRouter::default();

        assert_eq!(router.resolve("sense_hat/data/accel_raw"), None);
        assert_eq!(router.resolve("sense_hat/data"), None);
        assert_eq!(router.resolve("sense_hat/data/accel/"), None);
        assert_eq!(router.resolve(""), None);
    }

    #[test]
    fn test_custom_prefix() {
        let router = TopicRouter::new(&TopicConfig {
            prefix: "lab/pi4".to_string(),
            subscription: Some("lab/#".to_string()),
        });

        assert_eq!(router.resolve("lab/pi4/accel"), Some(StreamKind::Accel));
        assert_eq!(router.resolve("sense_hat/data/accel"), None);
        assert_eq!(router.subscription(), "lab/#");

        let kinds: Vec<_> = router.topics().into_iter().map(|(_, k)| k).collect();
        assert_eq!(kinds, StreamKind::ALL.to_vec());
    }
}
