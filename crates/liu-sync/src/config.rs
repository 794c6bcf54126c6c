//! 同步器配置.

use liu_codec::EncoderConfig;
use serde::{Deserialize, Serialize};

/// 同步器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// 待投递队列软上限, 0 表示不限
    ///
    /// 队列达到上限时, 新帧在编码前先尝试投递, 仍然满则以背压拒绝.
    pub max_pending: usize,
    /// 启动时传给压缩器的编码配置
    pub encoder: EncoderConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_pending: 32,
            encoder: EncoderConfig::default(),
        }
    }
}
