//! 统一错误类型定义.
//!
//! 所有 Liu crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// Liu 统一错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiuError {
    /// 无效参数 (几何尺寸、对齐值、媒体类型等)
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 内存分配失败
    #[error("内存分配失败: {0}")]
    AllocationFailure(String),

    /// 输入端未连接
    #[error("未连接")]
    NotConnected,

    /// 同步器处于停止状态
    #[error("未运行")]
    NotRunning,

    /// 输入端已连接
    #[error("已连接")]
    AlreadyConnected,

    /// 操作要求同步器处于停止状态
    #[error("未停止")]
    NotStopped,

    /// 已收到流结束信号, 拒绝新的帧
    #[error("流已结束, 拒绝样本")]
    RejectedAfterEndOfStream,

    /// 起始时间晚于结束时间
    #[error("时间顺序错误: start={start} > stop={stop}")]
    OrderingViolation {
        /// 起始时间 (100ns)
        start: i64,
        /// 结束时间 (100ns)
        stop: i64,
    },

    /// 压缩器错误
    #[error("编码失败: {0}")]
    EncodingFailure(String),

    /// 下游暂时拒绝 (非致命, 数据保留待重试)
    #[error("下游拒绝接收")]
    BackpressureRejected,

    /// 下游没有可用的缓冲区池
    #[error("没有缓冲区分配器")]
    NoAllocator,

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

impl LiuError {
    /// 是否为可重试的软拒绝
    pub const fn is_soft(&self) -> bool {
        matches!(self, Self::BackpressureRejected)
    }
}

/// Liu 统一 Result 类型
pub type LiuResult<T> = Result<T, LiuError>;
