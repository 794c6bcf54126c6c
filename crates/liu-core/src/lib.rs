//! # liu-core
//!
//! Liu (流) 帧同步桥接库的核心库, 提供基础类型定义、错误处理和工具函数.
//!
//! 本 crate 为上层的图像描述 (`liu-image`)、压缩器抽象 (`liu-codec`)
//! 与帧同步引擎 (`liu-sync`) 提供共享的底层基础设施.

pub mod error;
pub mod media_type;
pub mod pixel_format;
pub mod rational;
pub mod timestamp;

// 重导出常用类型
pub use error::{LiuError, LiuResult};
pub use media_type::{MediaType, VideoSubtype};
pub use pixel_format::{FormatFlags, PixelFormat, Plane};
pub use rational::Rational;
pub use timestamp::{
    FALLBACK_FRAME_DURATION, SampleTimes, TICKS_PER_MS, TICKS_PER_SECOND, TimeRange,
};
