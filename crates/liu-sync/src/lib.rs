//! # liu-sync
//!
//! Liu 帧同步桥接库的同步引擎.
//!
//! [`FrameSynchronizer`] 接收上游原始视频帧, 统一颜色布局, 校正时间戳,
//! 驱动压缩器, 把输出数据包放入待投递队列, 再在背压下逐个交给下游.

pub mod clock;
pub mod config;
pub mod downstream;
pub mod pending;
pub mod sample;
pub mod stats;
pub mod synchronizer;

pub use clock::StreamClock;
pub use config::SyncConfig;
pub use downstream::{
    BufferPool, HeapPool, OutputBuffer, PacketSink, PreviewSink, Segment, StreamControl,
};
pub use pending::{PendingFrame, PendingQueue};
pub use sample::VideoSample;
pub use stats::SyncStats;
pub use synchronizer::{FrameSynchronizer, SynchronizerState};
