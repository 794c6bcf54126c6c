//! # Liu (流)
//!
//! 原始视频源与块压缩器之间的帧同步桥接库.
//!
//! Liu 负责:
//! - **图像描述**: 打包与平面像素格式的步长、平面位置、色度子采样、视口与垂直翻转
//! - **颜色布局转换**: 打包 4:2:2 到平面 4:2:0
//! - **帧同步**: 时间戳校正、压缩器驱动、待投递队列与背压投递
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use liu::codec::RawCompressor;
//! use liu::core::{MediaType, VideoSubtype};
//! use liu::sync::{FrameSynchronizer, HeapPool, OutputBuffer, PacketSink, StreamControl, SyncConfig, VideoSample};
//!
//! struct Discard;
//! impl StreamControl for Discard {}
//! impl PacketSink for Discard {
//!     fn receive(&self, _buffer: &OutputBuffer) -> liu::core::LiuResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! let sync = FrameSynchronizer::new(RawCompressor::create(), SyncConfig::default());
//! sync.connect(MediaType::new(VideoSubtype::I420, 640, 480)).unwrap();
//! sync.connect_output(Arc::new(Discard)).unwrap();
//! sync.set_buffer_pool(Arc::new(HeapPool::new(0))).unwrap();
//! sync.start().unwrap();
//!
//! let frame = vec![0u8; 640 * 480 * 3 / 2];
//! sync.receive(&VideoSample::new(&frame).with_times(0, 400_000)).unwrap();
//! sync.end_of_stream().unwrap();
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `liu-core` | 错误类型、像素格式、时间戳、媒体类型 |
//! | `liu-image` | 图像缓冲区描述符与颜色布局转换 |
//! | `liu-codec` | 压缩器接口与内置 raw 压缩器 |
//! | `liu-sync` | 帧同步器 |

/// 核心类型与工具
pub use liu_core as core;

/// 图像缓冲区与颜色布局转换
pub use liu_image as image;

/// 压缩器接口
pub use liu_codec as codec;

/// 帧同步引擎
pub use liu_sync as sync;
