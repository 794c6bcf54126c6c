//! # liu-codec
//!
//! Liu 帧同步桥接库的压缩器层.
//!
//! 本 crate 定义块压缩器的统一接口 [`Compressor`], 压缩输出 [`CompressedPacket`],
//! 会话参数与编码配置, 以及不做压缩的内置实现 [`RawCompressor`].

pub mod compressor;
pub mod config;
pub mod encoders;
pub mod packet;

pub use compressor::{Compressor, EncodeFlags, Packets};
pub use config::{CompressorParams, EncoderConfig, EndUsage, KeyframeMode};
pub use encoders::raw::RawCompressor;
pub use packet::CompressedPacket;
