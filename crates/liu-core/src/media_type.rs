//! 连接媒体类型.
//!
//! 帧源在连接时声明其输出的原始视频布局. 格式与几何尺寸只在这里检查一次,
//! 之后的每帧处理不再重复校验.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LiuError, LiuResult};
use crate::pixel_format::PixelFormat;
use crate::timestamp::FALLBACK_FRAME_DURATION;

/// 由四个 ASCII 字符构造 FourCC (小端)
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    (code[0] as u32) | (code[1] as u32) << 8 | (code[2] as u32) << 16 | (code[3] as u32) << 24
}

/// 可接受的输入视频子类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoSubtype {
    /// 4:2:0 平面, Y V U
    Yv12,
    /// 4:2:0 平面, Y U V
    I420,
    /// 4:2:2 打包, Y0 U Y1 V
    Yuy2,
    /// 与 YUY2 字节序相同的别名
    Yuyv,
}

impl VideoSubtype {
    /// 首选顺序
    pub const PREFERRED: [VideoSubtype; 4] = [Self::Yv12, Self::I420, Self::Yuy2, Self::Yuyv];

    /// 子类型对应的 FourCC
    pub const fn fourcc(&self) -> u32 {
        match self {
            Self::Yv12 => fourcc(b"YV12"),
            Self::I420 => fourcc(b"I420"),
            Self::Yuy2 => fourcc(b"YUY2"),
            Self::Yuyv => fourcc(b"YUYV"),
        }
    }

    /// 子类型在内存中的像素格式
    pub const fn pixel_format(&self) -> PixelFormat {
        match self {
            Self::Yv12 => PixelFormat::Yv12,
            Self::I420 => PixelFormat::I420,
            Self::Yuy2 | Self::Yuyv => PixelFormat::Yuy2,
        }
    }
}

impl fmt::Display for VideoSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Yv12 => "YV12",
            Self::I420 => "I420",
            Self::Yuy2 => "YUY2",
            Self::Yuyv => "YUYV",
        };
        write!(f, "{name}")
    }
}

/// 输入连接的媒体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaType {
    /// 视频子类型
    pub subtype: VideoSubtype,
    /// 宽度 (像素)
    pub width: i32,
    /// 高度 (像素)
    pub height: i32,
    /// 每帧平均时长 (100ns), 0 表示未声明
    pub avg_time_per_frame: i64,
    /// 位图头中声明的压缩 FourCC, 必须与子类型一致
    pub compression: u32,
}

impl MediaType {
    /// 按子类型创建, 压缩 FourCC 取子类型默认值
    pub const fn new(subtype: VideoSubtype, width: i32, height: i32) -> Self {
        Self {
            subtype,
            width,
            height,
            avg_time_per_frame: 0,
            compression: subtype.fourcc(),
        }
    }

    /// 设置每帧平均时长
    pub const fn with_frame_duration(mut self, avg_time_per_frame: i64) -> Self {
        self.avg_time_per_frame = avg_time_per_frame;
        self
    }

    /// 检查该类型是否可接受
    pub fn query_accept(&self) -> LiuResult<()> {
        if self.width <= 0 || self.width % 2 != 0 {
            return Err(LiuError::InvalidArgument(format!(
                "宽度必须为正偶数: {}",
                self.width
            )));
        }
        if self.height <= 0 || self.height % 2 != 0 {
            return Err(LiuError::InvalidArgument(format!(
                "高度必须为正偶数: {}",
                self.height
            )));
        }
        if self.compression != self.subtype.fourcc() {
            return Err(LiuError::InvalidArgument(format!(
                "压缩 FourCC {:#010x} 与子类型 {} 不一致",
                self.compression, self.subtype,
            )));
        }
        Ok(())
    }

    /// 宽度 (已通过 `query_accept` 时必为正)
    pub fn width_px(&self) -> u32 {
        self.width.max(0) as u32
    }

    /// 高度 (已通过 `query_accept` 时必为正)
    pub fn height_px(&self) -> u32 {
        self.height.max(0) as u32
    }

    /// 名义帧时长: 已声明则使用声明值, 否则回退到 20ms
    pub const fn nominal_frame_duration(&self) -> i64 {
        if self.avg_time_per_frame > 0 {
            self.avg_time_per_frame
        } else {
            FALLBACK_FRAME_DURATION
        }
    }

    /// 一帧样本的预期字节数
    pub fn sample_size(&self) -> usize {
        let w = self.width_px() as usize;
        let h = self.height_px() as usize;
        match self.subtype {
            VideoSubtype::Yv12 | VideoSubtype::I420 => w * h + 2 * w.div_ceil(2) * h.div_ceil(2),
            VideoSubtype::Yuy2 | VideoSubtype::Yuyv => 2 * w * h,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}x{}", self.subtype, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_even_geometry() {
        for subtype in VideoSubtype::PREFERRED {
            assert!(MediaType::new(subtype, 640, 480).query_accept().is_ok());
        }
    }

    #[test]
    fn test_reject_bad_geometry() {
        assert!(MediaType::new(VideoSubtype::I420, 0, 480).query_accept().is_err());
        assert!(MediaType::new(VideoSubtype::I420, 641, 480).query_accept().is_err());
        assert!(MediaType::new(VideoSubtype::I420, 640, -480).query_accept().is_err());
        assert!(MediaType::new(VideoSubtype::Yuy2, 640, 481).query_accept().is_err());
    }

    #[test]
    fn test_reject_mismatched_fourcc() {
        let mut mt = MediaType::new(VideoSubtype::Yv12, 64, 64);
        mt.compression = VideoSubtype::I420.fourcc();
        assert!(matches!(mt.query_accept(), Err(LiuError::InvalidArgument(_))));
    }

    #[test]
    fn test_nominal_duration_fallback() {
        let mt = MediaType::new(VideoSubtype::I420, 64, 64);
        assert_eq!(mt.nominal_frame_duration(), FALLBACK_FRAME_DURATION);
        assert_eq!(mt.with_frame_duration(333_667).nominal_frame_duration(), 333_667);
    }

    #[test]
    fn test_sample_size() {
        assert_eq!(MediaType::new(VideoSubtype::I420, 4, 2).sample_size(), 12);
        assert_eq!(MediaType::new(VideoSubtype::Yuyv, 4, 2).sample_size(), 16);
    }

    #[test]
    fn test_fourcc_layout() {
        assert_eq!(fourcc(b"YV12"), 0x3231_5659);
    }
}
