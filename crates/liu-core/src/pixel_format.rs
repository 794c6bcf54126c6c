//! 像素格式定义.
//!
//! 固定的像素布局表: 每种格式给出位深、色度偏移 (子采样) 以及平面结构标志.
//! 图像缓冲区描述符 (`liu-image`) 依据此表计算步长与平面偏移.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// 像素格式结构标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FormatFlags: u32 {
        /// 平面格式 (各分量存储在不同平面)
        const PLANAR = 0x100;
        /// 色度平面顺序为 V, U (否则为 U, V)
        const UV_FLIP = 0x200;
        /// 存在独立的 Alpha 平面
        const HAS_ALPHA = 0x400;
    }
}

/// 平面索引
///
/// 打包格式只使用 `Packed` (与 `Y` 共用索引 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plane {
    /// 亮度平面
    Y,
    /// 色度 U (Cb) 平面
    U,
    /// 色度 V (Cr) 平面
    V,
    /// Alpha 平面
    Alpha,
}

impl Plane {
    /// 打包格式的唯一平面
    pub const PACKED: Plane = Plane::Y;

    /// 全部平面, 按索引顺序
    pub const ALL: [Plane; 4] = [Plane::Y, Plane::U, Plane::V, Plane::Alpha];

    /// 平面在描述符数组中的索引
    pub const fn index(self) -> usize {
        match self {
            Self::Y => 0,
            Self::U => 1,
            Self::V => 2,
            Self::Alpha => 3,
        }
    }

    /// 是否为色度平面
    pub const fn is_chroma(self) -> bool {
        matches!(self, Self::U | Self::V)
    }
}

/// 像素格式
///
/// 命名规则: 颜色空间 + 排列方式, `Le` 后缀表示小端字节序.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    // ========================
    // 32 位
    // ========================
    /// RGB 32 位, 大端
    Rgb32,
    /// RGB 32 位, 小端
    Rgb32Le,
    /// ARGB 32 位, 大端
    Argb,
    /// ARGB 32 位, 小端
    ArgbLe,

    // ========================
    // 24 位
    // ========================
    /// RGB 各 8 位, 打包
    Rgb24,
    /// BGR 各 8 位, 打包
    Bgr24,

    // ========================
    // 16 位
    // ========================
    /// RGB 5:6:5, 大端
    Rgb565,
    /// RGB 5:6:5, 小端
    Rgb565Le,
    /// RGB 5:5:5, 大端
    Rgb555,
    /// RGB 5:5:5, 小端
    Rgb555Le,
    /// 打包 4:2:2, 字节序 U Y0 V Y1
    Uyvy,
    /// 打包 4:2:2, 字节序 Y0 U Y1 V (YUYV 与之相同)
    Yuy2,
    /// 打包 4:2:2, 字节序 Y0 V Y1 U
    Yvyu,

    // ========================
    // 12 位 (4:2:0 平面)
    // ========================
    /// YUV 4:2:0 平面, 平面顺序 Y, U, V
    I420,
    /// YUV 4:2:0 平面, 平面顺序 Y, V, U
    Yv12,

    // ========================
    // 带 Alpha 的平面格式
    // ========================
    /// YUV 4:4:4 平面 + Alpha 平面, 平面顺序 A, Y, V, U
    Yuv444a,
}

impl PixelFormat {
    /// 格式表中的所有条目
    pub const ALL: [PixelFormat; 16] = [
        Self::Rgb32,
        Self::Rgb32Le,
        Self::Argb,
        Self::ArgbLe,
        Self::Rgb24,
        Self::Bgr24,
        Self::Rgb565,
        Self::Rgb565Le,
        Self::Rgb555,
        Self::Rgb555Le,
        Self::Uyvy,
        Self::Yuy2,
        Self::Yvyu,
        Self::I420,
        Self::Yv12,
        Self::Yuv444a,
    ];

    /// 结构标志
    pub const fn flags(&self) -> FormatFlags {
        match self {
            Self::I420 => FormatFlags::PLANAR,
            Self::Yv12 => FormatFlags::PLANAR.union(FormatFlags::UV_FLIP),
            Self::Yuv444a => FormatFlags::PLANAR
                .union(FormatFlags::UV_FLIP)
                .union(FormatFlags::HAS_ALPHA),
            _ => FormatFlags::empty(),
        }
    }

    /// 每像素位数
    ///
    /// 平面格式为所有平面合计的平均位数 (如 4:2:0 为 12).
    pub const fn bits_per_sample(&self) -> u32 {
        match self {
            Self::Rgb32 | Self::Rgb32Le | Self::Argb | Self::ArgbLe | Self::Yuv444a => 32,
            Self::Rgb24 | Self::Bgr24 => 24,
            Self::Rgb565
            | Self::Rgb565Le
            | Self::Rgb555
            | Self::Rgb555Le
            | Self::Uyvy
            | Self::Yuy2
            | Self::Yvyu => 16,
            Self::I420 | Self::Yv12 => 12,
        }
    }

    /// 获取色度偏移 (水平, 垂直)
    ///
    /// 返回 (log2 水平子采样, log2 垂直子采样).
    /// 只有 4:2:0 平面格式返回 (1, 1), 其余均为 (0, 0).
    pub const fn chroma_shift(&self) -> (u32, u32) {
        match self {
            Self::I420 | Self::Yv12 => (1, 1),
            _ => (0, 0),
        }
    }

    /// 是否为平面格式
    pub const fn is_planar(&self) -> bool {
        self.flags().contains(FormatFlags::PLANAR)
    }

    /// 是否带 Alpha 平面
    pub const fn has_alpha(&self) -> bool {
        self.flags().contains(FormatFlags::HAS_ALPHA)
    }

    /// 色度平面顺序是否为 V, U
    pub const fn is_uv_flipped(&self) -> bool {
        self.flags().contains(FormatFlags::UV_FLIP)
    }

    /// 打包格式每像素字节数 (平面格式返回 1, 即单个分量)
    pub const fn bytes_per_pixel(&self) -> usize {
        if self.is_planar() {
            1
        } else {
            (self.bits_per_sample() / 8) as usize
        }
    }

    /// 是否为打包 4:2:2 YUV
    pub const fn is_packed_yuv422(&self) -> bool {
        matches!(self, Self::Uyvy | Self::Yuy2 | Self::Yvyu)
    }

    /// 格式使用的平面, 按存储先后顺序
    pub fn planes(&self) -> &'static [Plane] {
        if !self.is_planar() {
            return &[Plane::PACKED];
        }
        match (self.has_alpha(), self.is_uv_flipped()) {
            (false, false) => &[Plane::Y, Plane::U, Plane::V],
            (false, true) => &[Plane::Y, Plane::V, Plane::U],
            (true, false) => &[Plane::Alpha, Plane::Y, Plane::U, Plane::V],
            (true, true) => &[Plane::Alpha, Plane::Y, Plane::V, Plane::U],
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rgb32 => "rgb32",
            Self::Rgb32Le => "rgb32le",
            Self::Argb => "argb",
            Self::ArgbLe => "argble",
            Self::Rgb24 => "rgb24",
            Self::Bgr24 => "bgr24",
            Self::Rgb565 => "rgb565",
            Self::Rgb565Le => "rgb565le",
            Self::Rgb555 => "rgb555",
            Self::Rgb555Le => "rgb555le",
            Self::Uyvy => "uyvy",
            Self::Yuy2 => "yuy2",
            Self::Yvyu => "yvyu",
            Self::I420 => "i420",
            Self::Yv12 => "yv12",
            Self::Yuv444a => "yuv444a",
        };
        write!(f, "{name}")
    }
}
