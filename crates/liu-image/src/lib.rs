//! # liu-image
//!
//! Liu 帧同步桥接库的图像层.
//!
//! 本 crate 提供:
//! - 图像缓冲区描述符: 步长、平面位置、色度子采样、视口与垂直翻转
//! - 打包 4:2:2 到平面 4:2:0 的颜色布局转换

pub mod convert;
pub mod image;

pub use convert::ColorConverter;
pub use image::{ImageBuffer, Viewport};
