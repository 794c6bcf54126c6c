//! 打包 4:2:2 → 平面 4:2:0 颜色布局转换.
//!
//! 输出固定为 YV12 (Y 平面之后先 V 后 U), 紧密排列, 步长对齐为 1.
//!
//! 亮度直接取每个像素的 Y 字节. 色度按 2x2 块计算: 取上下两行同一位置的
//! 色度样本求平均, 使用截断整数除法 `(a + b) / 2`.

use liu_core::{LiuError, LiuResult, PixelFormat};
use log::trace;
use rayon::prelude::*;

use crate::image::ImageBuffer;

/// 打包 4:2:2 宏像素 (4 字节, 两个像素) 内的字节位置
#[derive(Debug, Clone, Copy)]
struct PackedOrder {
    /// 第一个亮度样本
    luma: usize,
    /// U 样本
    u: usize,
    /// V 样本
    v: usize,
}

impl PackedOrder {
    fn of(format: PixelFormat) -> Option<Self> {
        match format {
            // Y0 U Y1 V
            PixelFormat::Yuy2 => Some(Self { luma: 0, u: 1, v: 3 }),
            // U Y0 V Y1
            PixelFormat::Uyvy => Some(Self { luma: 1, u: 0, v: 2 }),
            // Y0 V Y1 U
            PixelFormat::Yvyu => Some(Self { luma: 0, u: 3, v: 1 }),
            _ => None,
        }
    }
}

/// 颜色布局转换器
///
/// 内部暂存区只增不减, 始终保持为见过的最大帧大小.
/// 转换结果借用暂存区, 下一次转换前必须释放.
#[derive(Debug, Default)]
pub struct ColorConverter {
    scratch: Vec<u8>,
}

impl ColorConverter {
    /// 创建转换器, 暂存区初始为空
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前暂存区字节数
    pub fn scratch_len(&self) -> usize {
        self.scratch.len()
    }

    /// 释放暂存区
    pub fn release(&mut self) {
        self.scratch = Vec::new();
    }

    /// YUY2/YUYV 转 YV12
    pub fn convert(&mut self, packed: &[u8], width: u32, height: u32) -> LiuResult<ImageBuffer<'_>> {
        self.convert_format(PixelFormat::Yuy2, packed, width, height)
    }

    /// 任意打包 4:2:2 字节序转 YV12
    pub fn convert_format(
        &mut self,
        format: PixelFormat,
        packed: &[u8],
        width: u32,
        height: u32,
    ) -> LiuResult<ImageBuffer<'_>> {
        let order = PackedOrder::of(format).ok_or_else(|| {
            LiuError::Unsupported(format!("不支持从 {format} 转换到 yv12"))
        })?;
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(LiuError::InvalidArgument(format!(
                "转换尺寸必须为正偶数: {width}x{height}"
            )));
        }

        let w = width as usize;
        let h = height as usize;
        let src_stride = w.checked_mul(2).ok_or_else(too_large)?;
        let src_len = src_stride.checked_mul(h).ok_or_else(too_large)?;
        if packed.len() < src_len {
            return Err(LiuError::InvalidArgument(format!(
                "输入数据不足: {} < {src_len} ({format} {width}x{height})",
                packed.len(),
            )));
        }

        let luma_len = w * h;
        let chroma_w = w / 2;
        let chroma_len = chroma_w * (h / 2);
        let total = luma_len + 2 * chroma_len;
        self.ensure_scratch(total)?;

        let out = &mut self.scratch[..total];
        let (luma, chroma) = out.split_at_mut(luma_len);
        let (v_plane, u_plane) = chroma.split_at_mut(chroma_len);
        let src = &packed[..src_len];

        luma.par_chunks_mut(w)
            .zip(src.par_chunks(src_stride))
            .for_each(|(dst, row)| {
                for (j, y) in dst.iter_mut().enumerate() {
                    // 每个宏像素两个亮度样本, 间隔 2 字节
                    *y = row[2 * j + order.luma];
                }
            });

        v_plane
            .par_chunks_mut(chroma_w)
            .zip(u_plane.par_chunks_mut(chroma_w))
            .zip(src.par_chunks(2 * src_stride))
            .for_each(|((v_row, u_row), pair)| {
                let (top, bottom) = pair.split_at(src_stride);
                for j in 0..chroma_w {
                    let base = 4 * j;
                    u_row[j] = average(top[base + order.u], bottom[base + order.u]);
                    v_row[j] = average(top[base + order.v], bottom[base + order.v]);
                }
            });

        trace!("颜色转换: {format} {width}x{height} -> yv12 ({total} 字节)");
        ImageBuffer::wrap(PixelFormat::Yv12, width, height, 1, &self.scratch[..total])
    }

    fn ensure_scratch(&mut self, size: usize) -> LiuResult<()> {
        if self.scratch.len() >= size {
            return Ok(());
        }
        let extra = size - self.scratch.len();
        self.scratch.try_reserve_exact(extra).map_err(|e| {
            LiuError::AllocationFailure(format!("分配 {size} 字节转换暂存区失败: {e}"))
        })?;
        self.scratch.resize(size, 0);
        Ok(())
    }
}

fn too_large() -> LiuError {
    LiuError::InvalidArgument("转换尺寸过大".into())
}

/// 截断平均
fn average(a: u8, b: u8) -> u8 {
    ((u16::from(a) + u16::from(b)) / 2) as u8
}
