//! 合成测试图像.
//!
//! 亮度为随帧移动的斜向渐变, 色度为水平/垂直渐变. 输出按连接子类型的内存布局排列.

use liu_core::{MediaType, VideoSubtype};

/// 测试图像生成器
pub struct PatternGenerator {
    media: MediaType,
    buf: Vec<u8>,
}

impl PatternGenerator {
    /// 按媒体类型创建, 缓冲区大小为一帧样本
    pub fn new(media: MediaType) -> Self {
        Self {
            media,
            buf: vec![0; media.sample_size()],
        }
    }

    /// 生成第 `index` 帧
    pub fn frame(&mut self, index: u32) -> &[u8] {
        let w = self.media.width_px() as usize;
        let h = self.media.height_px() as usize;
        let shift = (index as usize).wrapping_mul(2);
        let luma = |x: usize, y: usize| ((x + y + shift) & 0xff) as u8;
        let cb = |x: usize| (64 + (x * 128 / w.max(1))) as u8;
        let cr = |y: usize| (64 + (y * 128 / h.max(1))) as u8;

        match self.media.subtype {
            VideoSubtype::Yuy2 | VideoSubtype::Yuyv => {
                for (y, row) in self.buf.chunks_exact_mut(2 * w).enumerate() {
                    for (j, px) in row.chunks_exact_mut(4).enumerate() {
                        let x = 2 * j;
                        px[0] = luma(x, y);
                        px[1] = cb(x);
                        px[2] = luma(x + 1, y);
                        px[3] = cr(y);
                    }
                }
            }
            VideoSubtype::I420 | VideoSubtype::Yv12 => {
                let cw = w.div_ceil(2);
                let ch = h.div_ceil(2);
                let (y_plane, chroma) = self.buf.split_at_mut(w * h);
                for (y, row) in y_plane.chunks_exact_mut(w).enumerate() {
                    for (x, v) in row.iter_mut().enumerate() {
                        *v = luma(x, y);
                    }
                }
                let (first, second) = chroma.split_at_mut(cw * ch);
                let (u_plane, v_plane) = match self.media.subtype {
                    VideoSubtype::Yv12 => (second, first),
                    _ => (first, second),
                };
                for (y, (u_row, v_row)) in u_plane
                    .chunks_exact_mut(cw)
                    .zip(v_plane.chunks_exact_mut(cw))
                    .enumerate()
                {
                    for x in 0..cw {
                        u_row[x] = cb(2 * x);
                        v_row[x] = cr(2 * y);
                    }
                }
            }
        }
        &self.buf
    }
}
