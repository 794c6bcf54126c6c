//! RAW 压缩器.
//!
//! 将图像视口内各平面的像素按 Y, U, V (有 alpha 时最后附加 alpha) 的顺序拼接为数据包,
//! 不做任何压缩. 支持前瞻缓存与关键帧放置, 便于在没有真实压缩器时驱动完整管线.

use std::collections::VecDeque;

use bytes::Bytes;
use liu_core::{LiuError, LiuResult, Plane};
use liu_image::ImageBuffer;
use log::{debug, trace};

use crate::compressor::{Compressor, EncodeFlags};
use crate::config::{CompressorParams, KeyframeMode};
use crate::packet::CompressedPacket;

const PLANAR_ORDER: [Plane; 4] = [Plane::Y, Plane::U, Plane::V, Plane::Alpha];

/// RAW 压缩器
#[derive(Debug, Default)]
pub struct RawCompressor {
    /// 会话参数, 未打开时为 None
    params: Option<CompressorParams>,
    /// 前瞻队列
    lookahead: VecDeque<CompressedPacket>,
    /// 就绪数据包
    ready: VecDeque<CompressedPacket>,
    /// 已编码帧数
    frame_count: u64,
    /// 距上一个关键帧的帧数
    since_keyframe: u32,
}

impl RawCompressor {
    /// 创建未打开的压缩器
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建并装箱
    pub fn create() -> Box<dyn Compressor> {
        Box::new(Self::new())
    }

    /// 是否已打开
    pub fn is_open(&self) -> bool {
        self.params.is_some()
    }

    /// 前瞻队列中尚未输出的帧数
    pub fn lookahead_len(&self) -> usize {
        self.lookahead.len()
    }

    fn wants_keyframe(&self, params: &CompressorParams, flags: EncodeFlags) -> bool {
        if flags.contains(EncodeFlags::FORCE_KEYFRAME) {
            return true;
        }
        let cfg = &params.config;
        if cfg.keyframe_mode == KeyframeMode::Disabled {
            return false;
        }
        if self.frame_count == 0 {
            return true;
        }
        let min_ok = cfg
            .keyframe_min_interval
            .is_none_or(|min| self.since_keyframe >= min);
        let max_hit = cfg
            .keyframe_max_interval
            .is_some_and(|max| self.since_keyframe >= max);
        min_ok && max_hit
    }

    fn release_lookahead(&mut self, keep: usize) {
        while self.lookahead.len() > keep {
            if let Some(pkt) = self.lookahead.pop_front() {
                self.ready.push_back(pkt);
            }
        }
    }
}

fn pack_planes(image: &ImageBuffer<'_>) -> Vec<u8> {
    let planes: &[Plane] = if image.format().is_planar() {
        &PLANAR_ORDER
    } else {
        &[Plane::PACKED]
    };
    let size: usize = planes
        .iter()
        .filter_map(|&p| Some(image.plane_rows(p)? as usize * image.plane_row_bytes(p)?))
        .sum();
    let mut buf = Vec::with_capacity(size);
    for &plane in planes {
        for row in image.rows(plane) {
            buf.extend_from_slice(row);
        }
    }
    buf
}

impl Compressor for RawCompressor {
    fn name(&self) -> &str {
        "raw"
    }

    fn open(&mut self, params: &CompressorParams) -> LiuResult<()> {
        if params.width == 0 || params.height == 0 {
            return Err(LiuError::InvalidArgument("宽度和高度不能为 0".into()));
        }
        if !params.time_base.is_valid() {
            return Err(LiuError::InvalidArgument(format!(
                "无效时间基: {}",
                params.time_base
            )));
        }
        self.close();
        debug!(
            "打开 raw 压缩器: {}x{}, 时间基={}, 前瞻={}, 关键帧模式={:?}",
            params.width,
            params.height,
            params.time_base,
            params.config.lag_in_frames,
            params.config.keyframe_mode,
        );
        self.params = Some(params.clone());
        Ok(())
    }

    fn encode(
        &mut self,
        image: Option<&ImageBuffer<'_>>,
        pts: i64,
        duration: i64,
        flags: EncodeFlags,
        _deadline: u64,
    ) -> LiuResult<()> {
        let Some(params) = self.params.as_ref() else {
            return Err(LiuError::EncodingFailure("压缩器未打开, 请先调用 open()".into()));
        };

        let Some(image) = image else {
            // 流结束: 输出前瞻队列中的所有帧
            trace!("raw 压缩器刷新, 前瞻剩余 {} 帧", self.lookahead.len());
            self.release_lookahead(0);
            return Ok(());
        };

        let vp = image.viewport();
        if vp.width != params.width || vp.height != params.height {
            return Err(LiuError::EncodingFailure(format!(
                "帧尺寸 {}x{} 与会话 {}x{} 不一致",
                vp.width, vp.height, params.width, params.height,
            )));
        }

        let key = self.wants_keyframe(params, flags);
        let lag = params.config.lag_in_frames as usize;
        let data = pack_planes(image);

        self.frame_count += 1;
        self.since_keyframe = if key { 1 } else { self.since_keyframe + 1 };
        self.lookahead
            .push_back(CompressedPacket::new(Bytes::from(data), pts, duration, key));
        self.release_lookahead(lag);
        Ok(())
    }

    fn next_packet(&mut self) -> Option<CompressedPacket> {
        self.ready.pop_front()
    }

    fn close(&mut self) {
        if self.params.take().is_some() {
            debug!("关闭 raw 压缩器, 共编码 {} 帧", self.frame_count);
        }
        self.lookahead.clear();
        self.ready.clear();
        self.frame_count = 0;
        self.since_keyframe = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncoderConfig;
    use liu_core::PixelFormat;

    fn open_raw(config: EncoderConfig) -> RawCompressor {
        let mut c = RawCompressor::new();
        c.open(&CompressorParams::new(4, 2, config)).unwrap();
        c
    }

    fn frame(fill: u8) -> ImageBuffer<'static> {
        let mut img = ImageBuffer::allocate(PixelFormat::I420, 4, 2, 1).unwrap();
        if let Some(d) = img.data_mut() {
            d.fill(fill);
        }
        img
    }

    #[test]
    fn test_encode_before_open() {
        let mut c = RawCompressor::new();
        let img = frame(0);
        let err = c
            .encode(Some(&img), 0, 1, EncodeFlags::empty(), 0)
            .unwrap_err();
        assert!(matches!(err, LiuError::EncodingFailure(_)));
    }

    #[test]
    fn test_packet_layout_yuv_order() {
        // YV12 存储为 Y V U, 输出统一为 Y U V
        let mut data = vec![1u8; 8];
        data.extend_from_slice(&[3, 3, 2, 2]);
        let img = ImageBuffer::wrap(PixelFormat::Yv12, 4, 2, 1, &data).unwrap();
        let mut c = open_raw(EncoderConfig::default());
        c.encode(Some(&img), 0, 100, EncodeFlags::empty(), 0).unwrap();
        let pkts: Vec<_> = c.packets().collect();
        assert_eq!(pkts.len(), 1);
        assert_eq!(&pkts[0].data[..], &[1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 3, 3]);
        assert_eq!((pkts[0].pts, pkts[0].end()), (0, 100));
        assert!(pkts[0].is_keyframe);
    }

    #[test]
    fn test_lag_in_frames() {
        let cfg = EncoderConfig {
            lag_in_frames: 2,
            ..EncoderConfig::default()
        };
        let mut c = open_raw(cfg);
        for i in 0..3 {
            c.encode(Some(&frame(i)), i64::from(i) * 10, 10, EncodeFlags::empty(), 0)
                .unwrap();
            let n = c.packets().count();
            assert_eq!(n, if i < 2 { 0 } else { 1 });
        }
        assert_eq!(c.lookahead_len(), 2);
        c.encode(None, 0, 0, EncodeFlags::empty(), 0).unwrap();
        let pts: Vec<i64> = c.packets().map(|p| p.pts).collect();
        assert_eq!(pts, vec![10, 20]);
        assert!(c.next_packet().is_none());
    }

    #[test]
    fn test_keyframe_interval() {
        let cfg = EncoderConfig {
            keyframe_mode: KeyframeMode::Auto,
            keyframe_max_interval: Some(3),
            ..EncoderConfig::default()
        };
        let mut c = open_raw(cfg);
        let mut keys = Vec::new();
        for i in 0..7 {
            c.encode(Some(&frame(0)), i, 1, EncodeFlags::empty(), 0).unwrap();
            keys.extend(c.packets().map(|p| p.is_keyframe));
        }
        assert_eq!(keys, vec![true, false, false, true, false, false, true]);
    }

    #[test]
    fn test_keyframes_disabled_unless_forced() {
        let cfg = EncoderConfig {
            keyframe_mode: KeyframeMode::Disabled,
            ..EncoderConfig::default()
        };
        let mut c = open_raw(cfg);
        c.encode(Some(&frame(0)), 0, 1, EncodeFlags::empty(), 0).unwrap();
        c.encode(Some(&frame(0)), 1, 1, EncodeFlags::FORCE_KEYFRAME, 0)
            .unwrap();
        let keys: Vec<bool> = c.packets().map(|p| p.is_keyframe).collect();
        assert_eq!(keys, vec![false, true]);
    }

    #[test]
    fn test_size_mismatch() {
        let mut c = open_raw(EncoderConfig::default());
        let img = ImageBuffer::allocate(PixelFormat::I420, 8, 2, 1).unwrap();
        assert!(c.encode(Some(&img), 0, 1, EncodeFlags::empty(), 0).is_err());
    }

    #[test]
    fn test_close_discards_pending() {
        let cfg = EncoderConfig {
            lag_in_frames: 4,
            ..EncoderConfig::default()
        };
        let mut c = open_raw(cfg);
        c.encode(Some(&frame(0)), 0, 1, EncodeFlags::empty(), 0).unwrap();
        c.close();
        assert!(!c.is_open());
        assert_eq!(c.lookahead_len(), 0);
        assert!(c.next_packet().is_none());
    }
}
