//! liu - 帧同步桥接命令行工具
//!
//! 合成一段移动的测试图像, 按选定的输入布局送入帧同步器,
//! 经内置 raw 压缩器压缩后写入文件, 最后发送流结束并输出统计.

mod logging;
mod pattern;
mod sink;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use serde::Serialize;

use liu_codec::{EncoderConfig, EndUsage, KeyframeMode, RawCompressor};
use liu_core::{LiuError, MediaType, Rational, VideoSubtype};
use liu_sync::{FrameSynchronizer, HeapPool, SyncConfig, SyncStats, VideoSample};

use pattern::PatternGenerator;
use sink::{SinkReport, WriterSink};

/// 输入布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputLayout {
    Yv12,
    I420,
    Yuy2,
    Yuyv,
}

impl From<InputLayout> for VideoSubtype {
    fn from(layout: InputLayout) -> Self {
        match layout {
            InputLayout::Yv12 => Self::Yv12,
            InputLayout::I420 => Self::I420,
            InputLayout::Yuy2 => Self::Yuy2,
            InputLayout::Yuyv => Self::Yuyv,
        }
    }
}

/// 样本携带的时间戳
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TimestampMode {
    /// 起止时间
    Both,
    /// 只有起始时间
    Start,
    /// 不带时间戳 (首帧之后沿用参考时间)
    None,
}

#[derive(Parser, Debug)]
#[command(name = "liu", version, about = "帧同步桥接工具: 测试图像 -> 压缩器 -> 文件")]
struct Cli {
    /// 输出文件路径, 省略时只统计不写入
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 覆盖输出文件
    #[arg(short = 'y', long)]
    overwrite: bool,

    /// 图像尺寸 (如 "320x240"), 宽高必须为正偶数
    #[arg(short = 's', long = "size", default_value = "320x240")]
    size: String,

    /// 帧率 (如 "25" 或 "30000/1001")
    #[arg(short = 'r', long = "rate", default_value = "25")]
    rate: String,

    /// 帧数
    #[arg(short = 'n', long = "frames", default_value_t = 50)]
    frames: u32,

    /// 输入布局
    #[arg(long = "input-format", value_enum, default_value = "yuy2")]
    input_format: InputLayout,

    /// 样本时间戳模式
    #[arg(long, value_enum, default_value = "both")]
    timestamps: TimestampMode,

    /// 每 N 帧标记一次不连续
    #[arg(long = "discontinuity-every")]
    discontinuity_every: Option<u32>,

    /// 前瞻帧数
    #[arg(long, default_value_t = 0)]
    lag: u32,

    /// 关键帧最大间隔 (帧)
    #[arg(long)]
    keyint: Option<u32>,

    /// 关闭自动关键帧
    #[arg(long = "no-auto-keyframes")]
    no_auto_keyframes: bool,

    /// 使用恒定码率
    #[arg(long)]
    cbr: bool,

    /// 目标码率 (kbit/s)
    #[arg(long)]
    bitrate: Option<u32>,

    /// 待投递队列上限, 0 表示不限
    #[arg(long = "max-pending", default_value_t = 32)]
    max_pending: usize,

    /// 打印生效配置 (JSON) 后退出
    #[arg(long = "print-config")]
    print_config: bool,

    /// 以 JSON 输出运行统计
    #[arg(long)]
    json: bool,

    /// 日志目录
    #[arg(long = "log-dir", default_value = "logs")]
    log_dir: PathBuf,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// 运行报告
#[derive(Debug, Serialize)]
struct RunReport {
    input: String,
    frames: u32,
    config: SyncConfig,
    sync: SyncStats,
    sink: SinkReport,
    elapsed_ms: u128,
}

fn parse_size(s: &str) -> Result<(i32, i32)> {
    let (w, h) = s
        .split_once('x')
        .with_context(|| format!("无法解析尺寸: {s}"))?;
    let w = w.trim().parse().with_context(|| format!("无法解析宽度: {w}"))?;
    let h = h.trim().parse().with_context(|| format!("无法解析高度: {h}"))?;
    Ok((w, h))
}

fn build_config(cli: &Cli) -> SyncConfig {
    let keyframe_mode = if cli.no_auto_keyframes {
        KeyframeMode::Disabled
    } else if cli.keyint.is_some() {
        KeyframeMode::Auto
    } else {
        KeyframeMode::Default
    };
    SyncConfig {
        max_pending: cli.max_pending,
        encoder: EncoderConfig {
            lag_in_frames: cli.lag,
            end_usage: if cli.cbr { EndUsage::Cbr } else { EndUsage::Vbr },
            target_bitrate: cli.bitrate,
            keyframe_mode,
            keyframe_max_interval: cli.keyint,
            ..EncoderConfig::default()
        },
    }
}

fn open_output(path: &Path, overwrite: bool) -> Result<Box<dyn Write + Send>> {
    if !overwrite && path.exists() {
        bail!("输出文件已存在 '{}', 使用 -y 覆盖", path.display());
    }
    let file =
        File::create(path).with_context(|| format!("无法创建输出文件 '{}'", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn run(cli: &Cli) -> Result<RunReport> {
    let (width, height) = parse_size(&cli.size)?;
    let rate: Rational = cli.rate.parse()?;
    let media = MediaType::new(cli.input_format.into(), width, height)
        .with_frame_duration(rate.frame_duration_ticks());
    let config = build_config(cli);
    let frame_duration = media.nominal_frame_duration();

    let writer = match &cli.output {
        Some(path) => Some(open_output(path, cli.overwrite)?),
        None => None,
    };
    let sink = Arc::new(WriterSink::new(writer));

    let sync = FrameSynchronizer::new(RawCompressor::create(), config.clone());
    sync.connect(media).context("输入媒体类型不被接受")?;
    sync.connect_output(sink.clone())?;
    sync.set_buffer_pool(Arc::new(HeapPool::new(media.sample_size())))?;
    sync.start()?;

    info!(
        "开始: {media}, {rate} fps, {} 帧, 时间戳={:?}",
        cli.frames, cli.timestamps
    );
    let started = Instant::now();
    let mut pattern = PatternGenerator::new(media);

    for index in 0..cli.frames {
        let start = i64::from(index) * frame_duration;
        let data = pattern.frame(index);
        let mut sample = VideoSample::new(data);
        sample = match cli.timestamps {
            TimestampMode::Both => sample.with_times(start, start + frame_duration),
            TimestampMode::Start => sample.with_start(start),
            // 首帧必须带时间戳, 否则没有参考时间会被丢弃
            TimestampMode::None if index == 0 => sample.with_start(0),
            TimestampMode::None => sample,
        };
        if let Some(every) = cli.discontinuity_every.filter(|n| *n > 0) {
            sample = sample.with_discontinuity(index % every == 0);
        }

        match sync.receive(&sample) {
            Ok(()) => {}
            Err(e) if e.is_soft() => warn!("第 {index} 帧被下游拒绝: {e}"),
            Err(e) => return Err(e).with_context(|| format!("第 {index} 帧处理失败")),
        }
    }

    match sync.end_of_stream() {
        Ok(()) => {}
        Err(e) if e.is_soft() => warn!("流结束投递未完成: {e}"),
        Err(e) => return Err(e).context("流结束处理失败"),
    }
    let stats = sync.stats()?;
    let pending = sync.pending_len()?;
    if pending > 0 {
        warn!("流结束后仍有 {pending} 个数据包未投递");
    }
    sync.stop()?;

    Ok(RunReport {
        input: media.to_string(),
        frames: cli.frames,
        config,
        sync: stats,
        sink: sink.report(),
        elapsed_ms: started.elapsed().as_millis(),
    })
}

fn print_report(report: &RunReport) {
    eprintln!("输入: {}", report.input);
    eprintln!(
        "样本: 接收 {}, 丢弃 {}, 编码 {}",
        report.sync.received, report.sync.dropped, report.sync.encoded
    );
    eprintln!(
        "数据包: 输出 {}, 投递 {}, 拒绝 {}, 丢弃 {}",
        report.sync.packets, report.sync.delivered, report.sync.refused, report.sync.discarded
    );
    eprintln!(
        "写出: {} 个包 ({} 个关键帧), {} 字节, 结束于 {:.3}s",
        report.sink.packets,
        report.sink.keyframes,
        report.sink.bytes,
        report.sink.last_stop as f64 / liu_core::TICKS_PER_SECOND as f64,
    );
    eprintln!("耗时: {}ms", report.elapsed_ms);
}

fn main() {
    let cli = Cli::parse();

    if cli.print_config {
        match serde_json::to_string_pretty(&build_config(&cli)) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("错误: {e}");
                process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = logging::init(&cli.log_dir, "liu-cli", cli.verbose) {
        eprintln!("警告: 日志初始化失败: {e:#}");
    }

    eprintln!("liu 版本 {} -- 帧同步桥接工具", env!("CARGO_PKG_VERSION"));

    let report = match run(&cli) {
        Ok(report) => report,
        Err(e) => {
            let code = match e.downcast_ref::<LiuError>() {
                Some(LiuError::InvalidArgument(_)) => 2,
                _ => 1,
            };
            eprintln!("错误: {e:#}");
            process::exit(code);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("错误: {e}");
                process::exit(1);
            }
        }
    } else {
        print_report(&report);
    }
}
