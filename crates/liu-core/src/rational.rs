//! 有理数类型, 用于帧率.
//!
//! 例如 30000/1001 表示 29.97fps. 连接协商使用每帧平均时长 (100ns),
//! 这里负责两者之间的换算.

use std::fmt;
use std::str::FromStr;

use crate::error::LiuError;
use crate::timestamp::TICKS_PER_SECOND;

/// 有理数, 由分子和分母组成
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// 分子
    pub num: i32,
    /// 分母
    pub den: i32,
}

impl Rational {
    /// 创建新的有理数
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 判断是否可用作帧率 (分子分母均为正)
    pub const fn is_valid(&self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// 转换为 f64 浮点数
    ///
    /// 如果分母为 0, 返回 `f64::NAN`.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return f64::NAN;
        }
        f64::from(self.num) / f64::from(self.den)
    }

    /// 以该值为帧率时的每帧时长 (100ns)
    ///
    /// 帧率无效时返回 0, 表示"未声明".
    pub fn frame_duration_ticks(self) -> i64 {
        if !self.is_valid() {
            return 0;
        }
        TICKS_PER_SECOND * i64::from(self.den) / i64::from(self.num)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Rational {
    type Err = LiuError;

    /// 解析 "25" 或 "30000/1001"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || LiuError::InvalidArgument(format!("无法解析帧率: {s}"));
        let (num, den) = match s.split_once('/') {
            Some((n, d)) => (n.trim(), d.trim()),
            None => (s.trim(), "1"),
        };
        let num = num.parse::<i32>().map_err(|_| bad())?;
        let den = den.parse::<i32>().map_err(|_| bad())?;
        let r = Self::new(num, den);
        if !r.is_valid() {
            return Err(bad());
        }
        Ok(r)
    }
}
