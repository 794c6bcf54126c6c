//! 内置压缩器实现.

pub mod raw;
