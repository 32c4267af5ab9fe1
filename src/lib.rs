// 文件: lib.rs
// 作用: oscilla 库的根模块：弹簧引擎、帧调度、命令行定义和模拟器。

//! oscilla: a frame-driven damped spring animation engine.

#[macro_use]
extern crate tracing;

pub mod animation;
pub mod cli;
pub mod frame_clock;
pub mod simulate;
pub mod utils;

#[cfg(test)]
mod tests;
