//! 运行结果与错误.

use image::ImageError;
use mri_berry::pipeline::PipelineError;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;

/// 工具运行错误. 任何一种都以非零状态退出.
#[derive(Debug)]
pub enum RunError {
    /// 未给出源目录, 且无法确定用户主目录.
    NoSourceDir,

    /// 流水线启动失败.
    Pipeline(PipelineError),

    /// 写报告失败.
    Io(PathBuf, io::Error),

    /// 写直方图失败.
    Image(PathBuf, ImageError),

    /// 线程池初始化失败.
    ThreadPool(rayon::ThreadPoolBuildError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSourceDir => f.write_str("no source directory given and no home directory found"),
            Self::Pipeline(e) => e.fmt(f),
            Self::Io(p, e) => write!(f, "cannot write {}: {e}", p.display()),
            Self::Image(p, e) => write!(f, "cannot write {}: {e}", p.display()),
            Self::ThreadPool(e) => write!(f, "cannot start worker threads: {e}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<PipelineError> for RunError {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}

/// 将 `describe` 写出的报告打印到标准输出, 前后加分隔线.
pub fn print_report<F>(describe: F)
where
    F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
{
    let mut buf = Vec::with_capacity(512);
    // 写入内存不会失败.
    let _ = describe(&mut buf);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let _ = utils::sep_to(&mut out);
    let _ = writeln!(out, "{}", String::from_utf8_lossy(&buf));
    let _ = utils::sep_to(&mut out);
}
