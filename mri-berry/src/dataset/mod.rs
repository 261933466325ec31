//! 数据集操作.
//!
//! 提供源文件发现与迭代器风格的记录加载.

use crate::consts::MAT_SUFFIX;
use crate::mat::{read_meta, read_record, RawRecord, ReadRecordError, RecordMeta};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}

/// 文件名是否以 `.mat` 结尾 (区分大小写)? 文件名不必是合法的 UTF-8.
pub fn is_mat_file<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .file_name()
        .is_some_and(|name| name.as_encoded_bytes().ends_with(MAT_SUFFIX.as_bytes()))
}

/// 递归查找 `root` 下所有 `.mat` 文件, 按路径排序.
///
/// 无法访问的子目录项会被记录并跳过. `root` 本身是否存在由调用方检查.
pub fn discover<P: AsRef<Path>>(root: P) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_mat_file(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();
    paths.sort();
    paths
}

/// 从给定路径创建完整记录 ([`RawRecord`]) 加载器, 按给定顺序迭代.
pub fn record_loader<I: IntoIterator<Item = PathBuf>>(paths: I) -> RecordLoader {
    let mut data: Vec<PathBuf> = paths.into_iter().collect();
    data.reverse();
    RecordLoader { data_rev: data }
}

/// 完整记录加载器. 每个文件独立成败.
#[derive(Debug)]
pub struct RecordLoader {
    data_rev: Vec<PathBuf>,
}

impl Iterator for RecordLoader {
    type Item = (PathBuf, Result<RawRecord, ReadRecordError>);

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.data_rev.pop()?;
        let data = read_record(&path);
        Some((path, data))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.data_rev.len(), Some(self.data_rev.len()))
    }
}

impl ExactSizeIterator for RecordLoader {
    #[inline]
    fn len(&self) -> usize {
        self.data_rev.len()
    }
}

/// 从给定路径创建轻量记录 ([`RecordMeta`]) 加载器, 只读取病人 ID 与标签.
pub fn meta_loader<I: IntoIterator<Item = PathBuf>>(paths: I) -> MetaLoader {
    let mut data: Vec<PathBuf> = paths.into_iter().collect();
    data.reverse();
    MetaLoader { data_rev: data }
}

/// 轻量记录加载器.
#[derive(Debug)]
pub struct MetaLoader {
    data_rev: Vec<PathBuf>,
}

impl Iterator for MetaLoader {
    type Item = (PathBuf, Result<RecordMeta, ReadRecordError>);

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.data_rev.pop()?;
        let data = read_meta(&path);
        Some((path, data))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.data_rev.len(), Some(self.data_rev.len()))
    }
}

impl ExactSizeIterator for MetaLoader {
    #[inline]
    fn len(&self) -> usize {
        self.data_rev.len()
    }
}
