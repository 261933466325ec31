//! MATLAB v7.3 (HDF5) 读取器.
//!
//! v7.3 文件是带 512 字节用户块的 HDF5 文件, 结构体变量保存为组, 字段保存为数据集.
//! 本模块只实现读取这种布局所需的 HDF5 子集:
//!
//! 1. 超级块 v0 ~ v3, 在 0, 512, 1024, 2048, ... 处搜索;
//! 2. 对象头 v1 / v2 及其续块;
//! 3. 旧式组 (符号表, v1 B 树, 本地堆) 与紧凑新式组 (链接消息);
//! 4. 数值数据集: 紧凑、连续与分块 (v1 B 树索引) 布局, 过滤器 deflate / shuffle / fletcher32.
//!
//! 属性一律忽略. 数组形状即 HDF5 维度, 也就是 MATLAB 维度的逆序.

mod dataset;
mod group;
mod object;

use super::cursor::Cursor;
use super::error::{MatError, MatResult};
use super::value::MatValue;
use super::{ContainerFormat, FormatKind};
use object::ObjectHeader;

const SIGNATURE: &[u8; 8] = b"\x89HDF\r\n\x1a\n";

/// MATLAB v7.3 (HDF5) 格式.
#[derive(Copy, Clone, Debug, Default)]
pub struct Hdf5Format;

impl ContainerFormat for Hdf5Format {
    fn kind(&self) -> FormatKind {
        FormatKind::Hdf5
    }

    fn read_fields(&self, bytes: &[u8], var: &str, fields: &[&str]) -> MatResult<Vec<MatValue>> {
        let file = H5File::open(bytes)?;
        let root = ObjectHeader::read(&file, file.root)?;
        let var_addr = group::links(&file, &root)?
            .into_iter()
            .find(|(name, _)| *name == var.as_bytes())
            .map(|(_, addr)| addr)
            .ok_or_else(|| MatError::MissingVariable(var.to_string()))?;

        let record = ObjectHeader::read(&file, var_addr)?;
        if !group::is_group(&record) {
            return Err(MatError::Corrupt(format!("`{var}` is not a struct group")));
        }
        let links = group::links(&file, &record)?;

        fields
            .iter()
            .map(|&field| {
                let addr = links
                    .iter()
                    .find(|(name, _)| *name == field.as_bytes())
                    .map(|&(_, addr)| addr)
                    .ok_or_else(|| MatError::MissingField(field.to_string()))?;
                let header = ObjectHeader::read(&file, addr)?;
                if group::is_group(&header) {
                    Ok(MatValue::Opaque("struct array"))
                } else {
                    dataset::read(&file, &header)
                }
            })
            .collect()
    }
}

/// 已定位超级块的 HDF5 文件视图.
///
/// 所有文件地址都相对于 `base`, 即超级块所在的位置.
pub(super) struct H5File<'a> {
    buf: &'a [u8],
    base: usize,
    offset_size: u8,
    length_size: u8,
    root: u64,
}

impl<'a> H5File<'a> {
    fn open(buf: &'a [u8]) -> MatResult<Self> {
        let base = find_superblock(buf)?;
        let mut c = Cursor::at(buf, base + SIGNATURE.len())?;
        let version = c.u8()?;
        match version {
            0 | 1 => {
                c.skip(4)?;
                let offset_size = checked_size(c.u8()?)?;
                let length_size = checked_size(c.u8()?)?;
                // 保留, 叶/内部节点 K, 一致性标志.
                c.skip(1 + 2 + 2 + 4)?;
                if version == 1 {
                    c.skip(4)?;
                }
                // 基址, 空闲空间, 文件尾, 驱动信息.
                c.skip(4 * offset_size as usize)?;
                // 根组符号表项: 链接名偏移, 对象头地址.
                c.skip(offset_size as usize)?;
                let root = c.uint(offset_size)?;
                Ok(Self {
                    buf,
                    base,
                    offset_size,
                    length_size,
                    root,
                })
            }
            2 | 3 => {
                let offset_size = checked_size(c.u8()?)?;
                let length_size = checked_size(c.u8()?)?;
                c.skip(1)?;
                // 基址, 超级块扩展, 文件尾.
                c.skip(3 * offset_size as usize)?;
                let root = c.uint(offset_size)?;
                Ok(Self {
                    buf,
                    base,
                    offset_size,
                    length_size,
                    root,
                })
            }
            v => Err(MatError::Unsupported(format!("superblock version {v}"))),
        }
    }

    /// 位于文件地址 `addr` 的游标.
    pub fn cursor_at(&self, addr: u64) -> MatResult<Cursor<'a>> {
        Cursor::at(self.buf, self.absolute(addr)?)
    }

    /// 文件地址 `addr` 开始的 `len` 字节.
    pub fn slice(&self, addr: u64, len: u64) -> MatResult<&'a [u8]> {
        let start = self.absolute(addr)?;
        let len = usize::try_from(len).map_err(|_| MatError::Truncated)?;
        let end = start.checked_add(len).ok_or(MatError::Truncated)?;
        self.buf.get(start..end).ok_or(MatError::Truncated)
    }

    #[inline]
    pub fn addr(&self, c: &mut Cursor<'_>) -> MatResult<u64> {
        c.uint(self.offset_size)
    }

    #[inline]
    pub fn length(&self, c: &mut Cursor<'_>) -> MatResult<u64> {
        c.uint(self.length_size)
    }

    #[inline]
    pub fn offset_size(&self) -> usize {
        self.offset_size as usize
    }

    #[inline]
    pub fn length_size(&self) -> usize {
        self.length_size as usize
    }

    /// 是否为未定义地址 (全 1)?
    pub fn is_undefined(&self, addr: u64) -> bool {
        match self.offset_size {
            8 => addr == u64::MAX,
            n => addr == (1u64 << (8 * n as u32)) - 1,
        }
    }

    fn absolute(&self, addr: u64) -> MatResult<usize> {
        usize::try_from(addr)
            .ok()
            .and_then(|a| a.checked_add(self.base))
            .ok_or(MatError::Truncated)
    }
}

fn checked_size(size: u8) -> MatResult<u8> {
    match size {
        2 | 4 | 8 => Ok(size),
        s => Err(MatError::Unsupported(format!("{s}-byte offsets or lengths"))),
    }
}

/// 在 0, 512, 1024, 2048, ... 处搜索超级块签名.
fn find_superblock(buf: &[u8]) -> MatResult<usize> {
    let mut pos = 0;
    while pos + SIGNATURE.len() <= buf.len() {
        if &buf[pos..pos + SIGNATURE.len()] == SIGNATURE {
            return Ok(pos);
        }
        pos = if pos == 0 { 512 } else { pos * 2 };
    }
    Err(MatError::BadSignature("HDF5 superblock"))
}
