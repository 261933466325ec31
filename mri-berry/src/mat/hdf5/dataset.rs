//! 数值数据集读取.

use super::object::{msg, ObjectHeader};
use super::H5File;
use crate::mat::cursor::Cursor;
use crate::mat::error::{MatError, MatResult};
use crate::mat::inflate;
use crate::mat::value::{checked_numel, MatArray, MatValue, NumClass};

/// 单个数据集解码后允许的最大字节数.
const MAX_DATASET_BYTES: usize = u32::MAX as usize;

const FILTER_DEFLATE: u16 = 1;
const FILTER_SHUFFLE: u16 = 2;
const FILTER_FLETCHER32: u16 = 3;

/// 读取数据集. 非数值元素类型返回 [`MatValue::Opaque`].
pub(super) fn read(file: &H5File<'_>, header: &ObjectHeader<'_>) -> MatResult<MatValue> {
    let space = header
        .find(msg::DATASPACE)?
        .ok_or_else(|| MatError::Corrupt("dataset without dataspace".to_string()))?;
    let shape = dataspace(file, space.data)?;

    let dtype = header
        .find(msg::DATATYPE)?
        .ok_or_else(|| MatError::Corrupt("dataset without datatype".to_string()))?;
    let (class, big_endian) = match datatype(dtype.data)? {
        ElementType::Numeric { class, big_endian } => (class, big_endian),
        ElementType::Other(kind) => return Ok(MatValue::Opaque(kind)),
    };

    let numel = checked_numel(&shape)?;
    let total = numel
        .checked_mul(class.size())
        .filter(|&t| t <= MAX_DATASET_BYTES)
        .ok_or_else(|| MatError::Unsupported(format!("dataset of shape {shape:?} is too large")))?;

    let layout = header
        .find(msg::LAYOUT)?
        .ok_or_else(|| MatError::Corrupt("dataset without layout".to_string()))?;
    let filters = match header.find(msg::FILTER_PIPELINE)? {
        Some(m) => filter_pipeline(m.data)?,
        None => Vec::new(),
    };

    let raw = match parse_layout(file, layout.data, shape.len())? {
        Layout::Compact(bytes) => bytes.get(..total).ok_or(MatError::Truncated)?.to_vec(),
        Layout::Contiguous(addr) if file.is_undefined(addr) => vec![0; total],
        Layout::Contiguous(addr) => file.slice(addr, total as u64)?.to_vec(),
        Layout::Chunked { btree, chunk } => {
            let mut out = vec![0; total];
            if !file.is_undefined(btree) && total > 0 {
                let chunked = Chunked {
                    file,
                    shape: &shape,
                    chunk: &chunk,
                    elem_size: class.size(),
                    filters: &filters,
                };
                chunked.read_node(btree, None, &mut out)?;
            }
            out
        }
    };

    let data = class.decode(&raw, big_endian)?;
    MatArray::new(class, shape, data).map(MatValue::Numeric)
}

/// 解析数据空间消息. 标量返回空形状, 空数据空间返回 `[0]`.
fn dataspace(file: &H5File<'_>, data: &[u8]) -> MatResult<Vec<usize>> {
    let mut c = Cursor::new(data);
    let version = c.u8()?;
    let rank = c.u8()? as usize;
    let _flags = c.u8()?;
    match version {
        1 => c.skip(5)?,
        2 => {
            let kind = c.u8()?;
            if kind == 2 {
                return Ok(vec![0]);
            }
        }
        v => return Err(MatError::Unsupported(format!("dataspace version {v}"))),
    }
    (0..rank)
        .map(|_| {
            let d = file.length(&mut c)?;
            usize::try_from(d).map_err(|_| MatError::Corrupt(format!("dimension {d}")))
        })
        .collect()
}

#[derive(Debug, PartialEq)]
enum ElementType {
    Numeric { class: NumClass, big_endian: bool },
    Other(&'static str),
}

fn datatype(data: &[u8]) -> MatResult<ElementType> {
    let mut c = Cursor::new(data);
    let class_version = c.u8()?;
    let bits = c.u8()?;
    c.skip(2)?;
    let size = c.u32()? as usize;
    let big_endian = bits & 0x01 != 0;

    let class = match class_version & 0x0f {
        0 => NumClass::from_parts(false, bits & 0x08 != 0, size),
        1 if bits & 0x40 != 0 => {
            return Err(MatError::Unsupported("VAX floating point".to_string()));
        }
        1 => NumClass::from_parts(true, true, size),
        2 => return Ok(ElementType::Other("time")),
        3 => return Ok(ElementType::Other("string")),
        4 => return Ok(ElementType::Other("bitfield")),
        5 => return Ok(ElementType::Other("opaque")),
        6 => return Ok(ElementType::Other("compound")),
        7 => return Ok(ElementType::Other("reference")),
        8 => return Ok(ElementType::Other("enumeration")),
        9 => return Ok(ElementType::Other("variable-length")),
        10 => return Ok(ElementType::Other("array")),
        c => return Err(MatError::Unsupported(format!("datatype class {c}"))),
    };
    class
        .map(|class| ElementType::Numeric { class, big_endian })
        .ok_or_else(|| MatError::Unsupported(format!("{size}-byte numeric type")))
}

#[derive(Debug)]
enum Layout<'a> {
    Compact(&'a [u8]),
    Contiguous(u64),
    Chunked { btree: u64, chunk: Vec<usize> },
}

fn parse_layout<'a>(file: &H5File<'a>, data: &'a [u8], rank: usize) -> MatResult<Layout<'a>> {
    let mut c = Cursor::new(data);
    let version = c.u8()?;
    match version {
        1 | 2 => {
            let dims = c.u8()? as usize;
            let class = c.u8()?;
            c.skip(5)?;
            let addr = if class != 0 { file.addr(&mut c)? } else { 0 };
            let sizes = (0..dims)
                .map(|_| c.u32().map(|d| d as usize))
                .collect::<MatResult<Vec<_>>>()?;
            match class {
                0 => {
                    let size = c.u32()? as usize;
                    Ok(Layout::Compact(c.take(size)?))
                }
                1 => Ok(Layout::Contiguous(addr)),
                2 => chunked(addr, sizes, rank),
                k => Err(MatError::Unsupported(format!("layout class {k}"))),
            }
        }
        3 => match c.u8()? {
            0 => {
                let size = c.u16()? as usize;
                Ok(Layout::Compact(c.take(size)?))
            }
            1 => Ok(Layout::Contiguous(file.addr(&mut c)?)),
            2 => {
                let dims = c.u8()? as usize;
                let addr = file.addr(&mut c)?;
                let sizes = (0..dims)
                    .map(|_| c.u32().map(|d| d as usize))
                    .collect::<MatResult<Vec<_>>>()?;
                chunked(addr, sizes, rank)
            }
            k => Err(MatError::Unsupported(format!("layout class {k}"))),
        },
        v => Err(MatError::Unsupported(format!("layout version {v}"))),
    }
}

/// 分块维度比数据空间多一维 (元素大小), 只保留前 `rank` 维.
fn chunked<'a>(btree: u64, mut sizes: Vec<usize>, rank: usize) -> MatResult<Layout<'a>> {
    if sizes.len() < rank || sizes[..rank].contains(&0) {
        return Err(MatError::Corrupt(format!(
            "chunk dimensions {sizes:?} for rank {rank}"
        )));
    }
    sizes.truncate(rank);
    Ok(Layout::Chunked { btree, chunk: sizes })
}

#[derive(Debug)]
struct Filter {
    id: u16,
    client: Vec<u32>,
}

fn filter_pipeline(data: &[u8]) -> MatResult<Vec<Filter>> {
    let mut c = Cursor::new(data);
    let version = c.u8()?;
    let count = c.u8()?;
    if version == 1 {
        c.skip(6)?;
    } else if version != 2 {
        return Err(MatError::Unsupported(format!("filter pipeline version {version}")));
    }

    let mut filters = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let id = c.u16()?;
        let name_len = if version == 1 || id >= 256 {
            c.u16()? as usize
        } else {
            0
        };
        let _flags = c.u16()?;
        let values = c.u16()? as usize;
        if version == 1 {
            c.skip((name_len + 7) / 8 * 8)?;
        } else {
            c.skip(name_len)?;
        }
        let client = (0..values).map(|_| c.u32()).collect::<MatResult<Vec<_>>>()?;
        if version == 1 && values % 2 == 1 {
            c.skip(4)?;
        }
        filters.push(Filter { id, client });
    }
    Ok(filters)
}

/// 逆序撤销过滤器. `mask` 中置位的过滤器在写入时被跳过.
fn unfilter(filters: &[Filter], mask: u32, mut data: Vec<u8>, elem_size: usize) -> MatResult<Vec<u8>> {
    for (i, f) in filters.iter().enumerate().rev() {
        if i < 32 && mask & (1 << i) != 0 {
            continue;
        }
        data = match f.id {
            FILTER_DEFLATE => inflate(&data)?,
            FILTER_SHUFFLE => {
                let size = f.client.first().map_or(elem_size, |&s| s as usize);
                unshuffle(&data, size)
            }
            FILTER_FLETCHER32 => {
                let keep = data
                    .len()
                    .checked_sub(4)
                    .ok_or_else(|| MatError::Corrupt("fletcher32 chunk".to_string()))?;
                data.truncate(keep);
                data
            }
            id => return Err(MatError::Unsupported(format!("filter {id}"))),
        };
    }
    Ok(data)
}

fn unshuffle(data: &[u8], size: usize) -> Vec<u8> {
    if size <= 1 {
        return data.to_vec();
    }
    let n = data.len() / size;
    let mut out = vec![0; data.len()];
    for b in 0..size {
        for i in 0..n {
            out[i * size + b] = data[b * n + i];
        }
    }
    // 不足一个元素的尾部原样保留.
    out[n * size..].copy_from_slice(&data[n * size..]);
    out
}

/// 分块数据集的读取上下文.
struct Chunked<'f, 'a> {
    file: &'f H5File<'a>,
    shape: &'f [usize],
    chunk: &'f [usize],
    elem_size: usize,
    filters: &'f [Filter],
}

impl Chunked<'_, '_> {
    /// 遍历 v1 B 树 (类型 1), 将每个块复制到 `out`.
    fn read_node(&self, addr: u64, expected_level: Option<u8>, out: &mut [u8]) -> MatResult<()> {
        let file = self.file;
        let rank = self.shape.len();
        let mut c = file.cursor_at(addr)?;
        c.expect(b"TREE", "chunk B-tree node")?;
        let node_type = c.u8()?;
        if node_type != 1 {
            return Err(MatError::Corrupt(format!("chunk B-tree node of type {node_type}")));
        }
        let level = c.u8()?;
        if level >= 16 || expected_level.is_some_and(|l| l != level) {
            return Err(MatError::Corrupt(format!("chunk B-tree node at level {level}")));
        }
        let entries = c.u16()?;
        c.skip(2 * file.offset_size())?;

        for _ in 0..entries {
            let size = c.u32()? as u64;
            let mask = c.u32()?;
            let mut offset = Vec::with_capacity(rank);
            for _ in 0..rank {
                let o = c.u64()?;
                offset.push(usize::try_from(o).map_err(|_| MatError::Truncated)?);
            }
            // 元素维度的偏移恒为 0.
            c.skip(8)?;
            let child = file.addr(&mut c)?;

            if level > 0 {
                self.read_node(child, Some(level - 1), out)?;
                continue;
            }
            let raw = file.slice(child, size)?.to_vec();
            let bytes = unfilter(self.filters, mask, raw, self.elem_size)?;
            self.copy_chunk(&bytes, &offset, out)?;
        }
        Ok(())
    }

    /// 将一个块与数据集相交的部分复制到 `out`. 块可能越过数据集边界.
    fn copy_chunk(&self, chunk: &[u8], offset: &[usize], out: &mut [u8]) -> MatResult<()> {
        let (shape, cdims, es) = (self.shape, self.chunk, self.elem_size);
        let rank = shape.len();
        if rank == 0 {
            let n = out.len().min(chunk.len());
            out[..n].copy_from_slice(&chunk[..n]);
            return Ok(());
        }
        let chunk_bytes = checked_numel(cdims)?
            .checked_mul(es)
            .ok_or_else(|| MatError::Corrupt(format!("chunk {cdims:?} overflows")))?;
        if chunk.len() < chunk_bytes {
            return Err(MatError::Corrupt(format!(
                "chunk holds {} bytes, expected {chunk_bytes}",
                chunk.len()
            )));
        }

        let last = rank - 1;
        let run = cdims[last].min(shape[last].saturating_sub(offset[last]));
        if run == 0 {
            return Ok(());
        }
        let rows: usize = cdims[..last].iter().product();
        let mut idx = vec![0usize; last];
        for _ in 0..rows {
            if (0..last).all(|d| offset[d].checked_add(idx[d]).is_some_and(|p| p < shape[d])) {
                let (mut src, mut dst) = (0, 0);
                for d in 0..last {
                    src = src * cdims[d] + idx[d];
                    dst = dst * shape[d] + offset[d] + idx[d];
                }
                src *= cdims[last];
                dst = dst * shape[last] + offset[last];
                out[dst * es..(dst + run) * es].copy_from_slice(&chunk[src * es..(src + run) * es]);
            }
            for d in (0..last).rev() {
                idx[d] += 1;
                if idx[d] < cdims[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
        Ok(())
    }
}
