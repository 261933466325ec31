//! 测试用的最小 MAT-file 写入器.
//!
//! 只写出读取器需要的结构, 不追求与 MATLAB 的输出逐字节一致.

use super::FormatKind;
use crate::consts::RECORD_VAR;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::Path;

/// 结构体字段的取值. 维度均为 MATLAB 维度, 数据按列优先 (即存储顺序) 排列.
#[derive(Clone, Debug)]
pub(crate) enum Field {
    /// `char` 行向量.
    Char(&'static str),
    /// `char` 行向量, level-5 中以 `miUTF8` 存储.
    Utf8(&'static str),
    Double(Vec<usize>, Vec<f64>),
    Int16(Vec<usize>, Vec<i16>),
    UInt8(Vec<usize>, Vec<u8>),
    /// `[]`.
    Empty,
    /// 元胞数组 (HDF5 中为对象引用).
    Cell,
}

/// 一条完整记录的字段, 图像与掩码的 MATLAB 维度为 `[rows, cols]`.
pub(crate) fn record_fields(
    pid: &'static str,
    label: f64,
    rows: usize,
    cols: usize,
) -> Vec<(&'static str, Field)> {
    let n = rows * cols;
    vec![
        ("PID", Field::Char(pid)),
        ("label", Field::Double(vec![1, 1], vec![label])),
        (
            "image",
            Field::Int16(vec![rows, cols], (0..n).map(|i| (i * 37 % 1000) as i16).collect()),
        ),
        (
            "tumorMask",
            Field::UInt8(vec![rows, cols], (0..n).map(|i| u8::from(i % 3 == 0)).collect()),
        ),
    ]
}

/// 以 `kind` 格式将记录写入 `path`.
pub(crate) fn write_mat(path: &Path, kind: FormatKind, fields: &[(&str, Field)]) {
    let bytes = match kind {
        FormatKind::Hdf5 => Hdf5Writer::new().struct_var(RECORD_VAR, fields),
        FormatKind::Level5 => Level5Writer::new().compressed().struct_var(RECORD_VAR, fields),
    };
    std::fs::write(path, bytes).unwrap();
}

trait Ordered: Copy {
    fn put(self, big_endian: bool, out: &mut Vec<u8>);
}

macro_rules! impl_ordered {
    ($($t: ty),+) => {
        $(
            impl Ordered for $t {
                fn put(self, big_endian: bool, out: &mut Vec<u8>) {
                    if big_endian {
                        out.extend_from_slice(&self.to_be_bytes());
                    } else {
                        out.extend_from_slice(&self.to_le_bytes());
                    }
                }
            }
        )+
    };
}

impl_ordered!(u8, i16, u16, i32, u32, u64, f64);

fn pack<T: Ordered>(values: &[T], big_endian: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * std::mem::size_of::<T>());
    for &v in values {
        v.put(big_endian, &mut out);
    }
    out
}

fn le<T: Ordered>(values: &[T]) -> Vec<u8> {
    pack(values, false)
}

fn pad_to(buf: &mut Vec<u8>, n: usize) {
    while buf.len() % n != 0 {
        buf.push(0);
    }
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut e = ZlibEncoder::new(Vec::new(), Compression::default());
    e.write_all(data).unwrap();
    e.finish().unwrap()
}

fn codes(s: &str) -> Vec<u16> {
    s.chars().map(|c| c as u32 as u16).collect()
}

/// level-5 MAT-file 写入器.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct Level5Writer {
    big_endian: bool,
    compressed: bool,
}

impl Level5Writer {
    const MI_INT8: u32 = 1;
    const MI_UINT8: u32 = 2;
    const MI_INT16: u32 = 3;
    const MI_UINT16: u32 = 4;
    const MI_INT32: u32 = 5;
    const MI_UINT32: u32 = 6;
    const MI_DOUBLE: u32 = 9;
    const MI_MATRIX: u32 = 14;
    const MI_COMPRESSED: u32 = 15;
    const MI_UTF8: u32 = 16;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn compressed(mut self) -> Self {
        self.compressed = true;
        self
    }

    pub fn struct_var(&self, var: &str, fields: &[(&str, Field)]) -> Vec<u8> {
        self.struct_var_with_dims(var, &[1, 1], fields)
    }

    /// 结构体数组本身的维度为 `dims`.
    pub fn struct_var_with_dims(&self, var: &str, dims: &[usize], fields: &[(&str, Field)]) -> Vec<u8> {
        let be = self.big_endian;
        let mut out = b"MATLAB 5.0 MAT-file, Platform: test".to_vec();
        out.resize(116, b' ');
        out.extend_from_slice(&[0; 8]);
        out.extend(pack(&[0x0100u16, u16::from_be_bytes(*b"MI")], be));

        const NAME_LEN: usize = 32;
        let mut body = self.element(Self::MI_INT32, &pack(&[NAME_LEN as i32], be));
        let mut names = Vec::new();
        for (name, _) in fields {
            let mut padded = name.as_bytes().to_vec();
            padded.resize(NAME_LEN, 0);
            names.extend(padded);
        }
        body.extend(self.element(Self::MI_INT8, &names));
        for (_, field) in fields {
            body.extend(self.field(field));
        }
        let var = self.matrix(var, 2, dims, &body);

        if self.compressed {
            let zipped = zlib(&var);
            out.extend(pack(&[Self::MI_COMPRESSED, zipped.len() as u32], be));
            out.extend(zipped);
        } else {
            out.extend(var);
        }
        out
    }

    fn element(&self, ty: u32, data: &[u8]) -> Vec<u8> {
        let be = self.big_endian;
        if !data.is_empty() && data.len() <= 4 {
            let mut out = pack(&[((data.len() as u32) << 16) | ty], be);
            out.extend_from_slice(data);
            pad_to(&mut out, 8);
            return out;
        }
        let mut out = pack(&[ty, data.len() as u32], be);
        out.extend_from_slice(data);
        pad_to(&mut out, 8);
        out
    }

    fn matrix(&self, name: &str, class: u8, dims: &[usize], body: &[u8]) -> Vec<u8> {
        let be = self.big_endian;
        let dims: Vec<i32> = dims.iter().map(|&d| d as i32).collect();
        let mut data = self.element(Self::MI_UINT32, &pack(&[class as u32, 0], be));
        data.extend(self.element(Self::MI_INT32, &pack(&dims, be)));
        data.extend(self.element(Self::MI_INT8, name.as_bytes()));
        data.extend_from_slice(body);
        self.element(Self::MI_MATRIX, &data)
    }

    fn field(&self, field: &Field) -> Vec<u8> {
        let be = self.big_endian;
        match field {
            Field::Char(s) => {
                let c = codes(s);
                self.matrix("", 4, &[1, c.len()], &self.element(Self::MI_UINT16, &pack(&c, be)))
            }
            Field::Utf8(s) => self.matrix(
                "",
                4,
                &[1, s.chars().count()],
                &self.element(Self::MI_UTF8, s.as_bytes()),
            ),
            Field::Double(dims, v) => {
                self.matrix("", 6, dims, &self.element(Self::MI_DOUBLE, &pack(v, be)))
            }
            Field::Int16(dims, v) => {
                self.matrix("", 10, dims, &self.element(Self::MI_INT16, &pack(v, be)))
            }
            Field::UInt8(dims, v) => {
                self.matrix("", 9, dims, &self.element(Self::MI_UINT8, &pack(v, be)))
            }
            Field::Empty => pack(&[Self::MI_MATRIX, 0], be),
            Field::Cell => self.matrix("", 1, &[0, 0], &[]),
        }
    }
}

const UNDEF: u64 = u64::MAX;

/// HDF5 (MATLAB v7.3) 写入器.
///
/// 默认: 512 字节用户块, 超级块 v0, 对象头 v1, 旧式组, 连续布局.
/// `new_style`: 无用户块, 超级块 v2, 对象头 v2, 链接消息.
/// `chunked`: 分块布局, 每维两块, 过滤器 shuffle + deflate.
/// 含三条以上消息的对象头会把多余消息放进续块.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct Hdf5Writer {
    chunked: bool,
    new_style: bool,
}

struct Space {
    buf: Vec<u8>,
}

impl Space {
    fn alloc(&mut self, bytes: &[u8]) -> u64 {
        pad_to(&mut self.buf, 8);
        let addr = self.buf.len() as u64;
        self.buf.extend_from_slice(bytes);
        addr
    }
}

impl Hdf5Writer {
    const DATASPACE: u16 = 0x01;
    const LINK_INFO: u16 = 0x02;
    const DATATYPE: u16 = 0x03;
    const LINK: u16 = 0x06;
    const LAYOUT: u16 = 0x08;
    const FILTER_PIPELINE: u16 = 0x0B;
    const CONTINUATION: u16 = 0x10;
    const SYMBOL_TABLE: u16 = 0x11;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunked(mut self) -> Self {
        self.chunked = true;
        self
    }

    pub fn new_style(mut self) -> Self {
        self.new_style = true;
        self
    }

    pub fn struct_var(&self, var: &str, fields: &[(&str, Field)]) -> Vec<u8> {
        let superblock_len = if self.new_style { 48 } else { 96 };
        let mut space = Space {
            buf: vec![0; superblock_len],
        };

        let links: Vec<(String, u64)> = fields
            .iter()
            .map(|(name, field)| (name.to_string(), self.dataset(&mut space, field)))
            .collect();
        let group = self.group(&mut space, &links);
        let root = self.group(&mut space, &[(var.to_string(), group)]);

        let eof = space.buf.len() as u64;
        let superblock = self.superblock(root, eof);
        space.buf[..superblock.len()].copy_from_slice(&superblock);

        if self.new_style {
            return space.buf;
        }
        let mut out = b"MATLAB 7.3 MAT-file, Platform: test, HDF5 schema 1.00 .".to_vec();
        out.resize(116, b' ');
        out.extend_from_slice(&[0; 8]);
        out.extend(le(&[0x0200u16, u16::from_be_bytes(*b"MI")]));
        out.resize(512, 0);
        out.extend(space.buf);
        out
    }

    fn superblock(&self, root: u64, eof: u64) -> Vec<u8> {
        let mut sb = b"\x89HDF\r\n\x1a\n".to_vec();
        if self.new_style {
            sb.extend_from_slice(&[2, 8, 8, 0]);
            sb.extend(le(&[0, UNDEF, eof, root]));
            sb.extend_from_slice(&[0; 4]);
        } else {
            sb.extend_from_slice(&[0, 0, 0, 0, 0, 8, 8, 0]);
            sb.extend(le(&[4u16, 16]));
            sb.extend(le(&[0u32]));
            sb.extend(le(&[0, UNDEF, eof, UNDEF]));
            sb.extend(le(&[0, root]));
            sb.extend(le(&[0u32, 0]));
            sb.extend_from_slice(&[0; 16]);
        }
        sb
    }

    fn object(&self, space: &mut Space, mut messages: Vec<(u16, Vec<u8>)>) -> u64 {
        if messages.len() > 2 {
            let tail = messages.split_off(2);
            let block = if self.new_style {
                let mut b = b"OCHK".to_vec();
                b.extend(encode_v2(&tail));
                b.extend_from_slice(&[0; 4]);
                b
            } else {
                encode_v1(&tail)
            };
            let addr = space.alloc(&block);
            messages.push((Self::CONTINUATION, le(&[addr, block.len() as u64])));
        }

        let header = if self.new_style {
            let body = encode_v2(&messages);
            let mut h = b"OHDR".to_vec();
            h.extend_from_slice(&[2, 0x02]);
            h.extend(le(&[body.len() as u32]));
            h.extend(body);
            h.extend_from_slice(&[0; 4]);
            h
        } else {
            let body = encode_v1(&messages);
            let mut h = vec![1, 0];
            h.extend(le(&[messages.len() as u16]));
            h.extend(le(&[1u32, body.len() as u32, 0]));
            h.extend(body);
            h
        };
        space.alloc(&header)
    }

    fn group(&self, space: &mut Space, links: &[(String, u64)]) -> u64 {
        if self.new_style {
            let mut info = vec![0, 0];
            info.extend(le(&[UNDEF, UNDEF]));
            let mut messages = vec![(Self::LINK_INFO, info)];
            for (name, addr) in links {
                let mut link = vec![1, 0, name.len() as u8];
                link.extend_from_slice(name.as_bytes());
                link.extend(le(&[*addr]));
                messages.push((Self::LINK, link));
            }
            return self.object(space, messages);
        }

        let mut heap = vec![0u8; 8];
        let mut offsets = Vec::with_capacity(links.len());
        for (name, _) in links {
            offsets.push(heap.len() as u64);
            heap.extend_from_slice(name.as_bytes());
            heap.push(0);
            pad_to(&mut heap, 8);
        }
        let heap_data = space.alloc(&heap);
        let mut heap_header = b"HEAP".to_vec();
        heap_header.extend_from_slice(&[0; 4]);
        heap_header.extend(le(&[heap.len() as u64, UNDEF, heap_data]));
        let heap_addr = space.alloc(&heap_header);

        let mut snod = b"SNOD".to_vec();
        snod.extend_from_slice(&[1, 0]);
        snod.extend(le(&[links.len() as u16]));
        for ((_, addr), offset) in links.iter().zip(&offsets) {
            snod.extend(le(&[*offset, *addr]));
            snod.extend(le(&[0u32, 0]));
            snod.extend_from_slice(&[0; 16]);
        }
        let snod_addr = space.alloc(&snod);

        let mut tree = b"TREE".to_vec();
        tree.extend_from_slice(&[0, 0]);
        tree.extend(le(&[1u16]));
        tree.extend(le(&[UNDEF, UNDEF, 0, snod_addr, offsets.last().copied().unwrap_or(0)]));
        let tree_addr = space.alloc(&tree);

        self.object(space, vec![(Self::SYMBOL_TABLE, le(&[tree_addr, heap_addr]))])
    }

    fn dataset(&self, space: &mut Space, field: &Field) -> u64 {
        let (matlab_dims, dtype, data, es) = match field {
            Field::Char(s) | Field::Utf8(s) => {
                let c = codes(s);
                (vec![1, c.len()], fixed(false, 2), le(&c), 2)
            }
            Field::Double(dims, v) => (dims.clone(), float64(), le(v), 8),
            Field::Int16(dims, v) => (dims.clone(), fixed(true, 2), le(v), 2),
            Field::UInt8(dims, v) => (dims.clone(), fixed(false, 1), v.clone(), 1),
            Field::Empty => (vec![2], fixed(false, 8), le(&[0u64, 0]), 8),
            Field::Cell => {
                let mut t = vec![0x17, 0, 0, 0];
                t.extend(le(&[8u32]));
                (vec![1, 1], t, vec![0; 8], 8)
            }
        };
        let shape: Vec<usize> = matlab_dims.iter().rev().copied().collect();
        let dims: Vec<u64> = shape.iter().map(|&d| d as u64).collect();

        let mut dataspace = if self.new_style {
            vec![2, shape.len() as u8, 0, 1]
        } else {
            vec![1, shape.len() as u8, 0, 0, 0, 0, 0, 0]
        };
        dataspace.extend(le(&dims));

        let mut messages = vec![(Self::DATASPACE, dataspace), (Self::DATATYPE, dtype)];
        let numel: usize = shape.iter().product();
        let chunk_it = self.chunked && numel > 0 && !matches!(field, Field::Cell);
        if chunk_it {
            let chunk: Vec<usize> = shape.iter().map(|&d| (d + 1) / 2).collect();
            let btree = self.chunks(space, &data, &shape, &chunk, es);
            let mut layout = vec![3, 2, shape.len() as u8 + 1];
            layout.extend(le(&[btree]));
            let mut sizes: Vec<u32> = chunk.iter().map(|&c| c as u32).collect();
            sizes.push(es as u32);
            layout.extend(le(&sizes));
            messages.push((Self::LAYOUT, layout));
            messages.push((Self::FILTER_PIPELINE, self.filters(es)));
        } else {
            let addr = space.alloc(&data);
            let mut layout = vec![3, 1];
            layout.extend(le(&[addr, data.len() as u64]));
            messages.push((Self::LAYOUT, layout));
        }
        self.object(space, messages)
    }

    fn filters(&self, es: usize) -> Vec<u8> {
        let mut p = Vec::new();
        if self.new_style {
            p.extend_from_slice(&[2, 2]);
            for (id, value) in [(2u16, es as u32), (1, 6)] {
                p.extend(le(&[id, 0, 1]));
                p.extend(le(&[value]));
            }
        } else {
            p.extend_from_slice(&[1, 2, 0, 0, 0, 0, 0, 0]);
            for (id, value) in [(2u16, es as u32), (1, 6)] {
                p.extend(le(&[id, 0, 0, 1]));
                p.extend(le(&[value, 0]));
            }
        }
        p
    }

    /// 写出所有块和一个单层 B 树, 返回 B 树地址.
    fn chunks(
        &self,
        space: &mut Space,
        data: &[u8],
        shape: &[usize],
        chunk: &[usize],
        es: usize,
    ) -> u64 {
        let rank = shape.len();
        let grid: Vec<usize> = shape.iter().zip(chunk).map(|(s, c)| (s + c - 1) / c).collect();
        let total: usize = grid.iter().product();

        let mut entries = Vec::with_capacity(total);
        let mut cell = vec![0usize; rank];
        for _ in 0..total {
            let offset: Vec<usize> = cell.iter().zip(chunk).map(|(i, c)| i * c).collect();
            let raw = extract_chunk(data, shape, chunk, &offset, es);
            let stored = zlib(&shuffle(&raw, es));
            let addr = space.alloc(&stored);
            entries.push((stored.len() as u32, offset, addr));
            for d in (0..rank).rev() {
                cell[d] += 1;
                if cell[d] < grid[d] {
                    break;
                }
                cell[d] = 0;
            }
        }

        let mut tree = b"TREE".to_vec();
        tree.extend_from_slice(&[1, 0]);
        tree.extend(le(&[entries.len() as u16]));
        tree.extend(le(&[UNDEF, UNDEF]));
        for (size, offset, addr) in &entries {
            tree.extend(le(&[*size, 0]));
            let mut offsets: Vec<u64> = offset.iter().map(|&o| o as u64).collect();
            offsets.push(0);
            tree.extend(le(&offsets));
            tree.extend(le(&[*addr]));
        }
        tree.extend(le(&[0u32, 0]));
        let mut end: Vec<u64> = shape.iter().map(|&d| d as u64).collect();
        end.push(0);
        tree.extend(le(&end));
        space.alloc(&tree)
    }
}

fn fixed(signed: bool, size: u32) -> Vec<u8> {
    let mut t = vec![0x10, if signed { 0x08 } else { 0 }, 0, 0];
    t.extend(le(&[size]));
    t.extend(le(&[0u16, (size * 8) as u16]));
    t
}

fn float64() -> Vec<u8> {
    let mut t = vec![0x11, 0x20, 63, 0];
    t.extend(le(&[8u32]));
    t.extend(le(&[0u16, 64]));
    t.extend_from_slice(&[52, 11, 0, 52]);
    t.extend(le(&[1023u32]));
    t
}

fn encode_v1(messages: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (ty, data) in messages {
        let mut data = data.clone();
        pad_to(&mut data, 8);
        out.extend(le(&[*ty, data.len() as u16]));
        out.extend_from_slice(&[0; 4]);
        out.extend(data);
    }
    out
}

fn encode_v2(messages: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (ty, data) in messages {
        out.push(*ty as u8);
        out.extend(le(&[data.len() as u16]));
        out.push(0);
        out.extend_from_slice(data);
    }
    out
}

fn shuffle(data: &[u8], es: usize) -> Vec<u8> {
    let n = data.len() / es;
    let mut out = vec![0; data.len()];
    for i in 0..n {
        for b in 0..es {
            out[b * n + i] = data[i * es + b];
        }
    }
    out
}

fn extract_chunk(data: &[u8], shape: &[usize], chunk: &[usize], offset: &[usize], es: usize) -> Vec<u8> {
    let n: usize = chunk.iter().product();
    let mut out = vec![0; n * es];
    for (k, dst) in out.chunks_exact_mut(es).enumerate() {
        let mut coords = vec![0; chunk.len()];
        let mut rem = k;
        for d in (0..chunk.len()).rev() {
            coords[d] = rem % chunk[d];
            rem /= chunk[d];
        }
        let mut src = 0;
        let mut inside = true;
        for d in 0..chunk.len() {
            let g = offset[d] + coords[d];
            if g >= shape[d] {
                inside = false;
                break;
            }
            src = src * shape[d] + g;
        }
        if inside {
            dst.copy_from_slice(&data[src * es..(src + 1) * es]);
        }
    }
    out
}
