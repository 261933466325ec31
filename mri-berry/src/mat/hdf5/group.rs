//! 组成员枚举.
//!
//! 旧式组: 符号表消息 -> v1 B 树 (类型 0) -> 符号表节点, 名称保存在本地堆中.
//! 新式紧凑组: 成员直接以链接消息保存在对象头里.

use super::object::{msg, ObjectHeader};
use super::H5File;
use crate::mat::cursor::Cursor;
use crate::mat::error::{MatError, MatResult};

/// B 树的最大深度.
const MAX_DEPTH: u8 = 16;

/// 对象是否为组?
pub(super) fn is_group(header: &ObjectHeader<'_>) -> bool {
    header.has(msg::SYMBOL_TABLE) || header.has(msg::LINK_INFO) || header.has(msg::LINK)
}

/// 组的所有硬链接成员: (名称, 对象头地址).
pub(super) fn links<'a>(
    file: &H5File<'a>,
    header: &ObjectHeader<'a>,
) -> MatResult<Vec<(&'a [u8], u64)>> {
    if let Some(m) = header.find(msg::SYMBOL_TABLE)? {
        let mut c = Cursor::new(m.data);
        let btree = file.addr(&mut c)?;
        let heap = file.addr(&mut c)?;
        return symbol_table_links(file, btree, heap);
    }

    if let Some(m) = header.find(msg::LINK_INFO)? {
        let mut c = Cursor::new(m.data);
        c.skip(1)?;
        let flags = c.u8()?;
        if flags & 0x01 != 0 {
            c.skip(8)?;
        }
        let fractal_heap = file.addr(&mut c)?;
        if !file.is_undefined(fractal_heap) {
            return Err(MatError::Unsupported("dense link storage".to_string()));
        }
    }

    let mut out = Vec::new();
    for m in header.all(msg::LINK) {
        if let Some(link) = parse_link(file, m.data)? {
            out.push(link);
        }
    }
    Ok(out)
}

/// 解析链接消息. 软链接与外部链接返回 `None`.
fn parse_link<'a>(file: &H5File<'a>, data: &'a [u8]) -> MatResult<Option<(&'a [u8], u64)>> {
    let mut c = Cursor::new(data);
    let version = c.u8()?;
    if version != 1 {
        return Err(MatError::Unsupported(format!("link message version {version}")));
    }
    let flags = c.u8()?;
    let link_type = if flags & 0x08 != 0 { c.u8()? } else { 0 };
    if flags & 0x04 != 0 {
        c.skip(8)?;
    }
    if flags & 0x10 != 0 {
        c.skip(1)?;
    }
    let name_len = c.uint(1 << (flags & 0x03))?;
    let name = c.take(usize::try_from(name_len).map_err(|_| MatError::Truncated)?)?;
    if link_type != 0 {
        return Ok(None);
    }
    Ok(Some((name, file.addr(&mut c)?)))
}

fn symbol_table_links<'a>(
    file: &H5File<'a>,
    btree: u64,
    heap: u64,
) -> MatResult<Vec<(&'a [u8], u64)>> {
    let names = local_heap(file, heap)?;
    let mut nodes = Vec::new();
    collect_group_nodes(file, btree, None, &mut nodes)?;

    let mut out = Vec::new();
    for node in nodes {
        let mut c = file.cursor_at(node)?;
        c.expect(b"SNOD", "symbol table node")?;
        c.skip(2)?;
        let count = c.u16()?;
        for _ in 0..count {
            let name_offset = file.addr(&mut c)?;
            let object = file.addr(&mut c)?;
            // 缓存类型, 保留, 暂存区.
            c.skip(4 + 4 + 16)?;
            out.push((heap_string(names, name_offset)?, object));
        }
    }
    Ok(out)
}

/// 本地堆的数据段.
fn local_heap<'a>(file: &H5File<'a>, addr: u64) -> MatResult<&'a [u8]> {
    let mut c = file.cursor_at(addr)?;
    c.expect(b"HEAP", "local heap")?;
    c.skip(4)?;
    let size = file.length(&mut c)?;
    let _free_list = file.length(&mut c)?;
    let data = file.addr(&mut c)?;
    file.slice(data, size)
}

fn heap_string(heap: &[u8], offset: u64) -> MatResult<&[u8]> {
    let start = usize::try_from(offset).map_err(|_| MatError::Truncated)?;
    let tail = heap.get(start..).ok_or(MatError::Truncated)?;
    let end = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| MatError::Corrupt("unterminated link name".to_string()))?;
    Ok(&tail[..end])
}

/// 收集 B 树叶子指向的所有符号表节点地址.
fn collect_group_nodes(
    file: &H5File<'_>,
    addr: u64,
    expected_level: Option<u8>,
    out: &mut Vec<u64>,
) -> MatResult<()> {
    let mut c = file.cursor_at(addr)?;
    c.expect(b"TREE", "group B-tree node")?;
    let node_type = c.u8()?;
    if node_type != 0 {
        return Err(MatError::Corrupt(format!("group B-tree node of type {node_type}")));
    }
    let level = c.u8()?;
    if level >= MAX_DEPTH || expected_level.is_some_and(|l| l != level) {
        return Err(MatError::Corrupt(format!("group B-tree node at level {level}")));
    }
    let entries = c.u16()?;
    c.skip(2 * file.offset_size())?;

    for _ in 0..entries {
        c.skip(file.length_size())?;
        let child = file.addr(&mut c)?;
        if level == 0 {
            out.push(child);
        } else {
            collect_group_nodes(file, child, Some(level - 1), out)?;
        }
    }
    Ok(())
}
