//! 对象头与头部消息.

use super::H5File;
use crate::mat::cursor::Cursor;
use crate::mat::error::{MatError, MatResult};

/// 头部消息类型.
pub(super) mod msg {
    pub const DATASPACE: u16 = 0x0001;
    pub const LINK_INFO: u16 = 0x0002;
    pub const DATATYPE: u16 = 0x0003;
    pub const LINK: u16 = 0x0006;
    pub const LAYOUT: u16 = 0x0008;
    pub const FILTER_PIPELINE: u16 = 0x000B;
    pub const CONTINUATION: u16 = 0x0010;
    pub const SYMBOL_TABLE: u16 = 0x0011;
}

/// 消息标志: 消息保存在共享位置.
const FLAG_SHARED: u8 = 0x02;

/// 单个对象最多跟随的续块数.
const MAX_CONTINUATIONS: usize = 64;

#[derive(Copy, Clone, Debug)]
pub(super) struct Message<'a> {
    pub ty: u16,
    pub flags: u8,
    pub data: &'a [u8],
}

/// 一个对象的全部头部消息, 续块已展开.
#[derive(Debug)]
pub(super) struct ObjectHeader<'a> {
    messages: Vec<Message<'a>>,
}

impl<'a> ObjectHeader<'a> {
    pub fn read(file: &H5File<'a>, addr: u64) -> MatResult<Self> {
        let mut c = file.cursor_at(addr)?;
        let mut messages = Vec::new();
        let mut pending = Vec::new();

        let header_flags = if c.u8()? == 1 {
            // 版本 1: 12 字节头部, 消息从 8 字节对齐处开始.
            c.skip(1 + 2 + 4)?;
            let size = c.u32()? as u64;
            read_v1_messages(file, file.slice(addr.saturating_add(16), size)?, &mut messages, &mut pending)?;
            None
        } else {
            let mut c = file.cursor_at(addr)?;
            c.expect(b"OHDR", "object header")?;
            let version = c.u8()?;
            if version != 2 {
                return Err(MatError::Unsupported(format!("object header version {version}")));
            }
            let flags = c.u8()?;
            if flags & 0x20 != 0 {
                c.skip(16)?;
            }
            if flags & 0x10 != 0 {
                c.skip(4)?;
            }
            let chunk0 = c.uint(1 << (flags & 0x03))?;
            let block = c.take(usize::try_from(chunk0).map_err(|_| MatError::Truncated)?)?;
            read_v2_messages(file, block, flags, &mut messages, &mut pending)?;
            Some(flags)
        };

        let mut next = 0;
        while let Some(&(addr, len)) = pending.get(next) {
            next += 1;
            if next > MAX_CONTINUATIONS {
                return Err(MatError::Corrupt("too many continuation blocks".to_string()));
            }
            let block = file.slice(addr, len)?;
            match header_flags {
                None => read_v1_messages(file, block, &mut messages, &mut pending)?,
                Some(flags) => {
                    Cursor::new(block).expect(b"OCHK", "object header continuation")?;
                    // 去掉签名与末尾校验和.
                    let body = block
                        .get(4..block.len().saturating_sub(4))
                        .ok_or(MatError::Truncated)?;
                    read_v2_messages(file, body, flags, &mut messages, &mut pending)?;
                }
            }
        }

        Ok(Self { messages })
    }

    /// 第一条类型为 `ty` 的消息.
    pub fn find(&self, ty: u16) -> MatResult<Option<&Message<'a>>> {
        match self.messages.iter().find(|m| m.ty == ty) {
            Some(m) if m.flags & FLAG_SHARED != 0 => {
                Err(MatError::Unsupported(format!("shared message of type {ty:#x}")))
            }
            other => Ok(other),
        }
    }

    /// 所有类型为 `ty` 的消息.
    pub fn all(&self, ty: u16) -> impl Iterator<Item = &Message<'a>> + '_ {
        self.messages.iter().filter(move |m| m.ty == ty)
    }

    /// 是否含有类型为 `ty` 的消息?
    pub fn has(&self, ty: u16) -> bool {
        self.messages.iter().any(|m| m.ty == ty)
    }
}

fn read_v1_messages<'a>(
    file: &H5File<'a>,
    block: &'a [u8],
    out: &mut Vec<Message<'a>>,
    pending: &mut Vec<(u64, u64)>,
) -> MatResult<()> {
    let mut c = Cursor::new(block);
    while c.remaining() >= 8 {
        let ty = c.u16()?;
        let size = c.u16()? as usize;
        let flags = c.u8()?;
        c.skip(3)?;
        let data = c.take(size)?;
        push_message(file, Message { ty, flags, data }, out, pending)?;
    }
    Ok(())
}

fn read_v2_messages<'a>(
    file: &H5File<'a>,
    block: &'a [u8],
    header_flags: u8,
    out: &mut Vec<Message<'a>>,
    pending: &mut Vec<(u64, u64)>,
) -> MatResult<()> {
    let prefix = if header_flags & 0x04 != 0 { 6 } else { 4 };
    let mut c = Cursor::new(block);
    // 末尾不足一个消息头的部分是空隙.
    while c.remaining() >= prefix {
        let ty = c.u8()? as u16;
        let size = c.u16()? as usize;
        let flags = c.u8()?;
        if prefix == 6 {
            c.skip(2)?;
        }
        let data = c.take(size)?;
        push_message(file, Message { ty, flags, data }, out, pending)?;
    }
    Ok(())
}

fn push_message<'a>(
    file: &H5File<'a>,
    m: Message<'a>,
    out: &mut Vec<Message<'a>>,
    pending: &mut Vec<(u64, u64)>,
) -> MatResult<()> {
    if m.ty == msg::CONTINUATION {
        let mut c = Cursor::new(m.data);
        let addr = file.addr(&mut c)?;
        let len = file.length(&mut c)?;
        pending.push((addr, len));
    } else {
        out.push(m);
    }
    Ok(())
}
