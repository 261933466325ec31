//! 只读字节游标. 所有越界读取都返回 [`MatError::Truncated`] 而不是 panic.

use super::error::{MatError, MatResult};

#[derive(Clone, Debug)]
pub(crate) struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    big_endian: bool,
}

macro_rules! impl_read {
    ($($name: ident -> $t: ty),+) => {
        $(
            #[inline]
            pub fn $name(&mut self) -> MatResult<$t> {
                let raw = self.take(std::mem::size_of::<$t>())?;
                let raw = raw.try_into().map_err(|_| MatError::Truncated)?;
                Ok(if self.big_endian {
                    <$t>::from_be_bytes(raw)
                } else {
                    <$t>::from_le_bytes(raw)
                })
            }
        )+
    };
}

impl<'a> Cursor<'a> {
    /// 小端游标.
    #[inline]
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_order(buf, false)
    }

    #[inline]
    pub fn with_order(buf: &'a [u8], big_endian: bool) -> Self {
        Self {
            buf,
            pos: 0,
            big_endian,
        }
    }

    /// 从 `pos` 开始的小端游标.
    pub fn at(buf: &'a [u8], pos: usize) -> MatResult<Self> {
        let mut c = Self::new(buf);
        c.seek(pos)?;
        Ok(c)
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn seek(&mut self, pos: usize) -> MatResult<()> {
        if pos > self.buf.len() {
            return Err(MatError::Truncated);
        }
        self.pos = pos;
        Ok(())
    }

    #[inline]
    pub fn skip(&mut self, n: usize) -> MatResult<()> {
        self.take(n).map(|_| ())
    }

    pub fn take(&mut self, n: usize) -> MatResult<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(MatError::Truncated)?;
        let out = self.buf.get(self.pos..end).ok_or(MatError::Truncated)?;
        self.pos = end;
        Ok(out)
    }

    /// 跳到下一个 `n` 字节对齐位置 (相对缓冲区起点).
    pub fn align(&mut self, n: usize) -> MatResult<()> {
        let pad = (n - self.pos % n) % n;
        self.skip(pad)
    }

    impl_read!(u8 -> u8, u16 -> u16, u32 -> u32, u64 -> u64, i32 -> i32);

    /// 读取 `size` 字节的无符号整数. `size` 只能是 1, 2, 4, 8.
    pub fn uint(&mut self, size: u8) -> MatResult<u64> {
        Ok(match size {
            1 => self.u8()? as u64,
            2 => self.u16()? as u64,
            4 => self.u32()? as u64,
            8 => self.u64()?,
            other => return Err(MatError::Unsupported(format!("{other}-byte integer field"))),
        })
    }

    /// 读取 `n` 字节的签名并与 `sig` 比较.
    pub fn expect(&mut self, sig: &[u8], what: &'static str) -> MatResult<()> {
        if self.take(sig.len())? == sig {
            Ok(())
        } else {
            Err(MatError::BadSignature(what))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Cursor;

    #[test]
    fn test_cursor_reads() {
        let buf = [1u8, 0, 0, 0, 2, 0, 0xff];
        let mut c = Cursor::new(&buf);
        assert_eq!(c.u32().unwrap(), 1);
        assert_eq!(c.u16().unwrap(), 2);
        assert_eq!(c.remaining(), 1);
        assert!(c.u16().is_err());
        assert_eq!(c.u8().unwrap(), 0xff);
        assert!(c.u8().is_err());

        let mut be = Cursor::with_order(&buf, true);
        assert_eq!(be.u32().unwrap(), 0x0100_0000);
    }

    #[test]
    fn test_align_and_uint() {
        let buf = [7u8; 16];
        let mut c = Cursor::new(&buf);
        c.skip(3).unwrap();
        c.align(8).unwrap();
        assert_eq!(c.pos(), 8);
        c.align(8).unwrap();
        assert_eq!(c.pos(), 8);
        assert_eq!(c.uint(1).unwrap(), 7);
        assert!(c.uint(3).is_err());
        assert!(Cursor::at(&buf, 17).is_err());
    }
}
