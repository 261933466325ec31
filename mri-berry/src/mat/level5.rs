//! MATLAB level-5 MAT-file 读取器.
//!
//! 只实现到达 `cjdata.{PID,label,image,tumorMask}` 所需的子集:
//!
//! 1. 128 字节文件头, 两种字节序;
//! 2. 小数据元素格式;
//! 3. `miCOMPRESSED` (zlib) 包装的顶层变量;
//! 4. `miMATRIX` 的数值类、`char`、`logical` 与结构体数组.
//!
//! 元胞数组、稀疏矩阵、对象与复数数组解码为 [`MatValue::Opaque`].

use super::cursor::Cursor;
use super::error::{MatError, MatResult};
use super::value::{checked_numel, MatArray, MatValue, NumClass};
use super::{inflate, ContainerFormat, FormatKind};

const HEADER_LEN: usize = 128;
const VERSION: u16 = 0x0100;

/// 数据元素类型 (`miXXX`).
mod mi {
    pub const INT8: u32 = 1;
    pub const UINT8: u32 = 2;
    pub const INT16: u32 = 3;
    pub const UINT16: u32 = 4;
    pub const INT32: u32 = 5;
    pub const UINT32: u32 = 6;
    pub const SINGLE: u32 = 7;
    pub const DOUBLE: u32 = 9;
    pub const INT64: u32 = 12;
    pub const UINT64: u32 = 13;
    pub const MATRIX: u32 = 14;
    pub const COMPRESSED: u32 = 15;
    pub const UTF8: u32 = 16;
    pub const UTF16: u32 = 17;
    pub const UTF32: u32 = 18;
}

/// 数组类型 (`mxXXX_CLASS`).
mod mx {
    pub const CELL: u8 = 1;
    pub const STRUCT: u8 = 2;
    pub const OBJECT: u8 = 3;
    pub const CHAR: u8 = 4;
    pub const SPARSE: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const SINGLE: u8 = 7;
    pub const INT8: u8 = 8;
    pub const UINT8: u8 = 9;
    pub const INT16: u8 = 10;
    pub const UINT16: u8 = 11;
    pub const INT32: u8 = 12;
    pub const UINT32: u8 = 13;
    pub const INT64: u8 = 14;
    pub const UINT64: u8 = 15;
}

const FLAG_COMPLEX: u32 = 0x0800;

/// MATLAB level-5 MAT-file 格式.
#[derive(Copy, Clone, Debug, Default)]
pub struct Level5Format;

impl ContainerFormat for Level5Format {
    fn kind(&self) -> FormatKind {
        FormatKind::Level5
    }

    fn read_fields(&self, bytes: &[u8], var: &str, fields: &[&str]) -> MatResult<Vec<MatValue>> {
        let big_endian = parse_header(bytes)?;
        let mut c = Cursor::with_order(bytes, big_endian);
        c.seek(HEADER_LEN)?;

        while c.remaining() > 0 {
            let (ty, data) = read_element(&mut c)?;
            let found = match ty {
                mi::MATRIX => find_in_matrix(data, big_endian, var, fields)?,
                mi::COMPRESSED => {
                    let inflated = inflate(data)?;
                    let mut inner = Cursor::with_order(&inflated, big_endian);
                    let mut found = None;
                    while found.is_none() && inner.remaining() > 0 {
                        let (ty, data) = read_element(&mut inner)?;
                        if ty == mi::MATRIX {
                            found = find_in_matrix(data, big_endian, var, fields)?;
                        }
                    }
                    found
                }
                _ => None,
            };
            if let Some(values) = found {
                return Ok(values);
            }
        }
        Err(MatError::MissingVariable(var.to_string()))
    }
}

/// 校验文件头, 返回文件是否为大端序.
fn parse_header(bytes: &[u8]) -> MatResult<bool> {
    let header = bytes.get(..HEADER_LEN).ok_or(MatError::Truncated)?;
    let big_endian = match &header[126..128] {
        b"IM" => false,
        b"MI" => true,
        _ => return Err(MatError::BadSignature("MAT level 5 endian indicator")),
    };
    let mut c = Cursor::with_order(header, big_endian);
    c.seek(124)?;
    let version = c.u16()?;
    if version != VERSION {
        return Err(MatError::Unsupported(format!(
            "MAT-file version {version:#06x}"
        )));
    }
    Ok(big_endian)
}

/// 读取一个数据元素, 返回类型与数据. 游标停在下一个元素的开头.
fn read_element<'a>(c: &mut Cursor<'a>) -> MatResult<(u32, &'a [u8])> {
    let first = c.u32()?;
    let small_len = (first >> 16) as usize;
    if small_len != 0 {
        if small_len > 4 {
            return Err(MatError::Corrupt(format!(
                "small data element of {small_len} bytes"
            )));
        }
        let payload = c.take(4)?;
        return Ok((first & 0xffff, &payload[..small_len]));
    }

    let len = c.u32()? as usize;
    let data = c.take(len)?;
    // 压缩元素之后没有填充.
    if first != mi::COMPRESSED {
        let pad = (8 - c.pos() % 8) % 8;
        c.skip(pad.min(c.remaining()))?;
    }
    Ok((first, data))
}

/// `miMATRIX` 元素的公共头部.
struct Matrix<'a> {
    big_endian: bool,
    flags: u32,
    class: u8,
    dims: Vec<usize>,
    name: &'a [u8],
    body: Cursor<'a>,
}

impl<'a> Matrix<'a> {
    fn parse(data: &'a [u8], big_endian: bool) -> MatResult<Self> {
        let mut body = Cursor::with_order(data, big_endian);

        let (ty, flags) = read_element(&mut body)?;
        if ty != mi::UINT32 || flags.len() < 4 {
            return Err(MatError::Corrupt("array flags subelement".to_string()));
        }
        let flags = Cursor::with_order(flags, big_endian).u32()?;

        let (ty, raw_dims) = read_element(&mut body)?;
        if ty != mi::INT32 {
            return Err(MatError::Corrupt("dimensions subelement".to_string()));
        }
        let mut dc = Cursor::with_order(raw_dims, big_endian);
        let mut dims = Vec::with_capacity(raw_dims.len() / 4);
        while dc.remaining() >= 4 {
            let d = dc.i32()?;
            dims.push(usize::try_from(d).map_err(|_| {
                MatError::Corrupt(format!("negative dimension {d}"))
            })?);
        }

        let (_, name) = read_element(&mut body)?;

        Ok(Self {
            big_endian,
            flags,
            class: (flags & 0xff) as u8,
            dims,
            name,
            body,
        })
    }

    fn numel(&self) -> MatResult<usize> {
        checked_numel(&self.dims)
    }

    /// 将非结构体矩阵解码为值.
    fn into_value(mut self) -> MatResult<MatValue> {
        if self.flags & FLAG_COMPLEX != 0 {
            return Ok(MatValue::Opaque("complex array"));
        }
        let class = match self.class {
            mx::CELL => return Ok(MatValue::Opaque("cell array")),
            mx::STRUCT => return Ok(MatValue::Opaque("struct array")),
            mx::OBJECT => return Ok(MatValue::Opaque("object")),
            mx::SPARSE => return Ok(MatValue::Opaque("sparse array")),
            mx::CHAR => NumClass::UInt16,
            mx::DOUBLE => NumClass::Double,
            mx::SINGLE => NumClass::Single,
            mx::INT8 => NumClass::Int8,
            mx::UINT8 => NumClass::UInt8,
            mx::INT16 => NumClass::Int16,
            mx::UINT16 => NumClass::UInt16,
            mx::INT32 => NumClass::Int32,
            mx::UINT32 => NumClass::UInt32,
            mx::INT64 => NumClass::Int64,
            mx::UINT64 => NumClass::UInt64,
            _ => return Ok(MatValue::Opaque("unknown class")),
        };

        let data = if self.body.remaining() == 0 {
            Vec::new()
        } else {
            let (ty, raw) = read_element(&mut self.body)?;
            decode_storage(ty, raw, self.big_endian)?
        };
        MatArray::from_matlab_dims(class, &self.dims, data).map(MatValue::Numeric)
    }

    /// 读取 1×1 结构体中的指定字段.
    fn struct_fields(mut self, fields: &[&str]) -> MatResult<Vec<MatValue>> {
        let big_endian = self.big_endian;
        if self.class != mx::STRUCT {
            return Err(MatError::Corrupt(format!(
                "variable is of class {}, not a struct",
                self.class
            )));
        }
        if self.numel()? == 0 {
            return Err(MatError::Corrupt("empty struct array".to_string()));
        }

        let (_, raw_len) = read_element(&mut self.body)?;
        let name_len = Cursor::with_order(raw_len, big_endian).u32()? as usize;
        if name_len == 0 {
            return Err(MatError::Corrupt("zero field name length".to_string()));
        }
        let (_, raw_names) = read_element(&mut self.body)?;
        let names: Vec<&[u8]> = raw_names
            .chunks_exact(name_len)
            .map(|n| n.split(|&b| b == 0).next().unwrap_or(&[]))
            .collect();

        // 只需要第一个元素的各个字段.
        let mut values: Vec<Option<MatValue>> = vec![None; fields.len()];
        for name in &names {
            let (ty, data) = read_element(&mut self.body)?;
            if ty != mi::MATRIX {
                return Err(MatError::Corrupt("struct field is not a matrix".to_string()));
            }
            if let Some(i) = fields.iter().position(|f| f.as_bytes() == *name) {
                values[i] = Some(if data.is_empty() {
                    MatValue::Numeric(MatArray::new(NumClass::Double, vec![0, 0], Vec::new())?)
                } else {
                    Matrix::parse(data, big_endian)?.into_value()?
                });
            }
        }

        values
            .into_iter()
            .zip(fields)
            .map(|(v, f)| v.ok_or_else(|| MatError::MissingField(f.to_string())))
            .collect()
    }
}

/// 若 `data` 是名为 `var` 的矩阵, 读取其字段.
fn find_in_matrix(
    data: &[u8],
    big_endian: bool,
    var: &str,
    fields: &[&str],
) -> MatResult<Option<Vec<MatValue>>> {
    if data.is_empty() {
        return Ok(None);
    }
    let m = Matrix::parse(data, big_endian)?;
    if m.name != var.as_bytes() {
        return Ok(None);
    }
    m.struct_fields(fields).map(Some)
}

/// 将存储类型为 `ty` 的数据解码为 `f64`. `miUTF8` 按字符解码为码位.
fn decode_storage(ty: u32, raw: &[u8], big_endian: bool) -> MatResult<Vec<f64>> {
    let class = match ty {
        mi::INT8 => NumClass::Int8,
        mi::UINT8 => NumClass::UInt8,
        mi::INT16 => NumClass::Int16,
        mi::UINT16 | mi::UTF16 => NumClass::UInt16,
        mi::INT32 => NumClass::Int32,
        mi::UINT32 | mi::UTF32 => NumClass::UInt32,
        mi::SINGLE => NumClass::Single,
        mi::DOUBLE => NumClass::Double,
        mi::INT64 => NumClass::Int64,
        mi::UINT64 => NumClass::UInt64,
        mi::UTF8 => {
            let s = std::str::from_utf8(raw)
                .map_err(|e| MatError::Corrupt(format!("invalid UTF-8 char data: {e}")))?;
            return Ok(s.chars().map(|ch| ch as u32 as f64).collect());
        }
        other => {
            return Err(MatError::Unsupported(format!("data element type {other}")));
        }
    };
    class.decode(raw, big_endian)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mat::testkit::{Field, Level5Writer};

    fn read(bytes: &[u8]) -> MatResult<Vec<MatValue>> {
        Level5Format.read_fields(bytes, "cjdata", &["PID", "label", "image"])
    }

    fn sample(w: Level5Writer) -> Vec<u8> {
        w.struct_var(
            "cjdata",
            &[
                ("PID", Field::Char("P10")),
                ("label", Field::Double(vec![1], vec![2.0])),
                ("image", Field::Int16(vec![2, 3], vec![1, 2, 3, 4, 5, 6])),
            ],
        )
    }

    #[test]
    fn test_plain_little_endian() {
        let values = read(&sample(Level5Writer::new())).unwrap();
        let pid = values[0].as_numeric().unwrap();
        assert_eq!(pid.class(), NumClass::UInt16);
        assert_eq!(pid.shape(), &[3, 1]);
        assert_eq!(pid.data(), &[80.0, 49.0, 48.0]);
        assert_eq!(values[1].as_numeric().unwrap().data(), &[2.0]);

        let image = values[2].as_numeric().unwrap();
        assert_eq!(image.class(), NumClass::Int16);
        assert_eq!(image.shape(), &[3, 2]);
        assert_eq!(image.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_compressed_and_big_endian() {
        let plain = read(&sample(Level5Writer::new())).unwrap();
        let zipped = read(&sample(Level5Writer::new().compressed())).unwrap();
        let be = read(&sample(Level5Writer::new().big_endian())).unwrap();
        assert_eq!(plain, zipped);
        assert_eq!(plain, be);
    }

    #[test]
    fn test_missing_pieces() {
        let bytes = sample(Level5Writer::new());
        assert!(matches!(
            Level5Format.read_fields(&bytes, "other", &["PID"]),
            Err(MatError::MissingVariable(_))
        ));
        assert!(matches!(
            Level5Format.read_fields(&bytes, "cjdata", &["tumorMask"]),
            Err(MatError::MissingField(_))
        ));
    }

    #[test]
    fn test_bad_header() {
        assert!(matches!(read(&[0u8; 10]), Err(MatError::Truncated)));
        assert!(matches!(
            read(&[0u8; 200]),
            Err(MatError::BadSignature(_))
        ));

        let mut v73 = sample(Level5Writer::new());
        v73[124] = 0x00;
        v73[125] = 0x02;
        assert!(matches!(read(&v73), Err(MatError::Unsupported(_))));
    }

    #[test]
    fn test_overflowing_dimensions() {
        let huge = [1usize << 30; 4];
        let fields = [("PID", Field::Char("P10"))];
        let bytes = Level5Writer::new().struct_var_with_dims("cjdata", &huge, &fields);
        assert!(matches!(
            Level5Format.read_fields(&bytes, "cjdata", &["PID"]),
            Err(MatError::Corrupt(_))
        ));

        let bytes = Level5Writer::new().struct_var(
            "cjdata",
            &[("image", Field::Int16(huge.to_vec(), vec![1, 2, 3]))],
        );
        assert!(matches!(
            Level5Format.read_fields(&bytes, "cjdata", &["image"]),
            Err(MatError::Corrupt(_))
        ));
    }

    #[test]
    fn test_empty_and_opaque_fields() {
        let bytes = Level5Writer::new().struct_var(
            "cjdata",
            &[
                ("PID", Field::Empty),
                ("label", Field::Cell),
                ("image", Field::Utf8("Añ")),
            ],
        );
        let values = read(&bytes).unwrap();
        assert!(values[0].as_numeric().unwrap().is_empty());
        assert_eq!(values[1], MatValue::Opaque("cell array"));
        assert_eq!(values[2].as_numeric().unwrap().data(), &[65.0, 241.0]);
    }
}
