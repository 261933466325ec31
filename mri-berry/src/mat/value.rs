//! 容器解码后的统一值表示.

use super::error::{MatError, MatResult};
use ndarray::Array2;

/// 数值元素类型. 与 MATLAB 的数值类一一对应.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumClass {
    /// `int8`.
    Int8,
    /// `uint8`, 也用于 `logical`.
    UInt8,
    /// `int16`.
    Int16,
    /// `uint16`, 也用于 `char`.
    UInt16,
    /// `int32`.
    Int32,
    /// `uint32`.
    UInt32,
    /// `int64`.
    Int64,
    /// `uint64`.
    UInt64,
    /// `single`.
    Single,
    /// `double`.
    Double,
}

impl NumClass {
    /// 由存储属性构造. 不支持的组合返回 `None`.
    pub fn from_parts(float: bool, signed: bool, size: usize) -> Option<Self> {
        use NumClass::*;
        Some(match (float, signed, size) {
            (true, _, 4) => Single,
            (true, _, 8) => Double,
            (false, true, 1) => Int8,
            (false, false, 1) => UInt8,
            (false, true, 2) => Int16,
            (false, false, 2) => UInt16,
            (false, true, 4) => Int32,
            (false, false, 4) => UInt32,
            (false, true, 8) => Int64,
            (false, false, 8) => UInt64,
            _ => return None,
        })
    }

    /// 单个元素的字节数.
    pub const fn size(self) -> usize {
        use NumClass::*;
        match self {
            Int8 | UInt8 => 1,
            Int16 | UInt16 => 2,
            Int32 | UInt32 | Single => 4,
            Int64 | UInt64 | Double => 8,
        }
    }

    /// 是否为浮点类型?
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Single | Self::Double)
    }

    /// 是否为有符号类型 (浮点类型视为有符号)?
    #[inline]
    pub const fn is_signed(self) -> bool {
        !matches!(
            self,
            Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64
        )
    }

    /// 整数类型的取值范围 `[min, max]`. 浮点类型返回 `None`.
    pub fn int_range(self) -> Option<(f64, f64)> {
        use NumClass::*;
        Some(match self {
            Int8 => (i8::MIN as f64, i8::MAX as f64),
            UInt8 => (0.0, u8::MAX as f64),
            Int16 => (i16::MIN as f64, i16::MAX as f64),
            UInt16 => (0.0, u16::MAX as f64),
            Int32 => (i32::MIN as f64, i32::MAX as f64),
            UInt32 => (0.0, u32::MAX as f64),
            Int64 => (i64::MIN as f64, i64::MAX as f64),
            UInt64 => (0.0, u64::MAX as f64),
            Single | Double => return None,
        })
    }

    /// 将 `bytes` 按该类型和字节序解码为 `f64` 序列.
    ///
    /// `bytes` 长度必须是元素大小的整数倍, 否则返回 `Err`.
    /// 64 位整数超出 `2^53` 的部分会损失精度.
    pub(crate) fn decode(self, bytes: &[u8], big_endian: bool) -> MatResult<Vec<f64>> {
        let size = self.size();
        if bytes.len() % size != 0 {
            return Err(MatError::Corrupt(format!(
                "{} bytes is not a multiple of element size {size}",
                bytes.len()
            )));
        }

        macro_rules! decode_as {
            ($t: ty) => {
                bytes
                    .chunks_exact(size)
                    .map(|c| {
                        let mut raw = [0u8; std::mem::size_of::<$t>()];
                        raw.copy_from_slice(c);
                        let v = if big_endian {
                            <$t>::from_be_bytes(raw)
                        } else {
                            <$t>::from_le_bytes(raw)
                        };
                        v as f64
                    })
                    .collect()
            };
        }

        use NumClass::*;
        Ok(match self {
            Int8 => decode_as!(i8),
            UInt8 => decode_as!(u8),
            Int16 => decode_as!(i16),
            UInt16 => decode_as!(u16),
            Int32 => decode_as!(i32),
            UInt32 => decode_as!(u32),
            Int64 => decode_as!(i64),
            UInt64 => decode_as!(u64),
            Single => decode_as!(f32),
            Double => decode_as!(f64),
        })
    }
}

/// 维度之积. 溢出时返回 `Corrupt`.
pub(crate) fn checked_numel(dims: &[usize]) -> MatResult<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| MatError::Corrupt(format!("dimensions {dims:?} overflow")))
}

/// 数值数组.
///
/// `shape` 是 **行优先** 形状, 即 MATLAB 维度的逆序; `data` 按存储顺序排列.
/// 这正是按 HDF5 方式读取 MATLAB 文件时得到的方向, 两种容器格式都统一到该方向.
#[derive(Clone, Debug, PartialEq)]
pub struct MatArray {
    class: NumClass,
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl MatArray {
    /// 初始化. `shape` 的元素积必须等于 `data` 的长度, 否则返回 `Err`.
    pub fn new(class: NumClass, shape: Vec<usize>, data: Vec<f64>) -> MatResult<Self> {
        let expected = checked_numel(&shape)?;
        if expected != data.len() {
            return Err(MatError::Corrupt(format!(
                "shape {shape:?} expects {expected} elements, found {}",
                data.len()
            )));
        }
        Ok(Self { class, shape, data })
    }

    /// 由 MATLAB 维度 (列优先) 和存储顺序的数据构造.
    pub fn from_matlab_dims(class: NumClass, dims: &[usize], data: Vec<f64>) -> MatResult<Self> {
        Self::new(class, dims.iter().rev().copied().collect(), data)
    }

    /// 元素类型.
    #[inline]
    pub fn class(&self) -> NumClass {
        self.class
    }

    /// 行优先形状.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// 展平后的数据.
    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// 元素个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否没有元素?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 转换为二维网格.
    ///
    /// 除最后两维外, 其余维度必须都是 1 (MATLAB 的多余单例维度), 否则返回 `None`.
    pub fn to_array2(&self) -> Option<Array2<f64>> {
        let n = self.shape.len();
        if n < 2 || self.shape[..n - 2].iter().any(|&d| d != 1) {
            return None;
        }
        Array2::from_shape_vec((self.shape[n - 2], self.shape[n - 1]), self.data.clone()).ok()
    }
}

/// 容器中一个字段解码后的值.
#[derive(Clone, Debug, PartialEq)]
pub enum MatValue {
    /// 数值数组 (含 `char` 与 `logical`).
    Numeric(MatArray),

    /// 无法视为数值数组的值, 如结构体、元胞数组、引用等. 参数为类型描述.
    Opaque(&'static str),
}

impl MatValue {
    /// 获取数值数组. 非数值时返回 `Err`.
    pub fn as_numeric(&self) -> MatResult<&MatArray> {
        match self {
            Self::Numeric(a) => Ok(a),
            Self::Opaque(kind) => Err(MatError::NotNumeric(kind)),
        }
    }

    /// 消费自我, 获取数值数组. 非数值时返回 `Err`.
    pub fn into_numeric(self) -> MatResult<MatArray> {
        match self {
            Self::Numeric(a) => Ok(a),
            Self::Opaque(kind) => Err(MatError::NotNumeric(kind)),
        }
    }
}
