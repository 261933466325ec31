//! 容器解码错误.

use std::fmt;

/// 单一容器格式下的解码错误.
#[derive(Debug)]
pub enum MatError {
    /// 文件签名或文件头不符合该格式.
    BadSignature(&'static str),

    /// 数据在预期位置之前结束.
    Truncated,

    /// 格式合法, 但使用了本 crate 不支持的版本或特性.
    Unsupported(String),

    /// 结构自相矛盾.
    Corrupt(String),

    /// 找不到指定变量 / 组.
    MissingVariable(String),

    /// 结构体中找不到指定字段.
    MissingField(String),

    /// 期望数值数组, 实际得到其他类型的值.
    NotNumeric(&'static str),

    /// 解压错误.
    Decompress(std::io::Error),
}

/// 容器解码结果.
pub type MatResult<T> = Result<T, MatError>;

impl fmt::Display for MatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSignature(what) => write!(f, "bad signature: {what}"),
            Self::Truncated => f.write_str("unexpected end of data"),
            Self::Unsupported(what) => write!(f, "unsupported: {what}"),
            Self::Corrupt(what) => write!(f, "corrupt structure: {what}"),
            Self::MissingVariable(name) => write!(f, "variable `{name}` not found"),
            Self::MissingField(name) => write!(f, "field `{name}` not found"),
            Self::NotNumeric(kind) => write!(f, "expected a numeric array, found {kind}"),
            Self::Decompress(e) => write!(f, "decompression failed: {e}"),
        }
    }
}

impl std::error::Error for MatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decompress(e) => Some(e),
            _ => None,
        }
    }
}

/// 读取一条记录的错误. 每个文件至多尝试两种格式.
#[derive(Debug)]
pub enum ReadRecordError {
    /// 文件本身无法读取.
    Io(std::io::Error),

    /// 两种容器格式都无法解码. 依次为 HDF5 格式和 level-5 格式下的错误.
    Unreadable {
        /// MATLAB v7.3 (HDF5) 格式下的错误.
        hdf5: MatError,

        /// MATLAB level-5 格式下的错误.
        level5: MatError,
    },

    /// 容器可以解码, 但某个字段的值不可用 (标签无法转换为整数, 图像不是数值数组等).
    Field {
        /// 字段名.
        field: &'static str,

        /// 具体原因.
        error: MatError,
    },
}

impl fmt::Display for ReadRecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read file: {e}"),
            Self::Unreadable { hdf5, level5 } => {
                write!(f, "not readable as v7.3 ({hdf5}) nor as level 5 ({level5})")
            }
            Self::Field { field, error } => write!(f, "invalid field `{field}`: {error}"),
        }
    }
}

impl std::error::Error for ReadRecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Unreadable { level5, .. } => Some(level5),
            Self::Field { error, .. } => Some(error),
        }
    }
}

impl From<std::io::Error> for ReadRecordError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
