//! 双格式记录读取.
//!
//! 每个源文件保存一个 MATLAB 结构体 `cjdata`. 文件可能是 v7.3 (HDF5) 格式,
//! 也可能是传统的 level-5 格式; 先按前者读取, 失败后再按后者读取, 每个文件至多尝试两次.
//! 两种格式得到的数组方向一致, 下游代码无需区分文件格式.

pub(crate) mod cursor;
mod error;
mod hdf5;
mod level5;
mod value;

#[cfg(test)]
pub(crate) mod testkit;

pub use error::{MatError, MatResult, ReadRecordError};
pub use hdf5::Hdf5Format;
pub use level5::Level5Format;
pub use value::{MatArray, MatValue, NumClass};

use crate::consts::{field, RECORD_VAR};
use crate::pid::{self, PatientId};
use num::ToPrimitive;
use std::io::Read;
use std::path::Path;

/// 成功解码记录的容器格式.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FormatKind {
    /// MATLAB v7.3, 即 HDF5.
    Hdf5,

    /// MATLAB level-5 MAT-file.
    Level5,
}

impl FormatKind {
    /// 诊断报告中使用的名称.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hdf5 => "hdf5",
            Self::Level5 => "level5",
        }
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一种容器格式的读取策略.
pub trait ContainerFormat {
    /// 格式种类.
    fn kind(&self) -> FormatKind;

    /// 读取结构体变量 `var` 的字段 `fields`, 返回值与 `fields` 顺序一致.
    ///
    /// 文件不属于该格式、变量或字段不存在时返回 `Err`.
    fn read_fields(&self, bytes: &[u8], var: &str, fields: &[&str]) -> MatResult<Vec<MatValue>>;
}

/// 按优先级依次尝试两种格式.
///
/// 全部失败时返回 [`ReadRecordError::Unreadable`], 其中携带两种格式各自的错误.
pub fn read_fields(
    bytes: &[u8],
    var: &str,
    fields: &[&str],
) -> Result<(Vec<MatValue>, FormatKind), ReadRecordError> {
    let hdf5 = match Hdf5Format.read_fields(bytes, var, fields) {
        Ok(values) => return Ok((values, Hdf5Format.kind())),
        Err(e) => e,
    };
    match Level5Format.read_fields(bytes, var, fields) {
        Ok(values) => Ok((values, Level5Format.kind())),
        Err(level5) => Err(ReadRecordError::Unreadable { hdf5, level5 }),
    }
}

/// 一个源文件中的原始记录.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRecord {
    /// MRI 图像, 原始分辨率和元素类型.
    pub image: MatArray,

    /// 肿瘤掩码, 与图像同尺寸.
    pub mask: MatArray,

    /// 诊断标签. 此处不检查取值范围.
    pub label: i64,

    /// 解码后的病人 ID, 可能是哨兵值.
    pub patient_id: PatientId,

    /// 成功解码该记录的容器格式.
    pub format: FormatKind,
}

impl RawRecord {
    /// 从内存中的文件内容解码.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReadRecordError> {
        let (values, format) = read_fields(bytes, RECORD_VAR, &field::RECORD)?;
        let [pid, label, image, mask]: [MatValue; 4] = values
            .try_into()
            .map_err(|_| ReadRecordError::Field {
                field: RECORD_VAR,
                error: MatError::Corrupt("wrong number of fields".to_string()),
            })?;

        Ok(Self {
            label: coerce_label(&label).map_err(|error| ReadRecordError::Field {
                field: field::LABEL,
                error,
            })?,
            image: image.into_numeric().map_err(|error| ReadRecordError::Field {
                field: field::IMAGE,
                error,
            })?,
            mask: mask.into_numeric().map_err(|error| ReadRecordError::Field {
                field: field::TUMOR_MASK,
                error,
            })?,
            patient_id: pid::decode(&pid),
            format,
        })
    }
}

/// 读取并解码一个源文件.
pub fn read_record<P: AsRef<Path>>(path: P) -> Result<RawRecord, ReadRecordError> {
    RawRecord::from_bytes(&std::fs::read(path)?)
}

/// 只含病人 ID 与标签的轻量记录.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordMeta {
    /// 诊断标签.
    pub label: i64,

    /// 解码后的病人 ID.
    pub patient_id: PatientId,

    /// 成功解码该记录的容器格式.
    pub format: FormatKind,
}

impl RecordMeta {
    /// 从内存中的文件内容解码.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReadRecordError> {
        let (values, format) = read_fields(bytes, RECORD_VAR, &field::META)?;
        let (pid, label) = match values.as_slice() {
            [pid, label] => (pid, label),
            _ => {
                return Err(ReadRecordError::Field {
                    field: RECORD_VAR,
                    error: MatError::Corrupt("wrong number of fields".to_string()),
                })
            }
        };
        Ok(Self {
            label: coerce_label(label).map_err(|error| ReadRecordError::Field {
                field: field::LABEL,
                error,
            })?,
            patient_id: pid::decode(pid),
            format,
        })
    }
}

/// 只读取源文件中的病人 ID 与标签.
pub fn read_meta<P: AsRef<Path>>(path: P) -> Result<RecordMeta, ReadRecordError> {
    RecordMeta::from_bytes(&std::fs::read(path)?)
}

/// 将标签值转换为整数: 取展平后的第一个元素并向零截断.
///
/// 空数组、非数值、非有限值返回 `Err`.
pub fn coerce_label(value: &MatValue) -> MatResult<i64> {
    let array = value.as_numeric()?;
    let first = *array
        .data()
        .first()
        .ok_or_else(|| MatError::Corrupt("empty label".to_string()))?;
    first
        .trunc()
        .to_i64()
        .ok_or_else(|| MatError::Corrupt(format!("label {first} is not a finite integer")))
}

/// zlib 解压. 两种容器格式共用.
pub(crate) fn inflate(data: &[u8]) -> MatResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len().saturating_mul(4));
    flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(MatError::Decompress)?;
    Ok(out)
}
