//! 病人 ID 解码.
//!
//! 源文件中的病人 ID 通常是字符编码数组 (如 `[80, 49, 48]` 即 `"P10"`), 偶尔是单个数值.
//! 解码是全函数: 任何输入都得到一个字符串, 畸形输入得到哨兵值
//! [`UNKNOWN`](crate::consts::sentinel::UNKNOWN) 或 [`ERROR`](crate::consts::sentinel::ERROR).

use crate::consts::sentinel;
use crate::mat::{MatValue, NumClass};
use std::fmt;

/// 规范化的病人 ID.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatientId(String);

impl PatientId {
    /// 初始化.
    #[inline]
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// 哨兵值 `"Unknown"`.
    #[inline]
    pub fn unknown() -> Self {
        Self::new(sentinel::UNKNOWN)
    }

    /// 哨兵值 `"Error"`.
    #[inline]
    pub fn error() -> Self {
        Self::new(sentinel::ERROR)
    }

    /// 字符串形式.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 是否为哨兵值? 哨兵 ID 不参与按病人分组.
    #[inline]
    pub fn is_sentinel(&self) -> bool {
        sentinel::is_sentinel(&self.0)
    }

    /// 可用作文件名的形式: 路径分隔符替换为 `_`.
    pub fn file_stem(&self) -> String {
        self.0.replace(['/', '\\'], "_")
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PatientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PatientId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// 解码容器中的 `PID` 字段值.
pub fn decode(value: &MatValue) -> PatientId {
    match value {
        MatValue::Numeric(a) => decode_values(a.class(), a.data()),
        MatValue::Opaque(_) => PatientId::error(),
    }
}

/// 解码展平后的数值序列.
///
/// 1. 多于一个元素: 丢弃非正值 (含 NaN), 其余值向零截断后作为码位转换为字符, 去掉首尾空白;
/// 2. 恰好一个元素: 直接输出该值, 整数类型按整数输出, 浮点类型按 NumPy 风格输出 (`77.0`);
/// 3. 没有元素: `"Unknown"`;
/// 4. 码位无效 (含无穷大): `"Error"`.
pub fn decode_values(class: NumClass, values: &[f64]) -> PatientId {
    match values {
        [] => PatientId::unknown(),
        [v] => PatientId::new(format_scalar(class, *v)),
        _ => {
            let mut s = String::with_capacity(values.len());
            for &v in values.iter().filter(|&&v| v > 0.0) {
                let code = v.trunc();
                if code > u32::MAX as f64 {
                    return PatientId::error();
                }
                match char::from_u32(code as u32) {
                    Some(ch) => s.push(ch),
                    None => return PatientId::error(),
                }
            }
            PatientId::new(s.trim())
        }
    }
}

/// 按 NumPy 标量的 `str()` 风格格式化单个值.
fn format_scalar(class: NumClass, v: f64) -> String {
    if !class.is_float() {
        return format!("{v:.0}");
    }
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let abs = v.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let raw = if class == NumClass::Single {
            format!("{:e}", v as f32)
        } else {
            format!("{v:e}")
        };
        // Rust: `1.5e-5`, NumPy: `1.5e-05`.
        return match raw.split_once('e') {
            Some((mantissa, exp)) => {
                let (sign, digits) = match exp.strip_prefix('-') {
                    Some(d) => ('-', d),
                    None => ('+', exp),
                };
                format!("{mantissa}e{sign}{digits:0>2}")
            }
            None => raw,
        };
    }
    if class == NumClass::Single {
        format!("{:?}", v as f32)
    } else {
        format!("{v:?}")
    }
}
