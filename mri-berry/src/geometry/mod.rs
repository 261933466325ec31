//! 几何归一化: 将图像与掩码缩放到固定的正方形尺寸, 并确定存储类型.

mod resize;
mod window;

pub use resize::{resize, resize_bicubic, resize_nearest, Interpolation};
pub use window::IntensityWindow;

use crate::consts::IMAGE_SIZE;
use crate::mat::{MatArray, RawRecord};
use ndarray::Array2;
use std::fmt;

/// 掩码处理策略.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MaskPolicy {
    /// 图像与掩码分别保存.
    #[default]
    KeepMaskSeparate,

    /// 图像先按最小-最大值线性映射到 `[0, 255]`, 再逐元素乘以掩码; 不单独保存掩码.
    ApplyMaskToImage,
}

/// 归一化后的记录.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedRecord {
    /// `S × S` 图像.
    pub image: Array2<f32>,

    /// `S × S` 掩码. [`MaskPolicy::ApplyMaskToImage`] 下为 `None`.
    pub mask: Option<Array2<u8>>,

    /// 诊断标签.
    pub label: i64,
}

/// 归一化错误.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// 数组不是二维网格 (除多余的单例维度外).
    NotTwoDimensional {
        /// 字段名.
        field: &'static str,
        /// 行优先形状.
        shape: Vec<usize>,
    },

    /// 网格为空.
    Empty {
        /// 字段名.
        field: &'static str,
    },

    /// 图像与掩码尺寸不一致.
    ShapeMismatch {
        /// 图像尺寸.
        image: (usize, usize),
        /// 掩码尺寸.
        mask: (usize, usize),
    },
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotTwoDimensional { field, shape } => {
                write!(f, "`{field}` of shape {shape:?} is not a 2-D grid")
            }
            Self::Empty { field } => write!(f, "`{field}` is empty"),
            Self::ShapeMismatch { image, mask } => {
                write!(f, "image {image:?} and mask {mask:?} differ in size")
            }
        }
    }
}

impl std::error::Error for NormalizeError {}

/// 几何归一化器.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Normalizer {
    size: usize,
    policy: MaskPolicy,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            size: IMAGE_SIZE,
            policy: MaskPolicy::default(),
        }
    }
}

impl Normalizer {
    /// 初始化. `size` 为 0 时返回 `None`.
    pub fn new(size: usize, policy: MaskPolicy) -> Option<Self> {
        (size > 0).then_some(Self { size, policy })
    }

    /// 输出边长.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// 掩码策略.
    #[inline]
    pub fn policy(&self) -> MaskPolicy {
        self.policy
    }

    /// 归一化一条记录.
    ///
    /// 图像使用双三次插值; 整数类型的源图像先四舍五入 (偶数舍入) 并饱和到源类型范围,
    /// 再转换为 `f32`. 掩码使用最近邻插值并转换为 `u8`.
    pub fn normalize(&self, record: &RawRecord) -> Result<NormalizedRecord, NormalizeError> {
        let image = grid(&record.image, "image")?;
        let mask = grid(&record.mask, "tumorMask")?;
        if image.dim() != mask.dim() {
            return Err(NormalizeError::ShapeMismatch {
                image: image.dim(),
                mask: mask.dim(),
            });
        }

        let dst = (self.size, self.size);
        let resized = resize_bicubic(image.view(), dst);
        let mut image = match record.image.class().int_range() {
            Some((lo, hi)) => resized.mapv(|v| v.round_ties_even().clamp(lo, hi) as f32),
            None => resized.mapv(|v| v as f32),
        };
        let mask = resize_nearest(mask.view(), dst).mapv(|v| v as u8);

        let mask = match self.policy {
            MaskPolicy::KeepMaskSeparate => Some(mask),
            MaskPolicy::ApplyMaskToImage => {
                match IntensityWindow::from_min_max(image.iter().copied()) {
                    Some(window) => {
                        image.zip_mut_with(&mask, |v, &m| {
                            *v = window.eval_f32(*v).unwrap_or(0.0) * f32::from(m);
                        });
                    }
                    None => image.fill(0.0),
                }
                None
            }
        };

        Ok(NormalizedRecord {
            image,
            mask,
            label: record.label,
        })
    }
}

fn grid(array: &MatArray, field: &'static str) -> Result<Array2<f64>, NormalizeError> {
    let grid = array
        .to_array2()
        .ok_or_else(|| NormalizeError::NotTwoDimensional {
            field,
            shape: array.shape().to_vec(),
        })?;
    if grid.is_empty() {
        return Err(NormalizeError::Empty { field });
    }
    Ok(grid)
}
