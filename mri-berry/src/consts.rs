//! 通用常量.

/// 归一化后图像与掩码的默认边长 (像素).
pub const IMAGE_SIZE: usize = 128;

/// 参考数据集中的病人总数.
pub const EXPECTED_PATIENTS: usize = 233;

/// 恢复出的唯一病人数低于该值时, 运行总结会给出警告.
pub const MIN_EXPECTED_PATIENTS: usize = 200;

/// 源文件后缀. 大小写敏感.
pub const MAT_SUFFIX: &str = ".mat";

/// 容器中保存记录的 MATLAB 结构体变量名.
pub const RECORD_VAR: &str = "cjdata";

/// `cjdata` 结构体的字段名.
pub mod field {
    /// 病人 ID. 通常是字符编码数组, 偶尔是单个数值.
    pub const PID: &str = "PID";

    /// 诊断标签, 取值 1, 2, 3.
    pub const LABEL: &str = "label";

    /// MRI 图像.
    pub const IMAGE: &str = "image";

    /// 肿瘤掩码.
    pub const TUMOR_MASK: &str = "tumorMask";

    /// 一条完整记录需要的所有字段, 按读取顺序排列.
    pub const RECORD: [&str; 4] = [PID, LABEL, IMAGE, TUMOR_MASK];

    /// 诊断扫描只需要的字段.
    pub const META: [&str; 2] = [PID, LABEL];
}

/// 病人 ID 的哨兵值.
pub mod sentinel {
    /// ID 数组为空.
    pub const UNKNOWN: &str = "Unknown";

    /// ID 无法解码.
    pub const ERROR: &str = "Error";

    /// `id` 是否为哨兵值?
    #[inline]
    pub fn is_sentinel(id: &str) -> bool {
        matches!(id, UNKNOWN | ERROR)
    }
}

/// 肿瘤类型. 判别值即数据集中的标签值.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TumorType {
    /// 脑膜瘤, 标签 1.
    Meningioma = 1,

    /// 胶质瘤, 标签 2.
    Glioma = 2,

    /// 垂体腺瘤, 标签 3.
    Pituitary = 3,
}

impl TumorType {
    /// 按标签升序排列的所有肿瘤类型.
    pub const ALL: [TumorType; 3] = [Self::Meningioma, Self::Glioma, Self::Pituitary];

    /// 由标签值获得肿瘤类型. 标签不在 {1, 2, 3} 内时返回 `None`.
    #[inline]
    pub const fn from_label(label: i64) -> Option<Self> {
        match label {
            1 => Some(Self::Meningioma),
            2 => Some(Self::Glioma),
            3 => Some(Self::Pituitary),
            _ => None,
        }
    }

    /// 数据集中的标签值.
    #[inline]
    pub const fn label(self) -> i64 {
        self as i64
    }

    /// 输出目录名, 同时也是按肿瘤归档时的文件名前缀.
    #[inline]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Meningioma => "Meningioma",
            Self::Glioma => "Glioma",
            Self::Pituitary => "Adenoma_hipofisario",
        }
    }
}

impl std::fmt::Display for TumorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}
