use crate::archive::Naming;
use crate::consts::{IMAGE_SIZE, MIN_EXPECTED_PATIENTS};
use crate::geometry::MaskPolicy;
use crate::group::GroupBy;
use std::path::{Path, PathBuf};

/// 一次运行的配置.
///
/// 以默认值创建, 再按需用 builder 风格的方法修改.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineConfig {
    source: PathBuf,
    output: PathBuf,
    group_by: GroupBy,
    mask_policy: MaskPolicy,
    naming: Naming,
    size: usize,
    parallel: bool,
    min_expected_patients: usize,
}

impl PipelineConfig {
    /// 以源目录与输出根目录初始化, 其余取默认值:
    /// 按病人分组, 掩码单独保存, 英文命名, 边长 128, 顺序执行, 病人数阈值 200.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(source: P, output: Q) -> Self {
        Self {
            source: source.as_ref().to_owned(),
            output: output.as_ref().to_owned(),
            group_by: GroupBy::default(),
            mask_policy: MaskPolicy::default(),
            naming: Naming::default(),
            size: IMAGE_SIZE,
            parallel: false,
            min_expected_patients: MIN_EXPECTED_PATIENTS,
        }
    }

    /// 设置分组方式.
    pub fn group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = group_by;
        self
    }

    /// 设置掩码策略.
    pub fn mask_policy(mut self, policy: MaskPolicy) -> Self {
        self.mask_policy = policy;
        self
    }

    /// 设置命名方式.
    pub fn naming(mut self, naming: Naming) -> Self {
        self.naming = naming;
        self
    }

    /// 设置输出边长. 0 会在运行时报错.
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// 是否并行解码. 需要 `rayon` feature, 否则退化为顺序执行.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// 设置病人数阈值. 按病人分组时病人数低于该值会给出警告.
    pub fn min_expected_patients(mut self, n: usize) -> Self {
        self.min_expected_patients = n;
        self
    }

    /// 源目录.
    #[inline]
    pub fn source_dir(&self) -> &Path {
        &self.source
    }

    /// 输出根目录.
    #[inline]
    pub fn output_dir(&self) -> &Path {
        &self.output
    }

    /// 分组方式.
    #[inline]
    pub fn grouping(&self) -> GroupBy {
        self.group_by
    }

    /// 掩码策略.
    #[inline]
    pub fn policy(&self) -> MaskPolicy {
        self.mask_policy
    }

    /// 命名方式.
    #[inline]
    pub fn archive_naming(&self) -> Naming {
        self.naming
    }

    /// 输出边长.
    #[inline]
    pub fn image_size(&self) -> usize {
        self.size
    }

    /// 是否请求并行解码?
    #[inline]
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// 病人数阈值.
    #[inline]
    pub fn patient_threshold(&self) -> usize {
        self.min_expected_patients
    }
}
