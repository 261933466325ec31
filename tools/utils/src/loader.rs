//! 对 `mri-berry::dataset` 的更一层封装. 提供数据集与输出目录的默认位置.

use std::env;
use std::path::PathBuf;

/// 数据集目录的环境变量名.
pub const DATASET_ENV: &str = "MRI_DATASET_DIR";

/// 获取原始数据集目录.
///
/// 1. 若环境变量 `$MRI_DATASET_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/Tumores`;
/// 3. 无法确定用户主目录时返回 `None`.
pub fn source_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var(DATASET_ENV) {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => mri_berry::dataset::home_dataset_dir_with(["Tumores"]),
    }
}

/// 按病人分组时的默认输出目录名.
pub const PATIENT_OUTPUT_DIR: &str = "Preprocesamiento_por_paciente";

/// 按肿瘤类型分组时的默认输出目录名.
pub const TUMOR_OUTPUT_DIR: &str = "preprocessed_data_por_tumor";

/// 诊断 CSV 的默认文件名.
pub const DIAGNOSTIC_CSV: &str = "reporte_dataset.csv";

/// 统计直方图的默认文件名.
pub const HISTOGRAM_PNG: &str = "distribucion_cortes_por_paciente.png";

/// 统计输出的默认目录名.
pub const ANALYSIS_OUTPUT_DIR: &str = "analisis_output";
