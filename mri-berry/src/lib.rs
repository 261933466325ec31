#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 将脑肿瘤 MRI 数据集 (每个记录一个 `.mat` 文件) 转换为按病人或按肿瘤类型
//! 分组的压缩 `.npz` 归档, 并提供数据集诊断与切片统计.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 容器读取器只实现了到达 `cjdata.{PID,label,image,tumorMask}` 所需的格式子集,
//!   不是通用的 MAT-file / HDF5 库.
//! 2. 单个文件的任何问题都不会中止运行, 只会被计数并记录日志.
//!
//! # 开发计划
//!
//! ### 双格式记录读取 ✅
//!
//! 先按 MATLAB v7.3 (HDF5) 解析, 失败后再按 level-5 MAT-file 解析.
//! 支持 HDF5 的旧式/新式分组、连续与分块存储, 以及 deflate/shuffle/fletcher32 过滤器;
//! 支持 level-5 的压缩元素与大小端.
//!
//! 实现位于 `mri-berry/src/mat`.
//!
//! ### 病人 ID 解码 ✅
//!
//! 字符编码数组 → 字符串; 单个数值按 NumPy 风格输出; 畸形输入得到哨兵值.
//!
//! 实现位于 `mri-berry/src/pid.rs`.
//!
//! ### 几何归一化 ✅
//!
//! 与 OpenCV 一致的双三次/最近邻缩放, 以及两种掩码策略.
//!
//! 实现位于 `mri-berry/src/geometry`.
//!
//! ### 聚合与归档 ✅
//!
//! 1. 首次出现顺序的分组, 首个标签优先并统计不一致标签. ✅
//! 2. 原子写出 (`.partial` + 重命名). ✅
//! 3. 英文/西班牙文命名. ✅
//!
//! 实现位于 `mri-berry/src/group` 与 `mri-berry/src/archive`.
//!
//! ### 流水线 ✅
//!
//! 顺序或 `rayon` 并行解码, 结果按发现顺序汇入单一聚合器.
//!
//! 实现位于 `mri-berry/src/pipeline`.
//!
//! ### 诊断与统计 ✅
//!
//! CSV 诊断报告; 每个病人切片数的统计与直方图.
//!
//! 实现位于 `mri-berry/src/diagnose.rs` 与 `mri-berry/src/stats.rs`.

pub mod archive;
pub mod consts;
pub mod dataset;
pub mod diagnose;
pub mod geometry;
pub mod group;
pub mod mat;
pub mod pid;
pub mod pipeline;
pub mod prelude;
pub mod stats;
