//! 每个病人切片数的统计, 基于按病人分组写出的归档.

use crate::archive::{NpzArchive, Naming};
use crate::consts::TumorType;
use image::{ImageResult, Rgb, RgbImage};
use std::io::{self, Write};
use std::path::Path;

/// 单个肿瘤类型的切片数统计.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SliceCounts {
    /// 肿瘤类型.
    pub tumor: TumorType,

    /// 每个病人的切片数, 按文件名排序.
    pub counts: Vec<usize>,
}

impl SliceCounts {
    /// 病人数.
    #[inline]
    pub fn patients(&self) -> usize {
        self.counts.len()
    }

    /// 最少切片数.
    pub fn min(&self) -> Option<usize> {
        self.counts.iter().copied().min()
    }

    /// 最多切片数.
    pub fn max(&self) -> Option<usize> {
        self.counts.iter().copied().max()
    }

    /// 平均切片数.
    pub fn mean(&self) -> Option<f64> {
        if self.counts.is_empty() {
            return None;
        }
        Some(self.counts.iter().sum::<usize>() as f64 / self.counts.len() as f64)
    }

    /// 样本标准差 (分母 `n - 1`). 少于两个病人时为 `None`.
    pub fn stdev(&self) -> Option<f64> {
        let n = self.counts.len();
        if n < 2 {
            return None;
        }
        let mean = self.mean()?;
        let ss: f64 = self.counts.iter().map(|&c| (c as f64 - mean).powi(2)).sum();
        Some((ss / (n - 1) as f64).sqrt())
    }
}

/// 切片数报告.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SliceReport {
    per_tumor: Vec<SliceCounts>,
    failures: usize,
}

impl SliceReport {
    /// 读取 `root` 下每个肿瘤类型目录中的病人归档.
    ///
    /// 缺失的类型目录会被跳过; 无法读取的归档记录警告并计数.
    pub fn collect<P: AsRef<Path>>(root: P, naming: Naming) -> Self {
        let root = root.as_ref();
        let mut failures = 0;
        let per_tumor = TumorType::ALL
            .into_iter()
            .map(|tumor| {
                let dir = root.join(tumor.dir_name());
                let mut counts = Vec::new();
                let Ok(entries) = std::fs::read_dir(&dir) else {
                    log::info!("no directory for {tumor}, skipping");
                    return SliceCounts { tumor, counts };
                };
                let mut files: Vec<_> = entries
                    .filter_map(Result::ok)
                    .map(|e| e.path())
                    .filter(|p| is_archive(p))
                    .collect();
                files.sort();
                for file in files {
                    match NpzArchive::open(&file) {
                        Ok(mut archive) => match archive.slice_count(naming) {
                            Ok(n) => counts.push(n),
                            Err(e) => {
                                failures += 1;
                                log::warn!("cannot read images of {}: {e}", file.display());
                            }
                        },
                        Err(e) => {
                            failures += 1;
                            log::warn!("cannot open {}: {e}", file.display());
                        }
                    }
                }
                SliceCounts { tumor, counts }
            })
            .collect();
        Self {
            per_tumor,
            failures,
        }
    }

    /// 各肿瘤类型的统计, 顺序同 [`TumorType::ALL`].
    #[inline]
    pub fn per_tumor(&self) -> &[SliceCounts] {
        &self.per_tumor
    }

    /// 无法读取的归档数.
    #[inline]
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// 是否没有任何数据?
    pub fn is_empty(&self) -> bool {
        self.per_tumor.iter().all(|s| s.counts.is_empty())
    }

    /// 将报告写进 `w` 中.
    pub fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        const S4: &str = "    ";

        writeln!(w, "Slices per patient:")?;
        for s in self.per_tumor.iter() {
            writeln!(w, "Tumor: {}", s.tumor)?;
            let (Some(min), Some(max), Some(mean)) = (s.min(), s.max(), s.mean()) else {
                writeln!(w, "{S4}No data found.")?;
                continue;
            };
            writeln!(w, "{S4}Patients: {}", s.patients())?;
            writeln!(w, "{S4}Min slices per patient: {min}")?;
            writeln!(w, "{S4}Max slices per patient: {max}")?;
            writeln!(w, "{S4}Mean slices per patient: {mean:.2}")?;
            if let Some(sd) = s.stdev() {
                writeln!(w, "{S4}Standard deviation: {sd:.2}")?;
            }
        }
        write!(w, "Unreadable archives: {}", self.failures)?;
        Ok(())
    }

    /// 绘制切片数直方图: 每个切片数一个分箱, 每个肿瘤类型一种颜色.
    ///
    /// 没有数据时返回 `None`.
    pub fn histogram(&self) -> Option<RgbImage> {
        const BAR: u32 = 6;
        const GAP: u32 = 4;
        const MARGIN: u32 = 20;
        const PLOT_HEIGHT: u32 = 300;
        const COLORS: [Rgb<u8>; 3] = [Rgb([228, 26, 28]), Rgb([55, 126, 184]), Rgb([77, 175, 74])];
        const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
        const AXIS: Rgb<u8> = Rgb([0, 0, 0]);

        let lo = self.per_tumor.iter().filter_map(SliceCounts::min).min()?;
        let hi = self.per_tumor.iter().filter_map(SliceCounts::max).max()?;
        let bins = hi - lo + 1;
        let freq: Vec<Vec<u32>> = self
            .per_tumor
            .iter()
            .map(|s| {
                let mut f = vec![0u32; bins];
                for &c in s.counts.iter() {
                    f[c - lo] += 1;
                }
                f
            })
            .collect();
        let peak = freq.iter().flatten().copied().max().unwrap_or(0).max(1);

        let series = freq.len() as u32;
        let bin_width = series * BAR + GAP;
        let width = 2 * MARGIN + bins as u32 * bin_width;
        let height = 2 * MARGIN + PLOT_HEIGHT;
        let base = MARGIN + PLOT_HEIGHT;
        let mut img = RgbImage::from_pixel(width, height, BACKGROUND);

        for (k, f) in freq.iter().enumerate() {
            let color = COLORS[k % COLORS.len()];
            for (b, &n) in f.iter().enumerate() {
                let bar = n * PLOT_HEIGHT / peak;
                let x0 = MARGIN + b as u32 * bin_width + k as u32 * BAR;
                for x in x0..x0 + BAR {
                    for y in base - bar..base {
                        img.put_pixel(x, y, color);
                    }
                }
            }
        }
        for x in MARGIN..width - MARGIN {
            img.put_pixel(x, base, AXIS);
        }
        for y in MARGIN..=base {
            img.put_pixel(MARGIN - 1, y, AXIS);
        }
        Some(img)
    }

    /// 保存直方图. 没有数据时不写文件并返回 `Ok(false)`.
    pub fn save_histogram<P: AsRef<Path>>(&self, path: P) -> ImageResult<bool> {
        match self.histogram() {
            Some(img) => img.save(path).map(|_| true),
            None => Ok(false),
        }
    }
}

/// 是否为已完成的 `.npz` 归档 (排除 `.partial` 临时文件与隐藏文件)?
fn is_archive(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".npz") && !n.starts_with('.'))
}
