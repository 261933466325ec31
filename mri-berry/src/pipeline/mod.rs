//! 预处理流水线: 发现 → 读取 → 归一化 → 聚合 → 写出.
//!
//! 单个文件的任何失败都只计数并跳过; 只有源目录缺失、输出目录无法创建等启动问题会中止运行.

mod config;
mod summary;

pub use config::PipelineConfig;
pub use summary::RunSummary;

use crate::archive::{ArchiveWriter, WriteArchiveError, WriteOutcome};
use crate::dataset::{discover, record_loader};
use crate::geometry::{NormalizeError, NormalizedRecord, Normalizer};
use crate::group::{Aggregator, Group, GroupBy};
use crate::mat::{FormatKind, RawRecord, ReadRecordError};
use crate::pid::PatientId;
use log::{debug, error, info, warn};
use std::fmt;
use std::hash::Hash;
use std::io;
use std::path::{Path, PathBuf};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use crate::mat::read_record;
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    }
}

/// 中止运行的错误.
#[derive(Debug)]
pub enum PipelineError {
    /// 源目录不存在或不是目录.
    SourceMissing(PathBuf),

    /// 输出边长为 0.
    InvalidSize(usize),

    /// 无法创建输出目录.
    Output(io::Error),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceMissing(p) => write!(f, "source directory {} does not exist", p.display()),
            Self::InvalidSize(s) => write!(f, "invalid output size {s}"),
            Self::Output(e) => write!(f, "cannot prepare output directory: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Output(e) => Some(e),
            _ => None,
        }
    }
}

/// 单个文件的失败原因.
#[derive(Debug)]
enum FileError {
    Read(ReadRecordError),
    Geometry(NormalizeError),
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(e) => e.fmt(f),
            Self::Geometry(e) => e.fmt(f),
        }
    }
}

/// 成功读取并归一化的文件.
struct Loaded {
    patient_id: PatientId,
    format: FormatKind,
    record: NormalizedRecord,
}

fn load(raw: Result<RawRecord, ReadRecordError>, normalizer: &Normalizer) -> Result<Loaded, FileError> {
    let raw = raw.map_err(FileError::Read)?;
    let record = normalizer.normalize(&raw).map_err(FileError::Geometry)?;
    Ok(Loaded {
        patient_id: raw.patient_id,
        format: raw.format,
        record,
    })
}

impl RunSummary {
    fn account(&mut self, path: &Path, loaded: Result<Loaded, FileError>) -> Option<Loaded> {
        match loaded {
            Ok(l) => {
                match l.format {
                    FormatKind::Hdf5 => self.hdf5_records += 1,
                    FormatKind::Level5 => self.level5_records += 1,
                }
                debug!(
                    "{}: {} record, patient {}, label {}",
                    path.display(),
                    l.format,
                    l.patient_id,
                    l.record.label
                );
                Some(l)
            }
            Err(e) => {
                self.read_failures += 1;
                if matches!(e, FileError::Geometry(_)) {
                    self.geometry_failures += 1;
                }
                warn!("skipping {}: {e}", path.display());
                None
            }
        }
    }
}

/// 预处理流水线.
#[derive(Clone, Debug)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// 初始化.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// 运行配置.
    #[inline]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 完整运行一次, 返回统计结果.
    ///
    /// 聚合器由本次运行独占; 写出阶段逐个取出分组, 每个分组写完即释放.
    pub fn run(&self) -> Result<RunSummary, PipelineError> {
        let source = self.config.source_dir();
        if !source.is_dir() {
            return Err(PipelineError::SourceMissing(source.to_owned()));
        }
        let size = self.config.image_size();
        let normalizer =
            Normalizer::new(size, self.config.policy()).ok_or(PipelineError::InvalidSize(size))?;
        let mut writer = ArchiveWriter::new(self.config.output_dir(), self.config.archive_naming());
        writer.prepare().map_err(PipelineError::Output)?;

        let paths = discover(source);
        let mut summary = RunSummary::new(self.config.grouping());
        summary.files_discovered = paths.len();
        info!(
            "found {} .mat file(s) under {}, grouping by {}",
            paths.len(),
            source.display(),
            self.config.grouping()
        );

        match self.config.grouping() {
            GroupBy::Patient => {
                let mut agg = Aggregator::new();
                self.scan(paths, &normalizer, |path, loaded| {
                    let Some(l) = summary.account(path, loaded) else {
                        return;
                    };
                    if l.patient_id.is_sentinel() {
                        summary.sentinel_excluded += 1;
                        debug!("{}: patient ID is {}, excluded", path.display(), l.patient_id);
                        return;
                    }
                    agg.push(l.patient_id, l.record);
                });
                self.close_scan(&agg, &mut summary);

                let threshold = self.config.patient_threshold();
                if agg.len() < threshold {
                    warn!(
                        "only {} unique patient(s) recovered, expected at least {threshold}",
                        agg.len()
                    );
                }
                write_groups(agg.drain(), |g| writer.write_patient(g), &mut summary);
            }
            GroupBy::Tumor => {
                let mut agg = Aggregator::new();
                self.scan(paths, &normalizer, |path, loaded| {
                    if let Some(l) = summary.account(path, loaded) {
                        agg.push(l.record.label, l.record);
                    }
                });
                self.close_scan(&agg, &mut summary);
                write_groups(agg.drain(), |g| writer.write_tumor(g), &mut summary);
            }
        }

        info!(
            "{} archive(s) written to {}",
            summary.archives_written,
            self.config.output_dir().display()
        );
        Ok(summary)
    }

    /// 依发现顺序把每个文件的结果交给 `sink`.
    ///
    /// 并行模式下解码与归一化并行进行, 结果仍按发现顺序交付, 因此分组内顺序与顺序模式一致.
    fn scan<F>(&self, paths: Vec<PathBuf>, normalizer: &Normalizer, mut sink: F)
    where
        F: FnMut(&Path, Result<Loaded, FileError>),
    {
        if self.config.is_parallel() {
            #[cfg(feature = "rayon")]
            {
                let results: Vec<Result<Loaded, FileError>> = paths
                    .par_iter()
                    .map(|path| load(read_record(path), normalizer))
                    .collect();
                for (path, loaded) in paths.iter().zip(results) {
                    sink(path, loaded);
                }
                return;
            }

            #[cfg(not(feature = "rayon"))]
            {
                warn!("parallel decoding requested without the `rayon` feature, running sequentially");
            }
        }

        for (path, raw) in record_loader(paths) {
            sink(&path, load(raw, normalizer));
        }
    }

    fn close_scan<K: Hash + Eq + Clone>(&self, agg: &Aggregator<K>, summary: &mut RunSummary) {
        summary.groups_formed = agg.len();
        summary.divergent_label_groups = agg.divergent_groups();
        info!(
            "{} record(s) read into {} group(s), {} failure(s)",
            agg.record_count(),
            agg.len(),
            summary.read_failures
        );
    }
}

fn write_groups<K, I, W>(groups: I, mut write: W, summary: &mut RunSummary)
where
    K: fmt::Display,
    I: Iterator<Item = Group<K>>,
    W: FnMut(&Group<K>) -> Result<WriteOutcome, WriteArchiveError>,
{
    for group in groups {
        if group.divergent_labels() > 0 {
            warn!(
                "group {}: {} record(s) labelled differently from {}",
                group.key(),
                group.divergent_labels(),
                group.label()
            );
        }
        match write(&group) {
            Ok(WriteOutcome::Written(path)) => {
                summary.archives_written += 1;
                debug!("{} image(s) -> {}", group.len(), path.display());
            }
            Ok(WriteOutcome::Disambiguated(path)) => {
                summary.archives_written += 1;
                summary.name_collisions += 1;
                warn!(
                    "group {}: file name already used in this run, written to {}",
                    group.key(),
                    path.display()
                );
            }
            Ok(WriteOutcome::InvalidLabel(label)) => {
                summary.invalid_label_groups += 1;
                warn!("group {}: invalid label {label}, skipped", group.key());
            }
            Err(e) => {
                summary.write_failures += 1;
                error!("group {}: write failed: {e}", group.key());
            }
        }
    }
}
