//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::archive::{ArchiveWriter, Naming, NpzArchive, WriteOutcome};
pub use crate::consts::{TumorType, IMAGE_SIZE, MIN_EXPECTED_PATIENTS};
pub use crate::dataset::{self, discover, home_dataset_dir_with};
pub use crate::diagnose::DiagnosticReport;
pub use crate::geometry::{IntensityWindow, MaskPolicy, NormalizedRecord, Normalizer};
pub use crate::group::{Aggregator, GroupBy};
pub use crate::mat::{read_record, FormatKind, RawRecord, ReadRecordError};
pub use crate::pid::PatientId;
pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineError, RunSummary};
pub use crate::stats::SliceReport;
