//! 程序运行函数.

use crate::args::{Command, DiagnoseArgs, RunArgs, SourceArgs, StatsArgs};
use crate::result::{print_report, RunError};
use log::info;
use mri_berry::diagnose::DiagnosticReport;
use mri_berry::group::GroupBy;
use mri_berry::pipeline::{Pipeline, PipelineConfig};
use mri_berry::stats::SliceReport;
use std::path::PathBuf;
use utils::loader;

/// 实际运行.
pub fn run(command: Command) -> Result<(), RunError> {
    match command {
        Command::Patient(args) => preprocess(GroupBy::Patient, args),
        Command::Tumor(args) => preprocess(GroupBy::Tumor, args),
        Command::Diagnose(args) => diagnose(args),
        Command::Stats(args) => stats(args),
    }
}

fn source_dir(args: SourceArgs) -> Result<PathBuf, RunError> {
    args.source
        .or_else(loader::source_dir_from_env_or_home)
        .ok_or(RunError::NoSourceDir)
}

fn preprocess(group_by: GroupBy, args: RunArgs) -> Result<(), RunError> {
    let source = source_dir(args.source)?;
    let output = args.output.unwrap_or_else(|| {
        PathBuf::from(match group_by {
            GroupBy::Patient => loader::PATIENT_OUTPUT_DIR,
            GroupBy::Tumor => loader::TUMOR_OUTPUT_DIR,
        })
    });

    if args.parallel {
        let threads = args.threads.unwrap_or_else(utils::cpus);
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(RunError::ThreadPool)?;
        info!("decoding with {threads} worker thread(s)");
    }

    let config = PipelineConfig::new(&source, &output)
        .group_by(group_by)
        .mask_policy(args.mask_policy.into())
        .naming(args.naming.into())
        .size(args.size)
        .parallel(args.parallel)
        .min_expected_patients(args.min_patients);
    let summary = Pipeline::new(config).run()?;
    print_report(|w| summary.describe_into(w));
    Ok(())
}

fn diagnose(args: DiagnoseArgs) -> Result<(), RunError> {
    let source = source_dir(args.source)?;
    let report = DiagnosticReport::scan(&source)?;
    print_report(|w| report.describe_into(args.min_patients, w));

    let csv = args
        .output
        .unwrap_or_else(|| PathBuf::from(loader::DIAGNOSTIC_CSV));
    report
        .save_csv(&csv)
        .map_err(|e| RunError::Io(csv.clone(), e))?;
    info!("report saved to {}", csv.display());
    Ok(())
}

fn stats(args: StatsArgs) -> Result<(), RunError> {
    let root = args
        .source
        .unwrap_or_else(|| PathBuf::from(loader::PATIENT_OUTPUT_DIR));
    let report = SliceReport::collect(&root, args.naming.into());
    print_report(|w| report.describe_into(w));

    if args.no_histogram {
        return Ok(());
    }
    let dir = args
        .output
        .unwrap_or_else(|| PathBuf::from(loader::ANALYSIS_OUTPUT_DIR));
    std::fs::create_dir_all(&dir).map_err(|e| RunError::Io(dir.clone(), e))?;
    let png = dir.join(loader::HISTOGRAM_PNG);
    match report.save_histogram(&png) {
        Ok(true) => info!("histogram saved to {}", png.display()),
        Ok(false) => info!("no data, histogram not generated"),
        Err(e) => return Err(RunError::Image(png, e)),
    }
    Ok(())
}
