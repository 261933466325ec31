//! 命令行参数.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use mri_berry::archive::Naming;
use mri_berry::consts::{IMAGE_SIZE, MIN_EXPECTED_PATIENTS};
use mri_berry::geometry::MaskPolicy;
use std::path::PathBuf;
use utils::loader::DATASET_ENV;

/// Brain-tumor MRI dataset preprocessing.
#[derive(Parser, Debug)]
#[command(name = "mri-prep", version, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v: debug, -vv: trace). Overrides `$MRI_PREP_LOG`.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Group records by patient, one archive per patient
    Patient(RunArgs),

    /// Group records by tumor type, one archive per type
    Tumor(RunArgs),

    /// Read only patient IDs and labels, write a CSV report
    Diagnose(DiagnoseArgs),

    /// Slices-per-patient statistics over patient archives
    Stats(StatsArgs),
}

#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Dataset directory (default: `$HOME/dataset/Tumores`)
    #[arg(short = 'S', long, env = DATASET_ENV)]
    pub source: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output root directory
    #[arg(short = 'O', long)]
    pub output: Option<PathBuf>,

    /// Side length of the stored images and masks
    #[arg(long, default_value_t = IMAGE_SIZE)]
    pub size: usize,

    /// Keep masks separate, or apply them to the images
    #[arg(long, value_enum, default_value_t = MaskPolicyArg::Separate)]
    pub mask_policy: MaskPolicyArg,

    /// File and array naming
    #[arg(long, value_enum, default_value_t = NamingArg::English)]
    pub naming: NamingArg,

    /// Decode files in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Worker threads for `--parallel` (default: all cores)
    #[arg(long, requires = "parallel")]
    pub threads: Option<usize>,

    /// Warn when fewer unique patients are recovered
    #[arg(long, default_value_t = MIN_EXPECTED_PATIENTS)]
    pub min_patients: usize,
}

#[derive(Args, Debug)]
pub struct DiagnoseArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// CSV report path
    #[arg(short = 'O', long)]
    pub output: Option<PathBuf>,

    /// Warn when fewer unique patients are recovered
    #[arg(long, default_value_t = MIN_EXPECTED_PATIENTS)]
    pub min_patients: usize,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Root of the patient archives
    #[arg(short = 'S', long)]
    pub source: Option<PathBuf>,

    /// Directory for the histogram image
    #[arg(short = 'O', long)]
    pub output: Option<PathBuf>,

    /// Naming used when the archives were written
    #[arg(long, value_enum, default_value_t = NamingArg::English)]
    pub naming: NamingArg,

    /// Skip the histogram image
    #[arg(long)]
    pub no_histogram: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum MaskPolicyArg {
    /// Store images and masks separately
    Separate,
    /// Rescale images to [0, 255] and multiply by the mask
    Apply,
}

impl From<MaskPolicyArg> for MaskPolicy {
    fn from(value: MaskPolicyArg) -> Self {
        match value {
            MaskPolicyArg::Separate => MaskPolicy::KeepMaskSeparate,
            MaskPolicyArg::Apply => MaskPolicy::ApplyMaskToImage,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum NamingArg {
    /// `patient_<id>.npz`, `images` / `masks` / `label(s)`
    English,
    /// `paciente_<id>.npz`, `imagenes` / `mascaras` / `etiqueta(s)`
    Spanish,
}

impl From<NamingArg> for Naming {
    fn from(value: NamingArg) -> Self {
        match value {
            NamingArg::English => Naming::English,
            NamingArg::Spanish => Naming::Spanish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::try_parse_from([
            "mri-prep",
            "-vv",
            "tumor",
            "-S",
            "/data",
            "--mask-policy",
            "apply",
            "--naming",
            "spanish",
            "--size",
            "64",
            "--parallel",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Tumor(args) = cli.command else {
            panic!("expected the tumor subcommand");
        };
        assert_eq!(args.source.source, Some(PathBuf::from("/data")));
        assert_eq!(MaskPolicy::from(args.mask_policy), MaskPolicy::ApplyMaskToImage);
        assert_eq!(Naming::from(args.naming), Naming::Spanish);
        assert_eq!(args.size, 64);
        assert!(args.parallel);
        assert_eq!(args.min_patients, MIN_EXPECTED_PATIENTS);
    }

    #[test]
    fn test_threads_requires_parallel() {
        let err = Cli::try_parse_from(["mri-prep", "patient", "--threads", "4"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli =
            Cli::try_parse_from(["mri-prep", "patient", "--parallel", "--threads", "4"]).unwrap();
        let Command::Patient(args) = cli.command else {
            panic!("expected the patient subcommand");
        };
        assert_eq!(args.threads, Some(4));
    }
}
