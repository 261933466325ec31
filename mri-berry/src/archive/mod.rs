//! 归档: 将分组写成压缩的 `.npz` 文件, 以及读回已写出的归档.
//!
//! 归档路径为 `<输出根目录>/<肿瘤类型目录>/<文件名>.npz`. 写入时先写同目录下的
//! `.<文件名>.npz.partial`, 完整写完后再重命名, 因此不会留下半个归档.

mod reader;

pub use reader::{NpzArchive, OpenArchiveError};

use crate::consts::TumorType;
use crate::group::Group;
use crate::pid::PatientId;
use ndarray::{arr0, stack, Array1, ArrayView2, Axis, ShapeError};
use ndarray_npy::{NpzWriter, WriteNpzError};
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// 归档命名方式: 文件名与归档内数组的键名.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Naming {
    /// `patient_<id>`, `<Tumor>_preprocessed`; 键 `images`/`masks`/`label`/`labels`.
    #[default]
    English,

    /// `paciente_<id>`, `<Tumor>_preprocesado`; 键 `imagenes`/`mascaras`/`etiqueta`/`etiquetas`.
    Spanish,
}

impl Naming {
    /// 病人归档的文件名 (不含扩展名).
    pub fn patient_file_name(self, id: &PatientId) -> String {
        let prefix = match self {
            Self::English => "patient",
            Self::Spanish => "paciente",
        };
        format!("{prefix}_{}", id.file_stem())
    }

    /// 肿瘤类型归档的文件名 (不含扩展名).
    pub fn tumor_file_name(self, tumor: TumorType) -> String {
        let suffix = match self {
            Self::English => "preprocessed",
            Self::Spanish => "preprocesado",
        };
        format!("{}_{suffix}", tumor.dir_name())
    }

    /// 图像堆叠 `(N, S, S)` 的键.
    pub const fn images_key(self) -> &'static str {
        match self {
            Self::English => "images",
            Self::Spanish => "imagenes",
        }
    }

    /// 掩码堆叠 `(N, S, S)` 的键.
    pub const fn masks_key(self) -> &'static str {
        match self {
            Self::English => "masks",
            Self::Spanish => "mascaras",
        }
    }

    /// 病人归档中标量标签的键.
    pub const fn label_key(self) -> &'static str {
        match self {
            Self::English => "label",
            Self::Spanish => "etiqueta",
        }
    }

    /// 肿瘤类型归档中逐条标签 `(N,)` 的键.
    pub const fn labels_key(self) -> &'static str {
        match self {
            Self::English => "labels",
            Self::Spanish => "etiquetas",
        }
    }
}

impl fmt::Display for Naming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::English => "english",
            Self::Spanish => "spanish",
        })
    }
}

/// 写归档错误.
#[derive(Debug)]
pub enum WriteArchiveError {
    /// 图像或掩码尺寸不一致, 无法堆叠.
    Shape(ShapeError),

    /// npz 编码错误.
    WriteNpzError(WriteNpzError),

    /// 其他底层 I/O 错误.
    IoError(io::Error),
}

impl fmt::Display for WriteArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shape(e) => write!(f, "cannot stack arrays: {e}"),
            Self::WriteNpzError(e) => write!(f, "npz error: {e}"),
            Self::IoError(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for WriteArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Shape(e) => Some(e),
            Self::WriteNpzError(e) => Some(e),
            Self::IoError(e) => Some(e),
        }
    }
}

impl From<io::Error> for WriteArchiveError {
    fn from(e: io::Error) -> Self {
        Self::IoError(e)
    }
}

impl From<WriteNpzError> for WriteArchiveError {
    fn from(e: WriteNpzError) -> Self {
        Self::WriteNpzError(e)
    }
}

impl From<ShapeError> for WriteArchiveError {
    fn from(e: ShapeError) -> Self {
        Self::Shape(e)
    }
}

/// 单个分组的写出结果.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// 已写出到该路径.
    Written(PathBuf),

    /// 本次运行中已有另一个病人占用了同名文件 (病人 ID 清理后相同),
    /// 改写到带序号后缀的路径.
    Disambiguated(PathBuf),

    /// 标签不在 `{1, 2, 3}` 内, 跳过.
    InvalidLabel(i64),
}

/// 归档写出器.
///
/// 记录本次运行已写出的路径, 同一路径不会被写两次.
#[derive(Clone, Debug)]
pub struct ArchiveWriter {
    root: PathBuf,
    naming: Naming,
    claimed: HashSet<PathBuf>,
}

impl ArchiveWriter {
    /// 初始化. 不会访问文件系统.
    pub fn new<P: AsRef<Path>>(root: P, naming: Naming) -> Self {
        Self {
            root: root.as_ref().to_owned(),
            naming,
            claimed: HashSet::new(),
        }
    }

    /// 输出根目录.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 命名方式.
    #[inline]
    pub fn naming(&self) -> Naming {
        self.naming
    }

    /// 创建输出根目录以及每个肿瘤类型的子目录.
    pub fn prepare(&self) -> io::Result<()> {
        for tumor in TumorType::ALL {
            fs::create_dir_all(self.tumor_dir(tumor))?;
        }
        Ok(())
    }

    /// 肿瘤类型子目录.
    pub fn tumor_dir(&self, tumor: TumorType) -> PathBuf {
        self.root.join(tumor.dir_name())
    }

    /// 病人归档路径.
    pub fn patient_path(&self, tumor: TumorType, id: &PatientId) -> PathBuf {
        let mut path = self.tumor_dir(tumor);
        path.push(format!("{}.npz", self.naming.patient_file_name(id)));
        path
    }

    /// 肿瘤类型归档路径.
    pub fn tumor_path(&self, tumor: TumorType) -> PathBuf {
        let mut path = self.tumor_dir(tumor);
        path.push(format!("{}.npz", self.naming.tumor_file_name(tumor)));
        path
    }

    /// 写出病人分组: 图像, 掩码 (若有) 与标量标签.
    ///
    /// 不同的病人 ID 清理后可能得到相同的文件名 (如 `a/b` 与 `a_b`); 后写的分组改用
    /// `<文件名>_2.npz`, `<文件名>_3.npz`, ... 中第一个未被占用的路径.
    pub fn write_patient(
        &mut self,
        group: &Group<PatientId>,
    ) -> Result<WriteOutcome, WriteArchiveError> {
        let Some(tumor) = TumorType::from_label(group.label()) else {
            return Ok(WriteOutcome::InvalidLabel(group.label()));
        };
        let plain = self.patient_path(tumor, group.key());
        let path = self.unclaimed(&plain);
        let naming = self.naming;
        write_atomically(&path, |npz| {
            add_stacks(npz, naming, group)?;
            npz.add_array(npy(naming.label_key()), &arr0(group.label()))?;
            Ok(())
        })?;
        self.claimed.insert(path.clone());
        if path == plain {
            Ok(WriteOutcome::Written(path))
        } else {
            Ok(WriteOutcome::Disambiguated(path))
        }
    }

    /// 写出肿瘤类型分组: 图像, 掩码 (若有) 与逐条标签.
    pub fn write_tumor(&mut self, group: &Group<i64>) -> Result<WriteOutcome, WriteArchiveError> {
        let Some(tumor) = TumorType::from_label(group.label()) else {
            return Ok(WriteOutcome::InvalidLabel(group.label()));
        };
        let path = self.tumor_path(tumor);
        let naming = self.naming;
        write_atomically(&path, |npz| {
            add_stacks(npz, naming, group)?;
            npz.add_array(npy(naming.labels_key()), &Array1::from(group.labels().to_vec()))?;
            Ok(())
        })?;
        self.claimed.insert(path.clone());
        Ok(WriteOutcome::Written(path))
    }

    fn unclaimed(&self, plain: &Path) -> PathBuf {
        if !self.claimed.contains(plain) {
            return plain.to_owned();
        }
        let stem = plain
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        (2usize..)
            .map(|n| plain.with_file_name(format!("{stem}_{n}.npz")))
            .find(|p| !self.claimed.contains(p))
            .unwrap_or_else(|| plain.to_owned())
    }
}

/// 归档内数组 `key` 对应的 zip 条目名.
pub(crate) fn npy(key: &str) -> String {
    format!("{key}.npy")
}

type Npz = NpzWriter<BufWriter<File>>;

fn add_stacks<K>(npz: &mut Npz, naming: Naming, group: &Group<K>) -> Result<(), WriteArchiveError> {
    let images: Vec<ArrayView2<f32>> = group.images().iter().map(|a| a.view()).collect();
    npz.add_array(npy(naming.images_key()), &stack(Axis(0), &images)?)?;
    if let Some(masks) = group.masks() {
        let masks: Vec<ArrayView2<u8>> = masks.iter().map(|a| a.view()).collect();
        npz.add_array(npy(naming.masks_key()), &stack(Axis(0), &masks)?)?;
    }
    Ok(())
}

/// `dir/name.npz` 对应的 `dir/.name.npz.partial`.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(".");
    if let Some(file_name) = path.file_name() {
        name.push(file_name);
    }
    name.push(".partial");
    path.with_file_name(name)
}

fn write_atomically<F>(path: &Path, fill: F) -> Result<(), WriteArchiveError>
where
    F: FnOnce(&mut Npz) -> Result<(), WriteArchiveError>,
{
    let partial = partial_path(path);
    match write_partial(&partial, fill) {
        Ok(()) => fs::rename(&partial, path).map_err(|e| {
            let _ = fs::remove_file(&partial);
            WriteArchiveError::from(e)
        }),
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}

fn write_partial<F>(partial: &Path, fill: F) -> Result<(), WriteArchiveError>
where
    F: FnOnce(&mut Npz) -> Result<(), WriteArchiveError>,
{
    let file = File::create(partial)?;
    let mut npz = NpzWriter::new_compressed(BufWriter::new(file));
    fill(&mut npz)?;
    let mut out = npz.finish()?;
    out.flush()?;
    out.get_ref().sync_all()?;
    Ok(())
}
