use crate::archive::{npy, Naming};
use ndarray::{Array0, Array1, Array3, Axis, Ix0, Ix1, Ix3, OwnedRepr};
use ndarray_npy::{NpzReader, ReadNpzError};
use std::fmt;
use std::fs::File;
use std::path::Path;

/// 打开 `NpzArchive` 错误.
#[derive(Debug)]
pub enum OpenArchiveError {
    /// 打开 npz 文件错误.
    ReadNpzError(ReadNpzError),

    /// 其他底层 I/O 错误.
    IoError(std::io::Error),
}

impl fmt::Display for OpenArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadNpzError(e) => write!(f, "npz error: {e}"),
            Self::IoError(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for OpenArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadNpzError(e) => Some(e),
            Self::IoError(e) => Some(e),
        }
    }
}

/// 已写出的 npz 归档.
///
/// zip 条目名为数组键加 `.npy` 后缀, 与 `numpy.savez_compressed` 一致.
pub struct NpzArchive {
    reader: NpzReader<File>,
}

impl NpzArchive {
    /// 打开归档.
    pub fn open<P: AsRef<Path>>(p: P) -> Result<Self, OpenArchiveError> {
        let file = File::open(p.as_ref()).map_err(OpenArchiveError::IoError)?;
        let reader = NpzReader::new(file).map_err(OpenArchiveError::ReadNpzError)?;
        Ok(Self { reader })
    }

    /// 图像堆叠 `(N, S, S)`.
    pub fn images(&mut self, naming: Naming) -> Result<Array3<f32>, ReadNpzError> {
        self.reader
            .by_name::<OwnedRepr<f32>, Ix3>(&npy(naming.images_key()))
    }

    /// 掩码堆叠 `(N, S, S)`.
    pub fn masks(&mut self, naming: Naming) -> Result<Array3<u8>, ReadNpzError> {
        self.reader
            .by_name::<OwnedRepr<u8>, Ix3>(&npy(naming.masks_key()))
    }

    /// 病人归档的标量标签.
    pub fn label(&mut self, naming: Naming) -> Result<i64, ReadNpzError> {
        let label: Array0<i64> = self
            .reader
            .by_name::<OwnedRepr<i64>, Ix0>(&npy(naming.label_key()))?;
        Ok(label[()])
    }

    /// 肿瘤类型归档的逐条标签.
    pub fn labels(&mut self, naming: Naming) -> Result<Array1<i64>, ReadNpzError> {
        self.reader
            .by_name::<OwnedRepr<i64>, Ix1>(&npy(naming.labels_key()))
    }

    /// 切片数, 即图像堆叠的首维长度.
    pub fn slice_count(&mut self, naming: Naming) -> Result<usize, ReadNpzError> {
        Ok(self.images(naming)?.len_of(Axis(0)))
    }

    /// 归档包含的数组个数.
    pub fn len(&mut self) -> usize {
        self.reader.len()
    }

    /// 归档是否为空?
    pub fn is_empty(&mut self) -> bool {
        self.reader.is_empty()
    }

    /// 归档内的 zip 条目名.
    pub fn entry_names(&mut self) -> Result<Vec<String>, ReadNpzError> {
        self.reader.names()
    }
}
