//! 数据集诊断: 只读取每个文件的病人 ID 与标签, 生成 CSV 报告并检查病人数.

use crate::dataset::{discover, meta_loader};
use crate::mat::{FormatKind, RecordMeta};
use crate::pid::PatientId;
use crate::pipeline::PipelineError;
use itertools::Itertools;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// CSV 表头.
pub const CSV_HEADER: [&str; 5] = ["Filename", "PID_Corrected", "Label", "Method", "Path"];

/// 报告中列出的病人 ID 样本个数.
const SAMPLE_LEN: usize = 15;

/// 单个文件的诊断结果.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticRow {
    /// 文件路径.
    pub path: PathBuf,

    /// 解码后的病人 ID. 读取失败时为 `"Error"`.
    pub patient_id: PatientId,

    /// 标签. 读取失败时为 `None`.
    pub label: Option<i64>,

    /// 成功读取的格式. 读取失败时为 `None`.
    pub format: Option<FormatKind>,
}

impl DiagnosticRow {
    fn new(path: PathBuf, meta: Option<RecordMeta>) -> Self {
        match meta {
            Some(m) => Self {
                path,
                patient_id: m.patient_id,
                label: Some(m.label),
                format: Some(m.format),
            },
            None => Self {
                path,
                patient_id: PatientId::error(),
                label: None,
                format: None,
            },
        }
    }

    /// `Method` 列: `hdf5`, `level5` 或 `error`.
    pub fn method(&self) -> &'static str {
        self.format.map_or("error", FormatKind::as_str)
    }

    /// 是否成功读取?
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.format.is_some()
    }

    fn write_csv<W: Write>(&self, w: &mut csv::Writer<W>) -> csv::Result<()> {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        let label = self.label.map(|l| l.to_string()).unwrap_or_default();
        w.write_record([
            &*file_name,
            self.patient_id.as_str(),
            label.as_str(),
            self.method(),
            &*self.path.to_string_lossy(),
        ])
    }
}

/// 诊断报告.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiagnosticReport {
    rows: Vec<DiagnosticRow>,
}

impl DiagnosticReport {
    /// 扫描 `root` 下所有 `.mat` 文件. `root` 不是目录时返回错误.
    pub fn scan<P: AsRef<Path>>(root: P) -> Result<Self, PipelineError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(PipelineError::SourceMissing(root.to_owned()));
        }
        let paths = discover(root);
        log::info!("diagnosing {} .mat file(s) under {}", paths.len(), root.display());

        let rows = meta_loader(paths)
            .map(|(path, meta)| {
                let meta = match meta {
                    Ok(m) => Some(m),
                    Err(e) => {
                        log::warn!("cannot read {}: {e}", path.display());
                        None
                    }
                };
                DiagnosticRow::new(path, meta)
            })
            .collect();
        Ok(Self { rows })
    }

    /// 所有行, 按路径排序.
    #[inline]
    pub fn rows(&self) -> &[DiagnosticRow] {
        &self.rows
    }

    /// 成功读取的文件数.
    pub fn read_ok(&self) -> usize {
        self.rows.iter().filter(|r| r.is_ok()).count()
    }

    /// 读取失败的文件数.
    pub fn read_errors(&self) -> usize {
        self.rows.len() - self.read_ok()
    }

    /// 成功读取的文件中出现的不同病人 ID, 升序排列. 哨兵值也计入.
    pub fn unique_patients(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| r.is_ok())
            .map(|r| r.patient_id.as_str())
            .sorted_unstable()
            .dedup()
            .collect()
    }

    /// 以 CSV 格式写出全部行. 含逗号、引号或换行的字段会被加引号.
    pub fn write_csv<W: Write>(&self, w: W) -> io::Result<()> {
        self.write_records(csv::Writer::from_writer(w))
    }

    /// 写出 CSV 文件.
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        self.write_records(csv::Writer::from_path(path)?)
    }

    fn write_records<W: Write>(&self, mut w: csv::Writer<W>) -> io::Result<()> {
        w.write_record(CSV_HEADER)?;
        for row in self.rows.iter() {
            row.write_csv(&mut w)?;
        }
        w.flush()
    }

    /// 将诊断摘要写进 `w` 中. 病人数低于 `threshold` 时同时记录警告.
    pub fn describe_into<W: Write>(&self, threshold: usize, w: &mut W) -> io::Result<()> {
        const S4: &str = "    ";

        writeln!(w, "Diagnostic report:")?;
        writeln!(w, "{S4}Files scanned: {}", self.rows.len())?;
        if self.read_ok() == 0 {
            write!(w, "{S4}No file could be read.")?;
            log::warn!("no file could be read");
            return Ok(());
        }
        let patients = self.unique_patients();
        writeln!(w, "{S4}Files read: {}", self.read_ok())?;
        writeln!(w, "{S4}Read errors: {}", self.read_errors())?;
        writeln!(w, "{S4}Unique patient IDs: {}", patients.len())?;
        writeln!(
            w,
            "{S4}Sample: [{}]",
            patients.iter().take(SAMPLE_LEN).join(", ")
        )?;
        if patients.len() >= threshold {
            write!(w, "{S4}OK: at least {threshold} patients recovered")?;
        } else {
            log::warn!(
                "only {} unique patient(s) recovered, expected at least {threshold}",
                patients.len()
            );
            write!(w, "{S4}WARNING: fewer than {threshold} patients recovered")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mat::testkit::{record_fields, write_mat, Field};
    use std::fs;

    #[test]
    fn test_scan_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        write_mat(&dir.path().join("1.mat"), FormatKind::Hdf5, &record_fields("P10", 1.0, 4, 4));
        write_mat(&dir.path().join("2.mat"), FormatKind::Level5, &record_fields("P10", 1.0, 4, 4));
        let mut fields = record_fields("", 2.0, 4, 4);
        fields[0].1 = Field::Double(vec![1, 1], vec![77.0]);
        write_mat(&dir.path().join("3.mat"), FormatKind::Level5, &fields);
        fs::write(dir.path().join("4.mat"), b"broken").unwrap();
        fs::write(dir.path().join("5,\"x\".mat"), b"broken").unwrap();

        let report = DiagnosticReport::scan(dir.path()).unwrap();
        assert_eq!(report.rows().len(), 5);
        assert_eq!(report.read_ok(), 3);
        assert_eq!(report.read_errors(), 2);
        assert_eq!(report.unique_patients(), vec!["77.0", "P10"]);

        let mut buf = Vec::new();
        report.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Filename,PID_Corrected,Label,Method,Path");
        assert!(lines[1].starts_with("1.mat,P10,1,hdf5,"));
        assert!(lines[2].starts_with("2.mat,P10,1,level5,"));
        assert!(lines[3].starts_with("3.mat,77.0,2,level5,"));
        assert!(lines[4].starts_with("4.mat,Error,,error,"));
        assert!(lines[5].starts_with("\"5,\"\"x\"\".mat\",Error,,error,\""));

        let mut buf = Vec::new();
        report.describe_into(3, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Unique patient IDs: 2"));
        assert!(text.contains("Sample: [77.0, P10]"));
        assert!(text.ends_with("WARNING: fewer than 3 patients recovered"));
    }

    #[test]
    fn test_missing_root() {
        assert!(matches!(
            DiagnosticReport::scan("/definitely/not/here"),
            Err(PipelineError::SourceMissing(_))
        ));
    }
}
