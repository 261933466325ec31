use crate::group::GroupBy;
use std::io::{self, Write};

/// 一次运行的统计结果.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunSummary {
    /// 分组方式.
    pub group_by: GroupBy,

    /// 发现的 `.mat` 文件数.
    pub files_discovered: usize,

    /// 以 HDF5 格式成功读取的记录数.
    pub hdf5_records: usize,

    /// 以 level-5 格式成功读取的记录数.
    pub level5_records: usize,

    /// 读取或几何归一化失败而跳过的文件数.
    pub read_failures: usize,

    /// 其中因几何问题 (非二维、为空、尺寸不一致) 失败的文件数.
    pub geometry_failures: usize,

    /// 病人 ID 为哨兵值而未参与按病人分组的记录数.
    pub sentinel_excluded: usize,

    /// 形成的分组数.
    pub groups_formed: usize,

    /// 写出的归档数.
    pub archives_written: usize,

    /// 文件名与本次运行中已写出的归档冲突而改名写出的分组数.
    pub name_collisions: usize,

    /// 因标签无效而跳过的分组数.
    pub invalid_label_groups: usize,

    /// 含有标签不一致记录的分组数.
    pub divergent_label_groups: usize,

    /// 写出失败的分组数.
    pub write_failures: usize,
}

impl RunSummary {
    pub(crate) fn new(group_by: GroupBy) -> Self {
        Self {
            group_by,
            ..Self::default()
        }
    }

    /// 成功读取的记录总数.
    #[inline]
    pub fn records_read(&self) -> usize {
        self.hdf5_records + self.level5_records
    }

    /// 按病人分组时的病人数; 按肿瘤类型分组时为 `None`.
    pub fn unique_patients(&self) -> Option<usize> {
        match self.group_by {
            GroupBy::Patient => Some(self.groups_formed),
            GroupBy::Tumor => None,
        }
    }

    /// 是否所有文件都成功读取, 所有有效分组都成功写出?
    pub fn is_clean(&self) -> bool {
        self.read_failures == 0 && self.write_failures == 0
    }

    /// 将统计结果写进 `w` 中.
    pub fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        const S4: &str = "    ";

        writeln!(w, "Run summary (grouped by {}):", self.group_by)?;
        writeln!(w, "{S4}Files discovered: {}", self.files_discovered)?;
        writeln!(
            w,
            "{S4}Records read: {} (hdf5: {}, level5: {})",
            self.records_read(),
            self.hdf5_records,
            self.level5_records
        )?;
        writeln!(
            w,
            "{S4}Read failures: {} (geometry: {})",
            self.read_failures, self.geometry_failures
        )?;
        writeln!(w, "{S4}Sentinel IDs excluded: {}", self.sentinel_excluded)?;
        writeln!(w, "{S4}Groups formed: {}", self.groups_formed)?;
        writeln!(w, "{S4}Archives written: {}", self.archives_written)?;
        writeln!(w, "{S4}Renamed on file-name collision: {}", self.name_collisions)?;
        writeln!(w, "{S4}Invalid-label groups skipped: {}", self.invalid_label_groups)?;
        writeln!(w, "{S4}Groups with divergent labels: {}", self.divergent_label_groups)?;
        write!(w, "{S4}Write failures: {}", self.write_failures)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let s = RunSummary {
            files_discovered: 5,
            hdf5_records: 2,
            level5_records: 1,
            read_failures: 2,
            geometry_failures: 1,
            groups_formed: 2,
            archives_written: 2,
            ..RunSummary::new(GroupBy::Patient)
        };
        assert_eq!(s.records_read(), 3);
        assert_eq!(s.unique_patients(), Some(2));
        assert!(!s.is_clean());

        let mut buf = Vec::new();
        s.describe_into(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Run summary (grouped by patient):"));
        assert!(text.contains("Records read: 3 (hdf5: 2, level5: 1)"));
        assert!(text.ends_with("Write failures: 0"));

        assert_eq!(RunSummary::new(GroupBy::Tumor).unique_patients(), None);
    }
}
