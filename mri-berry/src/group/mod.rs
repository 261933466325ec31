//! 按键聚合归一化记录.
//!
//! 键可以是病人 ID ([`PatientId`](crate::pid::PatientId)) 或诊断标签 (`i64`).
//! 聚合器由一次运行独占, 按首次出现的顺序保存键, 每个键下的记录只追加不去重.

use crate::geometry::NormalizedRecord;
use ndarray::Array2;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// 分组方式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GroupBy {
    /// 按病人 ID 分组, 每个病人一个归档.
    #[default]
    Patient,

    /// 按诊断标签 (肿瘤类型) 分组, 每个类型一个归档.
    Tumor,
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Patient => "patient",
            Self::Tumor => "tumor",
        })
    }
}

/// 一个键下按插入顺序收集的记录.
#[derive(Clone, Debug, PartialEq)]
pub struct Group<K> {
    key: K,
    images: Vec<Array2<f32>>,
    masks: Vec<Array2<u8>>,
    labels: Vec<i64>,
    divergent: usize,
}

impl<K> Group<K> {
    fn new(key: K) -> Self {
        Self {
            key,
            images: Vec::new(),
            masks: Vec::new(),
            labels: Vec::new(),
            divergent: 0,
        }
    }

    /// 分组键.
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// 分组标签, 即第一条记录的标签. 后续记录的不同标签不会改变它.
    #[inline]
    pub fn label(&self) -> i64 {
        self.labels[0]
    }

    /// 每条记录各自的标签.
    #[inline]
    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    /// 图像序列.
    #[inline]
    pub fn images(&self) -> &[Array2<f32>] {
        &self.images
    }

    /// 掩码序列. 记录不携带掩码时为 `None`.
    pub fn masks(&self) -> Option<&[Array2<u8>]> {
        (self.masks.len() == self.images.len()).then_some(self.masks.as_slice())
    }

    /// 记录条数. 至少为 1.
    #[inline]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// 恒为 `false`; 分组在第一条记录到来时才创建.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// 标签与分组标签不一致的记录条数.
    #[inline]
    pub fn divergent_labels(&self) -> usize {
        self.divergent
    }

    fn push(&mut self, record: NormalizedRecord) -> bool {
        let divergent = self.labels.first().is_some_and(|&l| l != record.label);
        if divergent {
            self.divergent += 1;
        }
        self.images.push(record.image);
        if let Some(mask) = record.mask {
            self.masks.push(mask);
        }
        self.labels.push(record.label);
        divergent
    }
}

/// 聚合器.
#[derive(Clone, Debug)]
pub struct Aggregator<K> {
    index: HashMap<K, usize>,
    groups: Vec<Group<K>>,
}

impl<K> Default for Aggregator<K> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }
}

impl<K: Hash + Eq + Clone> Aggregator<K> {
    /// 初始化空聚合器.
    pub fn new() -> Self {
        Self::default()
    }

    /// 将 `record` 追加到 `key` 下.
    ///
    /// 若该记录的标签与分组标签不同, 返回 `true`.
    pub fn push(&mut self, key: K, record: NormalizedRecord) -> bool {
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.index.insert(key.clone(), self.groups.len());
                self.groups.push(Group::new(key));
                self.groups.len() - 1
            }
        };
        self.groups[slot].push(record)
    }

    /// 查找分组.
    pub fn get(&self, key: &K) -> Option<&Group<K>> {
        self.index.get(key).map(|&slot| &self.groups[slot])
    }

    /// 按首次出现顺序遍历所有键.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.groups.iter().map(Group::key)
    }

    /// 分组个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// 是否没有分组?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// 所有分组的记录总数.
    pub fn record_count(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }

    /// 至少含有一条标签不一致记录的分组个数.
    pub fn divergent_groups(&self) -> usize {
        self.groups.iter().filter(|g| g.divergent > 0).count()
    }

    /// 按首次出现顺序逐个取出分组. 迭代结束后聚合器为空.
    pub fn drain(&mut self) -> impl Iterator<Item = Group<K>> + '_ {
        self.index.clear();
        self.groups.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pid::PatientId;

    fn rec(fill: f32, label: i64, with_mask: bool) -> NormalizedRecord {
        NormalizedRecord {
            image: Array2::from_elem((2, 2), fill),
            mask: with_mask.then(|| Array2::from_elem((2, 2), 1u8)),
            label,
        }
    }

    #[test]
    fn test_insertion_order_and_first_label() {
        let mut agg = Aggregator::new();
        let p = PatientId::from("P7");
        assert!(!agg.push(p.clone(), rec(0.0, 2, true)));
        assert!(agg.push(p.clone(), rec(1.0, 3, true)));
        assert!(!agg.push(p.clone(), rec(2.0, 2, true)));
        assert!(agg.push(p.clone(), rec(3.0, 1, true)));

        let g = agg.get(&p).unwrap();
        assert_eq!(g.len(), 4);
        assert_eq!(g.label(), 2);
        assert_eq!(g.labels(), &[2, 3, 2, 1]);
        assert_eq!(g.divergent_labels(), 2);
        let fills: Vec<f32> = g.images().iter().map(|a| a[(0, 0)]).collect();
        assert_eq!(fills, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(g.masks().map(<[_]>::len), Some(4));
        assert_eq!(agg.divergent_groups(), 1);
    }

    #[test]
    fn test_key_order_and_drain() {
        let mut agg = Aggregator::new();
        for (key, label) in [(3, 3), (1, 1), (3, 3), (2, 2), (1, 1)] {
            agg.push(key, rec(key as f32, label, false));
        }
        assert_eq!(agg.keys().copied().collect::<Vec<_>>(), vec![3, 1, 2]);
        assert_eq!(agg.record_count(), 5);
        assert_eq!(agg.divergent_groups(), 0);

        let drained: Vec<_> = agg.drain().collect();
        assert!(agg.is_empty());
        assert!(agg.get(&3).is_none());
        assert_eq!(drained.len(), 3);
        assert_eq!(*drained[0].key(), 3);
        assert_eq!(drained[0].len(), 2);
        assert!(drained[0].masks().is_none());
    }
}
