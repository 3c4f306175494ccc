//! 蛋白序列语料：accession / header / 序列三元组，以及拼接后的索引文本。
//!
//! 文本布局为 `/P1/P2/.../Pn/$`：每个蛋白两侧都是分隔符 `/`，`$` 为唯一哨兵。

use std::collections::HashMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::util::aa;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProteinRecord {
    pub accession: String,
    pub header: String,
    pub sequence: String,
}

impl ProteinRecord {
    pub fn new(accession: &str, header: &str, sequence: &str) -> Self {
        Self {
            accession: accession.to_string(),
            header: header.to_string(),
            sequence: sequence.to_ascii_uppercase(),
        }
    }
}

/// Reversed decoys appended after the target proteins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoyParams {
    pub enabled: bool,
    /// Appended to both accession and header of every decoy.
    pub suffix: String,
}

impl Default for DecoyParams {
    fn default() -> Self {
        Self { enabled: true, suffix: "-REVERSED".to_string() }
    }
}

impl DecoyParams {
    pub fn none() -> Self {
        Self { enabled: false, ..Self::default() }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SequenceCorpus {
    proteins: Vec<ProteinRecord>,
    by_accession: HashMap<String, usize>,
    /// 每个蛋白首个残基在文本中的位置
    starts: Vec<u32>,
    text_len: usize,
}

impl SequenceCorpus {
    /// 构建语料（可选附加反向 decoy）。空输入与重复 accession 视为错误。
    pub fn new(records: Vec<ProteinRecord>, decoys: &DecoyParams) -> Result<Self> {
        if records.is_empty() {
            bail!("protein list is empty");
        }
        let mut proteins = Vec::with_capacity(if decoys.enabled { records.len() * 2 } else { records.len() });
        let mut reversed = Vec::new();
        for mut rec in records {
            rec.sequence.make_ascii_uppercase();
            if decoys.enabled {
                reversed.push(ProteinRecord {
                    accession: format!("{}{}", rec.accession, decoys.suffix),
                    header: format!("{}{}", rec.header, decoys.suffix),
                    sequence: rec.sequence.chars().rev().collect(),
                });
            }
            proteins.push(rec);
        }
        proteins.extend(reversed);

        let mut by_accession = HashMap::with_capacity(proteins.len());
        let mut starts = Vec::with_capacity(proteins.len());
        let mut pos = 1usize;
        for (i, p) in proteins.iter().enumerate() {
            if by_accession.insert(p.accession.clone(), i).is_some() {
                bail!("duplicate protein accession '{}'", p.accession);
            }
            starts.push(pos as u32);
            pos += p.sequence.len() + 1;
        }
        // 末尾哨兵
        let text_len = pos + 1;
        if text_len > u32::MAX as usize {
            bail!("protein corpus too large for 32-bit index ({} residues)", text_len);
        }

        Ok(Self { proteins, by_accession, starts, text_len })
    }

    /// 编码后的正向文本 `/P1/.../Pn/$`。
    pub fn text(&self) -> Vec<u8> {
        let mut text = Vec::with_capacity(self.text_len);
        text.push(aa::SEPARATOR);
        for p in &self.proteins {
            text.extend(aa::normalize_seq(p.sequence.as_bytes()).into_iter().map(aa::to_alphabet));
            text.push(aa::SEPARATOR);
        }
        text.push(aa::SENTINEL);
        text
    }

    /// 正向文本（不含哨兵）逐字反转后再补哨兵，用于向右扩展。
    pub fn reversed_text(&self) -> Vec<u8> {
        let mut text = self.text();
        text.pop();
        text.reverse();
        text.push(aa::SENTINEL);
        text
    }

    pub fn len(&self) -> usize {
        self.proteins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proteins.is_empty()
    }

    pub fn text_len(&self) -> usize {
        self.text_len
    }

    pub fn protein(&self, i: usize) -> &ProteinRecord {
        &self.proteins[i]
    }

    pub fn proteins(&self) -> &[ProteinRecord] {
        &self.proteins
    }

    pub fn sequence(&self, accession: &str) -> Option<&str> {
        self.by_accession.get(accession).map(|&i| self.proteins[i].sequence.as_str())
    }

    pub fn header(&self, accession: &str) -> Option<&str> {
        self.by_accession.get(accession).map(|&i| self.proteins[i].header.as_str())
    }

    pub fn accessions(&self) -> impl Iterator<Item = &str> {
        self.proteins.iter().map(|p| p.accession.as_str())
    }

    /// 文本位置 → (蛋白序号, 蛋白内偏移)。分隔符与哨兵位置返回 None。
    pub fn resolve(&self, pos: u32) -> Option<(usize, usize)> {
        let i = self.starts.partition_point(|&s| s <= pos).checked_sub(1)?;
        let offset = (pos - self.starts[i]) as usize;
        (offset < self.proteins[i].sequence.len()).then_some((i, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<ProteinRecord> {
        vec![
            ProteinRecord::new("P1", "P1 first protein", "mkte"),
            ProteinRecord::new("P2", "P2", "ACDX"),
        ]
    }

    #[test]
    fn decoys_are_exact_reversals() {
        let corpus = SequenceCorpus::new(records(), &DecoyParams::default()).unwrap();
        assert_eq!(corpus.len(), 4);
        assert_eq!(corpus.sequence("P1"), Some("MKTE"));
        assert_eq!(corpus.sequence("P1-REVERSED"), Some("ETKM"));
        assert_eq!(corpus.header("P2-REVERSED"), Some("P2-REVERSED"));
        let accs: Vec<_> = corpus.accessions().collect();
        assert_eq!(accs, vec!["P1", "P2", "P1-REVERSED", "P2-REVERSED"]);
    }

    #[test]
    fn text_layout_and_resolution() {
        let corpus = SequenceCorpus::new(records(), &DecoyParams::none()).unwrap();
        let text: Vec<u8> = corpus.text().into_iter().map(aa::from_alphabet).collect();
        assert_eq!(text, b"/MKTE/ACDX/$");
        assert_eq!(corpus.text_len(), text.len());
        assert_eq!(corpus.resolve(0), None);
        assert_eq!(corpus.resolve(1), Some((0, 0)));
        assert_eq!(corpus.resolve(4), Some((0, 3)));
        assert_eq!(corpus.resolve(5), None);
        assert_eq!(corpus.resolve(9), Some((1, 3)));
        assert_eq!(corpus.resolve(11), None);

        let rev: Vec<u8> = corpus.reversed_text().into_iter().map(aa::from_alphabet).collect();
        assert_eq!(rev, b"/XDCA/ETKM/$");
    }

    #[test]
    fn rejects_duplicates_and_empty_input() {
        let mut recs = records();
        recs.push(ProteinRecord::new("P1", "again", "AAA"));
        assert!(SequenceCorpus::new(recs, &DecoyParams::none()).is_err());
        assert!(SequenceCorpus::new(Vec::new(), &DecoyParams::default()).is_err());
    }
}
