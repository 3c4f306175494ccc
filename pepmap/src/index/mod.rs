//! 蛋白库索引：语料 + 正向/反向 FM 索引。

pub mod bwt;
pub mod corpus;
pub mod fm;
pub mod sa;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::aa;
use corpus::{ProteinRecord, SequenceCorpus};
use fm::FMIndex;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexMeta {
    pub source_file: Option<String>,
    pub build_args: Option<String>,
    pub build_timestamp: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    /// Occ 采样块大小
    pub block: usize,
    /// SA 采样间隔
    pub sa_step: u32,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self { block: 64, sa_step: 8 }
    }
}

/// 一次命中：蛋白序号与 0 起始偏移。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hit {
    pub protein: usize,
    pub offset: usize,
}

/// Read-only after [`ProteinIndex::build`]; share it by reference across query threads.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProteinIndex {
    corpus: SequenceCorpus,
    forward: FMIndex,
    /// 反向文本上的索引：在其上向左扩展等价于在正向文本上向右扩展
    reverse: FMIndex,
    meta: IndexMeta,
}

impl ProteinIndex {
    pub fn build(corpus: SequenceCorpus, opts: IndexOptions) -> Self {
        let sigma = aa::SIGMA as u8;
        let (forward, reverse) = rayon::join(
            || FMIndex::build(&corpus.text(), sigma, opts.block, opts.sa_step),
            || FMIndex::build(&corpus.reversed_text(), sigma, opts.block, opts.sa_step),
        );
        log::debug!("built forward and reverse FM indexes over {} text positions", forward.len());
        Self { corpus, forward, reverse, meta: IndexMeta::default() }
    }

    /// Convenience for in-memory protein lists.
    pub fn from_proteins(records: Vec<ProteinRecord>, decoys: &corpus::DecoyParams) -> Result<Self> {
        Ok(Self::build(SequenceCorpus::new(records, decoys)?, IndexOptions::default()))
    }

    pub fn set_meta(&mut self, meta: IndexMeta) {
        self.meta = meta;
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn corpus(&self) -> &SequenceCorpus {
        &self.corpus
    }

    pub fn forward(&self) -> &FMIndex {
        &self.forward
    }

    pub fn reverse(&self) -> &FMIndex {
        &self.reverse
    }

    pub fn sequence(&self, accession: &str) -> Option<&str> {
        self.corpus.sequence(accession)
    }

    pub fn header(&self, accession: &str) -> Option<&str> {
        self.corpus.header(accession)
    }

    pub fn accessions(&self) -> impl Iterator<Item = &str> {
        self.corpus.accessions()
    }

    /// 精确字符串（逐字比较，不做歧义展开）的 SA 区间。
    pub fn count(&self, pattern: &str) -> (usize, usize) {
        let pat: Vec<u8> = pattern.bytes().map(aa::to_alphabet).collect();
        self.forward.count(&pat)
    }

    /// 残基字符（ASCII）在区间前扩展。
    pub fn extend_left(&self, range: (usize, usize), residue: u8) -> (usize, usize) {
        self.forward.extend_left(range.0, range.1, aa::to_alphabet(residue))
    }

    /// 正向索引区间 → 蛋白命中（按蛋白、偏移排序）。
    pub fn locate(&self, range: (usize, usize)) -> Vec<Hit> {
        let mut hits: Vec<Hit> = self
            .forward
            .locate(range.0, range.1)
            .into_iter()
            .filter_map(|pos| self.corpus.resolve(pos))
            .map(|(protein, offset)| Hit { protein, offset })
            .collect();
        hits.sort_unstable();
        hits
    }

    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let f = std::fs::File::create(path).with_context(|| format!("cannot create index file '{}'", path))?;
        bincode::serialize_into(std::io::BufWriter::new(f), self)?;
        Ok(())
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let f = std::fs::File::open(path).with_context(|| format!("cannot open index file '{}'", path))?;
        let idx: Self = bincode::deserialize_from(std::io::BufReader::new(f))
            .with_context(|| format!("'{}' is not a valid protein index", path))?;
        Ok(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::corpus::DecoyParams;
    use super::*;

    fn small_index() -> ProteinIndex {
        let records = vec![
            ProteinRecord::new("A1", "A1", "MPEPTIDEKPEP"),
            ProteinRecord::new("A2", "A2", "GGPEPTIDE"),
        ];
        ProteinIndex::from_proteins(records, &DecoyParams::default()).unwrap()
    }

    #[test]
    fn locate_maps_to_proteins() {
        let idx = small_index();
        let hits = idx.locate(idx.count("PEP"));
        assert_eq!(
            hits,
            vec![
                Hit { protein: 0, offset: 1 },
                Hit { protein: 0, offset: 9 },
                Hit { protein: 1, offset: 2 },
                Hit { protein: 2, offset: 0 },
                Hit { protein: 2, offset: 8 },
                Hit { protein: 3, offset: 4 },
            ]
        );
        // decoy "PEPKEDITPEPM" / "EDITPEPGG"
        let hits = idx.locate(idx.count("EDITPEP"));
        let accs: Vec<_> = hits.iter().map(|h| idx.corpus().protein(h.protein).accession.as_str()).collect();
        assert_eq!(accs, vec!["A1-REVERSED", "A2-REVERSED"]);
    }

    #[test]
    fn pattern_across_boundary_is_not_found() {
        let idx = small_index();
        let (l, r) = idx.count("PEPGGP");
        assert!(l >= r);
    }

    #[test]
    fn extend_left_narrows_range() {
        let idx = small_index();
        let range = idx.count("PEP");
        let (l, r) = idx.extend_left(range, b'M');
        assert_eq!(r - l, 1);
        let (l, r) = idx.extend_left(range, b'W');
        assert!(l >= r);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let mut idx = small_index();
        idx.set_meta(IndexMeta { source_file: Some("mem".into()), ..IndexMeta::default() });
        let path = std::env::temp_dir().join(format!("pepmap-test-{}.pidx", std::process::id()));
        let path = path.to_string_lossy().to_string();
        idx.save_to_file(&path).unwrap();
        let loaded = ProteinIndex::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.meta().source_file.as_deref(), Some("mem"));
        assert_eq!(loaded.count("PEPTIDE"), idx.count("PEPTIDE"));
        assert_eq!(loaded.sequence("A2-REVERSED"), Some("EDITPEPGG"));
    }
}
