//! 查询层：肽段精确 / 歧义匹配、带变异匹配、序列标签匹配。
//!
//! 索引只读共享；每次查询的搜索状态（帧栈与节点池）均为调用内局部状态，
//! 因此同一个 [`ProteinIndex`] 可以在多个线程中并发查询。

pub(crate) mod engine;
pub mod exact;
pub mod tag;
pub mod variants;

use std::collections::HashSet;

use rayon::prelude::*;

use crate::index::ProteinIndex;
use crate::model::PeptideProteinMapping;
use crate::params::{MatchingType, PeptideVariantsParams, SequenceMatchingParams};
use crate::util::aa;

pub use tag::TagMapper;

/// Indistinguishable matching folds L onto I; X and J then only expand to I.
const STANDARD_WITHOUT_L: &[u8] = b"ACDEFGHIKMNPQRSTVWY";

/// 查询残基 × 语料残基 的可匹配表，按匹配模式一次性生成。
#[derive(Debug, Clone)]
pub(crate) struct MatchTable {
    mode: MatchingType,
    ok: [u32; 26],
}

impl MatchTable {
    pub(crate) fn new(mode: MatchingType) -> Self {
        let fold = |r: u8| if mode == MatchingType::IndistinguishableAminoAcids && r == b'L' { b'I' } else { r };
        let mut ok = [0u32; 26];
        for q in b'A'..=b'Z' {
            for c in b'A'..=b'Z' {
                let hit = match mode {
                    MatchingType::String => q == c,
                    _ => {
                        q == c
                            || aa::concrete(q)
                                .iter()
                                .any(|&a| aa::concrete(c).iter().any(|&b| fold(a) == fold(b)))
                    }
                };
                if hit {
                    ok[(q - b'A') as usize] |= 1 << (c - b'A');
                }
            }
        }
        Self { mode, ok }
    }

    /// 语料残基 `corpus` 能否匹配查询残基 `query`（均为大写 ASCII）。
    #[inline]
    pub(crate) fn matches(&self, query: u8, corpus: u8) -> bool {
        query.is_ascii_uppercase() && corpus.is_ascii_uppercase() && self.ok[(query - b'A') as usize] & (1 << (corpus - b'A')) != 0
    }

    /// 语料中的 X 计入通配比例。
    #[inline]
    pub(crate) fn is_wildcard(&self, corpus: u8) -> bool {
        corpus == b'X' && self.mode != MatchingType::String
    }

    /// 质量缺口内，语料残基可解释成的具体残基。
    pub(crate) fn gap_residues(&self, corpus: u8) -> &'static [u8] {
        match (self.mode, corpus) {
            (MatchingType::String, c) if !aa::is_concrete(c) => &[],
            (MatchingType::IndistinguishableAminoAcids, b'X') => STANDARD_WITHOUT_L,
            (MatchingType::IndistinguishableAminoAcids, b'J') => b"I",
            (_, c) => aa::concrete(c),
        }
    }
}

/// 匹配器产出的候选：正向索引区间及其肽段解释，定位后展开为映射。
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub lo: usize,
    pub hi: usize,
    pub mapping: PeptideProteinMapping,
}

/// 定位候选区间，每个命中生成一条映射；完全相同的映射只保留一条。
pub(crate) fn expand_candidates(index: &ProteinIndex, candidates: Vec<Candidate>) -> Vec<PeptideProteinMapping> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for cand in candidates {
        for hit in index.locate((cand.lo, cand.hi)) {
            let mut m = cand.mapping.clone();
            m.accession.clone_from(&index.corpus().protein(hit.protein).accession);
            m.index = hit.offset;
            if seen.insert(m.clone()) {
                out.push(m);
            }
        }
    }
    out
}

impl ProteinIndex {
    /// 精确 / 歧义匹配，不允许变异。
    pub fn match_peptide(&self, peptide: &str, matching: &SequenceMatchingParams) -> Vec<PeptideProteinMapping> {
        exact::match_peptide(self, peptide, matching)
    }

    /// 带变异预算的匹配。
    pub fn match_with_variants(
        &self,
        peptide: &str,
        matching: &SequenceMatchingParams,
        variants: &PeptideVariantsParams,
    ) -> Vec<PeptideProteinMapping> {
        variants::match_with_variants(self, peptide, matching, variants)
    }

    /// 按变异参数自动选择精确或带变异匹配。
    pub fn map_peptide(
        &self,
        peptide: &str,
        matching: &SequenceMatchingParams,
        variants: &PeptideVariantsParams,
    ) -> Vec<PeptideProteinMapping> {
        if variants.any_allowed() {
            self.match_with_variants(peptide, matching, variants)
        } else {
            self.match_peptide(peptide, matching)
        }
    }

    /// 并行批量映射，结果顺序与输入一致。
    pub fn map_peptides<S: AsRef<str> + Sync>(
        &self,
        peptides: &[S],
        matching: &SequenceMatchingParams,
        variants: &PeptideVariantsParams,
    ) -> Vec<Vec<PeptideProteinMapping>> {
        peptides.par_iter().map(|p| self.map_peptide(p.as_ref(), matching, variants)).collect()
    }
}
