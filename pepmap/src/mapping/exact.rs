//! 精确 / 歧义匹配。
//!
//! 在正向索引上自右向左做后向搜索。`String` 模式下每个位置只有一个分支；
//! 其余模式下组合残基（B/J/Z/X）以及语料中的 `X` 会产生多个分支，
//! 搜索以显式栈展开并在通配数超出上限时剪枝。

use crate::index::ProteinIndex;
use crate::model::PeptideProteinMapping;
use crate::params::SequenceMatchingParams;
use crate::util::aa;

use super::engine::SearchBudget;
use super::{expand_candidates, Candidate, MatchTable};

const ROOT: u32 = u32::MAX;

struct Frame {
    pos: usize,
    lo: usize,
    hi: usize,
    x: usize,
    node: u32,
}

pub fn match_peptide(index: &ProteinIndex, peptide: &str, matching: &SequenceMatchingParams) -> Vec<PeptideProteinMapping> {
    let query = aa::normalize_seq(peptide.trim().as_bytes());
    if query.is_empty() {
        return Vec::new();
    }
    if matching.rejects_query(&query) {
        log::debug!("'{}' exceeds the wildcard limit, skipping", peptide);
        return Vec::new();
    }
    let table = MatchTable::new(matching.matching_type);
    let max_x = matching.max_x(query.len());
    let fm = index.forward();
    let mut budget = SearchBudget::new(&matching.limits);

    // 节点池：(语料残基, 父节点)
    let mut arena: Vec<(u8, u32)> = Vec::new();
    let mut candidates = Vec::new();
    let (lo, hi) = fm.full_range();
    let mut stack = vec![Frame { pos: query.len(), lo, hi, x: 0, node: ROOT }];

    while let Some(f) = stack.pop() {
        if !budget.tick() {
            log::warn!("search budget exhausted after {} nodes for '{}', results may be incomplete", budget.nodes(), peptide);
            break;
        }
        if f.pos == 0 {
            // 节点链从左端开始，恰为肽段顺序
            let mut corpus = String::with_capacity(query.len());
            let mut n = f.node;
            while n != ROOT {
                let (c, parent) = arena[n as usize];
                corpus.push(c as char);
                n = parent;
            }
            candidates.push(Candidate {
                lo: f.lo,
                hi: f.hi,
                mapping: PeptideProteinMapping {
                    peptide: corpus,
                    accession: String::new(),
                    index: 0,
                    modifications: None,
                    variants: None,
                },
            });
            continue;
        }
        let q = query[f.pos - 1];
        for c in b'A'..=b'Z' {
            if !table.matches(q, c) {
                continue;
            }
            let x = f.x + usize::from(table.is_wildcard(c));
            if x > max_x {
                continue;
            }
            let (l, r) = fm.extend_left(f.lo, f.hi, aa::to_alphabet(c));
            if l >= r {
                continue;
            }
            arena.push((c, f.node));
            stack.push(Frame { pos: f.pos - 1, lo: l, hi: r, x, node: (arena.len() - 1) as u32 });
        }
    }

    expand_candidates(index, candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::corpus::{DecoyParams, ProteinRecord};
    use crate::params::SearchLimits;

    fn index() -> ProteinIndex {
        let records = vec![
            ProteinRecord::new("P1", "P1 test", "MSAECTQDRXKTAFTEAVLLPHKW"),
            ProteinRecord::new("P2", "P2 test", "GGLIKBDDE"),
        ];
        ProteinIndex::from_proteins(records, &DecoyParams::none()).unwrap()
    }

    #[test]
    fn string_mode_needs_identical_residues() {
        let idx = index();
        let hits = match_peptide(&idx, "ECTQDRXKTAF", &SequenceMatchingParams::string());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].accession, "P1");
        assert_eq!(hits[0].index, 3);
        assert!(match_peptide(&idx, "ECTQDRGKTAF", &SequenceMatchingParams::string()).is_empty());
    }

    #[test]
    fn corpus_x_resolves_any_residue() {
        let idx = index();
        let hits = match_peptide(&idx, "ECTQDRGKTAF", &SequenceMatchingParams::amino_acid());
        assert_eq!(hits.len(), 1);
        // 报告的肽段保留语料字符
        assert_eq!(hits[0].peptide, "ECTQDRXKTAF");
    }

    #[test]
    fn wildcard_share_is_capped() {
        let idx = index();
        let mut params = SequenceMatchingParams::amino_acid();
        params.limit_x = 0.0;
        assert!(match_peptide(&idx, "ECTQDRGKTAF", &params).is_empty());
    }

    #[test]
    fn isoleucine_and_leucine_fold() {
        let idx = index();
        assert_eq!(match_peptide(&idx, "GGIIK", &SequenceMatchingParams::indistinguishable()).len(), 1);
        assert!(match_peptide(&idx, "GGIIK", &SequenceMatchingParams::amino_acid()).is_empty());
        // 语料 B 可匹配 D 或 N
        assert_eq!(match_peptide(&idx, "KNDD", &SequenceMatchingParams::amino_acid()).len(), 1);
    }

    #[test]
    fn wildcard_query_is_rejected() {
        let idx = index();
        assert!(match_peptide(&idx, "XXXXXX", &SequenceMatchingParams::indistinguishable()).is_empty());
        assert!(match_peptide(&idx, "ECTQXX", &SequenceMatchingParams::amino_acid()).is_empty());
        assert_eq!(match_peptide(&idx, "ECTQXRXKTAF", &SequenceMatchingParams::amino_acid()).len(), 1);
    }

    #[test]
    fn empty_query_maps_nowhere() {
        assert!(match_peptide(&index(), "  ", &SequenceMatchingParams::string()).is_empty());
    }

    #[test]
    fn exhausted_budget_returns_partial_results() {
        let mut params = SequenceMatchingParams::amino_acid();
        params.limits = SearchLimits { max_nodes: Some(1), timeout_ms: None };
        assert!(match_peptide(&index(), "GGLIK", &params).is_empty());
    }
}
