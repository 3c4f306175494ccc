//! 带变异的肽段匹配：在通配 / 歧义匹配之上允许替换、插入与缺失。
//!
//! 每条映射都是一种解释。同一蛋白位置可能存在多种等价解释
//! （例如“替换 + 缺失”与“插入 + 替换”），这些解释全部保留，只去除完全相同的映射。

use crate::index::ProteinIndex;
use crate::model::{PeptideProteinMapping, PeptideVariantMatches};
use crate::modification::ModificationSet;
use crate::params::{PeptideVariantsParams, SequenceMatchingParams};
use crate::util::aa;

use super::engine::{assemble, Component, Direction, SearchBudget, Seed, Walker};
use super::{expand_candidates, Candidate, MatchTable};

pub fn match_with_variants(
    index: &ProteinIndex,
    peptide: &str,
    matching: &SequenceMatchingParams,
    variants: &PeptideVariantsParams,
) -> Vec<PeptideProteinMapping> {
    let query = aa::normalize_seq(peptide.trim().as_bytes());
    if query.is_empty() || matching.rejects_query(&query) {
        return Vec::new();
    }
    let table = MatchTable::new(matching.matching_type);
    let mods = ModificationSet::empty();
    let comps = [Component::Literal(query.clone())];
    let walker = Walker {
        fm: index.forward(),
        dir: Direction::Leftward,
        comps: &comps,
        table: &table,
        variants,
        mods: &mods,
        tolerance: 0.0,
        max_var_mods: 0,
        max_x: matching.max_x(query.len()),
        interior_start: false,
    };
    let mut budget = SearchBudget::new(&matching.limits);
    let emissions = walker.run(Seed::full(index.forward()), &mut budget);
    if budget.exhausted() {
        log::warn!("search budget exhausted after {} nodes for '{}', results may be incomplete", budget.nodes(), peptide);
    }

    let candidates = emissions
        .into_iter()
        .map(|e| {
            let a = assemble(&e.steps, &mods);
            Candidate {
                lo: e.lo,
                hi: e.hi,
                mapping: PeptideProteinMapping {
                    peptide: a.peptide,
                    accession: String::new(),
                    index: 0,
                    modifications: None,
                    variants: (!a.variants.is_empty()).then(|| PeptideVariantMatches::new(a.variants)),
                },
            }
        })
        .collect();
    expand_candidates(index, candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::corpus::{DecoyParams, ProteinRecord};
    use crate::model::{Variant, VariantMatch};

    fn index() -> ProteinIndex {
        let records = vec![ProteinRecord::new("P1", "P1", "MSAECTQDRXKTAFTEAVLLPHKW")];
        ProteinIndex::from_proteins(records, &DecoyParams::none()).unwrap()
    }

    fn has(hits: &[PeptideProteinMapping], index: usize, expected: &[VariantMatch]) -> bool {
        hits.iter().any(|m| {
            m.index == index && m.variants.as_ref().map_or(expected.is_empty(), |v| v.iter().eq(expected.iter()))
        })
    }

    #[test]
    fn exact_peptide_needs_no_variant() {
        let hits = match_with_variants(&index(), "ECTQDRXKTAF", &SequenceMatchingParams::indistinguishable(), &PeptideVariantsParams::generic(1));
        assert!(has(&hits, 3, &[]));
    }

    #[test]
    fn deletion_reports_following_site() {
        // 语料 ...KTAFTE...，肽段缺少 A
        let hits = match_with_variants(&index(), "CTQDRXKTFTE", &SequenceMatchingParams::indistinguishable(), &PeptideVariantsParams::specific(0, 0, 1));
        let expected = [VariantMatch { site: 9, variant: Variant::Deletion { deleted: 'A' } }];
        assert!(has(&hits, 4, &expected));
        assert!(hits.iter().all(|m| m.variant_count() <= 1));
    }

    #[test]
    fn insertion_and_substitution() {
        let params = PeptideVariantsParams::generic(1);
        let hits = match_with_variants(&index(), "ECTQKDRXK", &SequenceMatchingParams::indistinguishable(), &params);
        assert!(has(&hits, 3, &[VariantMatch { site: 5, variant: Variant::Insertion { inserted: 'K' } }]));

        let hits = match_with_variants(&index(), "ECTQDKXKTAF", &SequenceMatchingParams::indistinguishable(), &params);
        assert!(has(&hits, 3, &[VariantMatch { site: 6, variant: Variant::Substitution { original: 'R', substituted: 'K' } }]));
    }

    #[test]
    fn no_insertions_at_peptide_ends() {
        // 末端插入只会重复解释一个更短的精确匹配
        let hits = match_with_variants(&index(), "ECTQDRAKTAFTEAVLLPHK", &SequenceMatchingParams::indistinguishable(), &PeptideVariantsParams::generic(1));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].index, 3);
        assert!(hits[0].variants.is_none());
    }

    #[test]
    fn literal_longer_than_u16_range() {
        let mut x: u32 = 7;
        let protein: String = (0..70_000)
            .map(|_| {
                x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                aa::STANDARD[(x >> 16) as usize % aa::STANDARD.len()] as char
            })
            .collect();
        let idx = ProteinIndex::from_proteins(vec![ProteinRecord::new("LONG", "LONG", &protein)], &DecoyParams::none()).unwrap();
        let hits = match_with_variants(&idx, &protein, &SequenceMatchingParams::string(), &PeptideVariantsParams::specific(0, 0, 0));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].index, 0);
        assert_eq!(hits[0].peptide.len(), 70_000);
    }

    #[test]
    fn over_budget_is_rejected() {
        let hits = match_with_variants(&index(), "ECTQDKXKTGF", &SequenceMatchingParams::indistinguishable(), &PeptideVariantsParams::generic(1));
        assert!(hits.is_empty());
    }
}
