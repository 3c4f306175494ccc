//! 序列标签映射。
//!
//! 以最长字面片段为锚点：先在反向索引上向 C 端扩展（锚点及其右侧组件），
//! 再把得到的语料串放回正向索引，向 N 端扩展左侧组件。两次扩展共用一份搜索预算。
//!
//! 蛋白终端修饰只有在区间内存在位于蛋白端点的出现时才会尝试；端点约束在定位后
//! 对每个命中做最终确认。

use std::collections::HashSet;

use anyhow::Result;
use rayon::prelude::*;

use crate::index::ProteinIndex;
use crate::model::{PeptideProteinMapping, PeptideVariantMatches};
use crate::modification::{ModificationRegistry, ModificationSet, Terminus};
use crate::params::{PeptideVariantsParams, SearchParams, SequenceMatchingParams};
use crate::tag::{Tag, TagComponent};
use crate::util::aa;

use super::engine::{assemble, BoundaryFilter, Component, Direction, Emission, SearchBudget, Seed, Walker};
use super::MatchTable;

/// 绑定到某个索引与一组修饰参数的标签匹配器。
///
/// 修饰在构造时解析一次，之后可在多个线程中共享。
#[derive(Debug, Clone)]
pub struct TagMapper<'a> {
    index: &'a ProteinIndex,
    mods: ModificationSet,
    search: SearchParams,
}

impl<'a> TagMapper<'a> {
    pub fn new(index: &'a ProteinIndex, search: &SearchParams, registry: &ModificationRegistry) -> Result<Self> {
        let mods = ModificationSet::resolve(registry, &search.modifications)?;
        Ok(Self { index, mods, search: search.clone() })
    }

    pub fn modifications(&self) -> &ModificationSet {
        &self.mods
    }

    pub fn match_tag(
        &self,
        tag: &Tag,
        matching: &SequenceMatchingParams,
        variants: &PeptideVariantsParams,
    ) -> Vec<PeptideProteinMapping> {
        let Some(anchor) = tag.longest_sequence() else {
            log::debug!("tag '{}' has no amino acid sequence, skipping", tag);
            return Vec::new();
        };
        if matching.rejects_query(&aa::normalize_seq(tag.as_sequence().as_bytes())) {
            log::debug!("tag '{}' exceeds the wildcard limit, skipping", tag);
            return Vec::new();
        }
        let comps = components(tag);
        let left: Vec<Component> = comps[..anchor].iter().rev().cloned().collect();
        let table = MatchTable::new(matching.matching_type);
        let tolerance = self.search.tolerance_da(tag.peptide_mass());
        let mut budget = SearchBudget::new(&matching.limits);

        let reverse = self.index.reverse();
        let forward = self.index.forward();
        let rightward = Walker {
            fm: reverse,
            dir: Direction::Rightward,
            comps: &comps[anchor..],
            table: &table,
            variants,
            mods: &self.mods,
            tolerance,
            max_var_mods: matching.max_ptms_per_tag_peptide,
            // 通配比例依赖最终肽段长度，组装后再检查
            max_x: usize::MAX,
            interior_start: anchor > 0,
        };
        let leftward = Walker { fm: forward, dir: Direction::Leftward, comps: &left, ..rightward };
        let found = rightward.run(Seed::full(reverse), &mut budget);

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for right in found {
            if budget.exhausted() {
                break;
            }
            let corpus: Vec<u8> = right.steps.iter().filter(|s| s.corpus != 0).map(|s| aa::to_alphabet(s.corpus)).collect();
            let range = if corpus.is_empty() { Some(forward.full_range()) } else { forward.backward_search(&corpus) };
            let Some((lo, hi)) = range else { continue };

            // 左侧缺口紧邻的是右段的第一个肽段残基
            let mut counters = right.counters;
            counters.edge = right.steps.iter().find(|s| s.residue != 0).map_or(0, |s| s.residue);
            let seed = Seed { lo, hi, counters, protein_start: BoundaryFilter::Any, protein_end: right.protein_end };
            for l in leftward.run(seed, &mut budget) {
                self.collect(&l, &right, matching, &mut seen, &mut out);
            }
        }
        if budget.exhausted() {
            log::warn!("search budget exhausted after {} nodes for tag '{}', results may be incomplete", budget.nodes(), tag);
        }
        out
    }

    /// 合并左右两段路径，定位并按蛋白端点约束过滤。
    fn collect(
        &self,
        left: &Emission,
        right: &Emission,
        matching: &SequenceMatchingParams,
        seen: &mut HashSet<PeptideProteinMapping>,
        out: &mut Vec<PeptideProteinMapping>,
    ) {
        let steps: Vec<_> = left.steps.iter().chain(right.steps.iter()).copied().collect();
        let a = assemble(&steps, &self.mods);
        if left.counters.x as usize > matching.max_x(a.peptide.len()) {
            return;
        }
        let corpus_len = left.counters.corpus_len as usize;
        let variants = (!a.variants.is_empty()).then(|| PeptideVariantMatches::new(a.variants));
        for hit in self.index.locate((left.lo, left.hi)) {
            let protein = self.index.corpus().protein(hit.protein);
            if !left.protein_start.accepts(hit.offset == 0)
                || !left.protein_end.accepts(hit.offset + corpus_len == protein.sequence.len())
            {
                continue;
            }
            let m = PeptideProteinMapping {
                peptide: a.peptide.clone(),
                accession: protein.accession.clone(),
                index: hit.offset,
                modifications: Some(a.modifications.clone()),
                variants: variants.clone(),
            };
            if seen.insert(m.clone()) {
                out.push(m);
            }
        }
    }

    /// 并行映射一批标签，结果顺序与输入一致。
    pub fn map_tags(
        &self,
        tags: &[Tag],
        matching: &SequenceMatchingParams,
        variants: &PeptideVariantsParams,
    ) -> Vec<Vec<PeptideProteinMapping>> {
        tags.par_iter().map(|t| self.match_tag(t, matching, variants)).collect()
    }
}

/// 标签组件转为搜索组件；首尾缺口分别带 N / C 端标记。
fn components(tag: &Tag) -> Vec<Component> {
    let last = tag.content().len().saturating_sub(1);
    tag.content()
        .iter()
        .enumerate()
        .map(|(i, c)| match c {
            TagComponent::Sequence(s) => Component::Literal(aa::normalize_seq(s.as_bytes())),
            TagComponent::MassGap(m) => {
                let terminus = if i == 0 {
                    Some(Terminus::N)
                } else if i == last {
                    Some(Terminus::C)
                } else {
                    None
                };
                Component::Gap { target: *m, terminus }
            }
        })
        .collect()
}

impl ProteinIndex {
    /// 单个标签的便捷入口；批量查询应复用 [`TagMapper`]。
    pub fn match_tag(
        &self,
        tag: &Tag,
        matching: &SequenceMatchingParams,
        variants: &PeptideVariantsParams,
        search: &SearchParams,
        registry: &ModificationRegistry,
    ) -> Result<Vec<PeptideProteinMapping>> {
        Ok(TagMapper::new(self, search, registry)?.match_tag(tag, matching, variants))
    }
}
