//! 匹配参数：序列匹配、变异预算与质量容差。均可由 JSON 参数文件反序列化。

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::index::corpus::DecoyParams;
use crate::substitution::SubstitutionMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingType {
    /// 逐字匹配
    String,
    /// 组合残基（B/J/Z/X）按其具体残基展开
    AminoAcid,
    /// 在 AminoAcid 基础上 I 与 L 视为相同
    #[default]
    IndistinguishableAminoAcids,
}

/// Upper bounds on a single query's search tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    pub max_nodes: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl SearchLimits {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceMatchingParams {
    pub matching_type: MatchingType,
    /// 匹配中通配残基 X 所占比例上限
    pub limit_x: f64,
    /// 标签匹配时单条肽段可放置的可变修饰数上限
    pub max_ptms_per_tag_peptide: usize,
    pub limits: SearchLimits,
}

impl Default for SequenceMatchingParams {
    fn default() -> Self {
        Self {
            matching_type: MatchingType::default(),
            limit_x: 0.25,
            max_ptms_per_tag_peptide: 3,
            limits: SearchLimits::default(),
        }
    }
}

impl SequenceMatchingParams {
    pub fn with_type(matching_type: MatchingType) -> Self {
        Self { matching_type, ..Self::default() }
    }

    pub fn string() -> Self {
        Self::with_type(MatchingType::String)
    }

    pub fn amino_acid() -> Self {
        Self::with_type(MatchingType::AminoAcid)
    }

    pub fn indistinguishable() -> Self {
        Self::with_type(MatchingType::IndistinguishableAminoAcids)
    }

    /// Largest wildcard count tolerated in a peptide of `len` residues.
    #[inline]
    pub fn max_x(&self, len: usize) -> usize {
        (self.limit_x.max(0.0) * len as f64 + 1e-9).floor() as usize
    }

    /// 查询自身的 X 占比达到 `limit_x` 时整条查询不做匹配。
    /// `String` 模式下 X 只与 X 相配，不受此限制。
    pub fn rejects_query(&self, query: &[u8]) -> bool {
        if self.matching_type == MatchingType::String || query.is_empty() {
            return false;
        }
        let x = query.iter().filter(|&&c| c == b'X').count();
        x > 0 && x as f64 / query.len() as f64 >= self.limit_x
    }
}

/// 变异预算。generic 模式下三类变异共享 `n_variants`；
/// specific 模式下分别受各自上限约束。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeptideVariantsParams {
    pub n_variants: usize,
    pub use_specific_count: bool,
    pub n_substitutions: usize,
    pub n_insertions: usize,
    pub n_deletions: usize,
    pub substitution_matrix: SubstitutionMatrix,
}

impl Default for PeptideVariantsParams {
    fn default() -> Self {
        Self::no_variants()
    }
}

impl PeptideVariantsParams {
    pub fn no_variants() -> Self {
        Self {
            n_variants: 0,
            use_specific_count: false,
            n_substitutions: 0,
            n_insertions: 0,
            n_deletions: 0,
            substitution_matrix: SubstitutionMatrix::all(),
        }
    }

    pub fn generic(n_variants: usize) -> Self {
        Self { n_variants, ..Self::no_variants() }
    }

    pub fn specific(n_substitutions: usize, n_insertions: usize, n_deletions: usize) -> Self {
        Self {
            use_specific_count: true,
            n_substitutions,
            n_insertions,
            n_deletions,
            ..Self::no_variants()
        }
    }

    pub fn with_matrix(mut self, matrix: SubstitutionMatrix) -> Self {
        self.substitution_matrix = matrix;
        self
    }

    /// 是否允许 (subs, ins, dels) 这一累计变异组合。
    #[inline]
    pub fn allows(&self, subs: usize, ins: usize, dels: usize) -> bool {
        if self.use_specific_count {
            subs <= self.n_substitutions && ins <= self.n_insertions && dels <= self.n_deletions
        } else {
            subs + ins + dels <= self.n_variants
        }
    }

    pub fn any_allowed(&self) -> bool {
        self.allows(1, 0, 0) || self.allows(0, 1, 0) || self.allows(0, 0, 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MassAccuracyType {
    #[default]
    #[serde(alias = "DA", alias = "da")]
    Da,
    #[serde(alias = "PPM", alias = "ppm")]
    Ppm,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModificationParams {
    pub fixed: Vec<String>,
    pub variable: Vec<String>,
}

impl ModificationParams {
    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty() && self.variable.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub fragment_accuracy: f64,
    pub accuracy_type: MassAccuracyType,
    pub modifications: ModificationParams,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            fragment_accuracy: 0.02,
            accuracy_type: MassAccuracyType::Da,
            modifications: ModificationParams::default(),
        }
    }
}

impl SearchParams {
    pub fn fixed(mut self, name: &str) -> Self {
        self.modifications.fixed.push(name.to_string());
        self
    }

    pub fn variable(mut self, name: &str) -> Self {
        self.modifications.variable.push(name.to_string());
        self
    }

    /// 绝对容差（Da）。ppm 以 `reference_mass` 为基准换算。
    pub fn tolerance_da(&self, reference_mass: f64) -> f64 {
        match self.accuracy_type {
            MassAccuracyType::Da => self.fragment_accuracy,
            MassAccuracyType::Ppm => self.fragment_accuracy * reference_mass / 1e6,
        }
    }
}

/// 参数文件的顶层结构。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingParams {
    pub sequence_matching: SequenceMatchingParams,
    pub variants: PeptideVariantsParams,
    pub search: SearchParams,
    pub decoys: DecoyParams,
    /// 注册表之外的自定义修饰
    pub custom_modifications: Vec<crate::modification::Modification>,
}

impl MappingParams {
    pub fn from_json_file(path: &str) -> Result<Self> {
        let data = std::fs::read_to_string(path).with_context(|| format!("cannot read parameter file '{}'", path))?;
        serde_json::from_str(&data).with_context(|| format!("invalid parameter file '{}'", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_and_specific_budgets() {
        let g = PeptideVariantsParams::generic(2);
        assert!(g.allows(1, 1, 0));
        assert!(!g.allows(1, 1, 1));
        let s = PeptideVariantsParams::specific(1, 0, 2);
        assert!(s.allows(1, 0, 2));
        assert!(!s.allows(0, 1, 0));
        assert!(s.any_allowed());
        assert!(!PeptideVariantsParams::no_variants().any_allowed());
    }

    #[test]
    fn x_limit_floor() {
        let p = SequenceMatchingParams::default();
        assert_eq!(p.max_x(18), 4);
        assert_eq!(p.max_x(4), 1);
        assert_eq!(p.max_x(3), 0);
    }

    #[test]
    fn query_wildcards_are_limited() {
        let p = SequenceMatchingParams::indistinguishable();
        assert!(p.rejects_query(b"XXXXXX"));
        assert!(p.rejects_query(b"ECXX"));
        assert!(!p.rejects_query(b"ECTQDRXKTAF"));
        assert!(!p.rejects_query(b"ECTQDR"));
        assert!(!SequenceMatchingParams::string().rejects_query(b"XXXXXX"));
    }

    #[test]
    fn ppm_tolerance_scales_with_mass() {
        let p = SearchParams { fragment_accuracy: 10.0, accuracy_type: MassAccuracyType::Ppm, ..SearchParams::default() };
        assert!((p.tolerance_da(1000.0) - 0.01).abs() < 1e-12);
        assert_eq!(SearchParams::default().tolerance_da(1000.0), 0.02);
    }

    #[test]
    fn parameters_from_json() {
        let json = r#"{
            "sequence_matching": { "matching_type": "amino_acid", "limit_x": 0.1 },
            "variants": { "use_specific_count": true, "n_deletions": 1, "substitution_matrix": "single_base" },
            "search": { "fragment_accuracy": 5.0, "accuracy_type": "PPM",
                        "modifications": { "fixed": ["Carbamidomethylation of C"] } }
        }"#;
        let p: MappingParams = serde_json::from_str(json).unwrap();
        assert_eq!(p.sequence_matching.matching_type, MatchingType::AminoAcid);
        assert_eq!(p.sequence_matching.max_ptms_per_tag_peptide, 3);
        assert!(p.variants.allows(0, 0, 1));
        assert_eq!(p.variants.substitution_matrix.key(), "single_base");
        assert_eq!(p.search.accuracy_type, MassAccuracyType::Ppm);
        assert_eq!(p.search.modifications.fixed.len(), 1);
        assert!(p.decoys.enabled);
    }
}
