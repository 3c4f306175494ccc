//! 映射结果：不可变的肽段-蛋白映射记录。

use std::collections::HashMap;
use std::fmt::{self, Display};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Variant {
    /// 蛋白上的 `original` 在肽段中变为 `substituted`
    Substitution { original: char, substituted: char },
    /// 肽段多出的残基
    Insertion { inserted: char },
    /// 蛋白上存在而肽段缺失的残基
    Deletion { deleted: char },
}

impl Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Substitution { original, substituted } => write!(f, "{}>{}", original, substituted),
            Variant::Insertion { inserted } => write!(f, "ins{}", inserted),
            Variant::Deletion { deleted } => write!(f, "del{}", deleted),
        }
    }
}

/// A variant at a 1-based peptide site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VariantMatch {
    pub site: usize,
    pub variant: Variant,
}

/// 一条映射使用的全部变异，按位点排序（同一位点可有多个变异）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PeptideVariantMatches {
    matches: Vec<VariantMatch>,
}

impl PeptideVariantMatches {
    pub fn new(mut matches: Vec<VariantMatch>) -> Self {
        matches.sort_by_key(|m| m.site);
        Self { matches }
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariantMatch> {
        self.matches.iter()
    }

    pub fn at(&self, site: usize) -> impl Iterator<Item = &Variant> {
        self.matches.iter().filter(move |m| m.site == site).map(|m| &m.variant)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// (substitutions, insertions, deletions)
    pub fn counts(&self) -> (usize, usize, usize) {
        self.matches.iter().fold((0, 0, 0), |(s, i, d), m| match m.variant {
            Variant::Substitution { .. } => (s + 1, i, d),
            Variant::Insertion { .. } => (s, i + 1, d),
            Variant::Deletion { .. } => (s, i, d + 1),
        })
    }
}

impl Display for PeptideVariantMatches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, m) in self.matches.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{}", m.site, m.variant)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModificationMatch {
    pub name: String,
    /// 1-based peptide site; N-terminal modifications sit at 1, C-terminal ones at the peptide length
    pub site: usize,
    pub variable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PeptideProteinMapping {
    /// 实际落在蛋白上的肽段（通配与变异已具体化）
    pub peptide: String,
    pub accession: String,
    /// 0-based start in the protein
    pub index: usize,
    pub modifications: Option<Vec<ModificationMatch>>,
    pub variants: Option<PeptideVariantMatches>,
}

impl PeptideProteinMapping {
    pub fn variant_count(&self) -> usize {
        self.variants.as_ref().map_or(0, PeptideVariantMatches::len)
    }

    /// `name@site` pairs joined by `;`.
    pub fn modifications_string(&self) -> String {
        match &self.modifications {
            Some(mods) => mods.iter().map(|m| format!("{}@{}", m.name, m.site)).collect::<Vec<_>>().join(";"),
            None => String::new(),
        }
    }
}

/// 聚合视图：peptide → accession → 排序后的起始位置。
///
/// 每条映射对应一个位置；同一位置的不同变异解释各占一项，与平铺列表条数一致。
pub fn peptide_protein_indexes_map(mappings: &[PeptideProteinMapping]) -> HashMap<String, HashMap<String, Vec<usize>>> {
    let mut out: HashMap<String, HashMap<String, Vec<usize>>> = HashMap::new();
    for m in mappings {
        out.entry(m.peptide.clone()).or_default().entry(m.accession.clone()).or_default().push(m.index);
    }
    for proteins in out.values_mut() {
        for idx in proteins.values_mut() {
            idx.sort_unstable();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(peptide: &str, accession: &str, index: usize) -> PeptideProteinMapping {
        PeptideProteinMapping {
            peptide: peptide.into(),
            accession: accession.into(),
            index,
            modifications: None,
            variants: None,
        }
    }

    #[test]
    fn grouped_view_agrees_with_flat_list() {
        let flat = vec![mapping("PEP", "A", 9), mapping("PEP", "A", 1), mapping("PEP", "B", 2), mapping("KR", "A", 0)];
        let grouped = peptide_protein_indexes_map(&flat);
        assert_eq!(grouped["PEP"]["A"], vec![1, 9]);
        assert_eq!(grouped["PEP"]["B"], vec![2]);
        let total: usize = grouped.values().flat_map(|p| p.values()).map(Vec::len).sum();
        assert_eq!(total, flat.len());
    }

    #[test]
    fn grouped_view_keeps_every_explanation() {
        let mut deletion = mapping("ECTQDR", "A", 3);
        deletion.variants = Some(PeptideVariantMatches::new(vec![VariantMatch { site: 2, variant: Variant::Deletion { deleted: 'S' } }]));
        let mut substitution = mapping("ECTQDR", "A", 3);
        substitution.variants =
            Some(PeptideVariantMatches::new(vec![VariantMatch { site: 6, variant: Variant::Substitution { original: 'K', substituted: 'R' } }]));
        let flat = vec![deletion, substitution, mapping("ECTQDR", "A", 0)];
        let grouped = peptide_protein_indexes_map(&flat);
        assert_eq!(grouped["ECTQDR"]["A"], vec![0, 3, 3]);
    }

    #[test]
    fn variant_matches_are_site_ordered() {
        let v = PeptideVariantMatches::new(vec![
            VariantMatch { site: 14, variant: Variant::Insertion { inserted: 'K' } },
            VariantMatch { site: 4, variant: Variant::Deletion { deleted: 'Q' } },
            VariantMatch { site: 8, variant: Variant::Substitution { original: 'T', substituted: 'P' } },
        ]);
        let sites: Vec<_> = v.iter().map(|m| m.site).collect();
        assert_eq!(sites, vec![4, 8, 14]);
        assert_eq!(v.counts(), (1, 1, 1));
        assert_eq!(v.to_string(), "4:delQ,8:T>P,14:insK");
        assert_eq!(v.at(8).count(), 1);
    }
}
