//! 修饰定义与注册表。
//!
//! 修饰的位置规格沿用紧凑写法：`^` 肽段 N 端，`$` 肽段 C 端，`[` 蛋白 N 端，
//! `]` 蛋白 C 端，后接可选的残基集合；不带前缀时为残基修饰（如 `C`、`STY`）。

use std::{
    collections::HashMap,
    fmt::{Display, Write},
    str::FromStr,
};

use anyhow::{anyhow, bail, Result};
use serde::{de, Deserialize, Serialize};

use crate::params::ModificationParams;
use crate::util::aa;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModificationSite {
    Residue,
    PeptideN,
    PeptideC,
    ProteinN,
    ProteinC,
}

impl ModificationSite {
    pub fn terminus(self) -> Option<Terminus> {
        match self {
            ModificationSite::Residue => None,
            ModificationSite::PeptideN | ModificationSite::ProteinN => Some(Terminus::N),
            ModificationSite::PeptideC | ModificationSite::ProteinC => Some(Terminus::C),
        }
    }

    pub fn is_protein(self) -> bool {
        matches!(self, ModificationSite::ProteinN | ModificationSite::ProteinC)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Terminus {
    N,
    C,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModificationSpecificity {
    pub site: ModificationSite,
    /// 目标残基；终端修饰为空表示任意残基
    pub residues: Vec<u8>,
}

impl Display for ModificationSpecificity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.site {
            ModificationSite::Residue => {}
            ModificationSite::PeptideN => f.write_char('^')?,
            ModificationSite::PeptideC => f.write_char('$')?,
            ModificationSite::ProteinN => f.write_char('[')?,
            ModificationSite::ProteinC => f.write_char(']')?,
        }
        for &r in &self.residues {
            f.write_char(r as char)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InvalidModification {
    Empty,
    InvalidResidue(char),
}

impl Display for InvalidModification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidModification::Empty => write!(f, "invalid modification string: empty"),
            InvalidModification::InvalidResidue(c) => {
                write!(f, "invalid modification string: unrecognized residue ({})", c)
            }
        }
    }
}

impl std::error::Error for InvalidModification {}

impl FromStr for ModificationSpecificity {
    type Err = InvalidModification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (site, rest) = match s.chars().next() {
            Some('^') => (ModificationSite::PeptideN, &s[1..]),
            Some('$') => (ModificationSite::PeptideC, &s[1..]),
            Some('[') => (ModificationSite::ProteinN, &s[1..]),
            Some(']') => (ModificationSite::ProteinC, &s[1..]),
            Some(_) => (ModificationSite::Residue, s),
            None => return Err(InvalidModification::Empty),
        };
        let mut residues = Vec::with_capacity(rest.len());
        for ch in rest.chars() {
            let b = ch.to_ascii_uppercase() as u32;
            if b > 0x7f || !aa::is_concrete(b as u8) {
                return Err(InvalidModification::InvalidResidue(ch));
            }
            if !residues.contains(&(b as u8)) {
                residues.push(b as u8);
            }
        }
        if site == ModificationSite::Residue && residues.is_empty() {
            return Err(InvalidModification::Empty);
        }
        Ok(Self { site, residues })
    }
}

impl Serialize for ModificationSpecificity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ModificationSpecificity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub name: String,
    /// 单一同位素质量偏移（Da）
    pub mass: f64,
    pub specificity: ModificationSpecificity,
}

impl Modification {
    pub fn new(name: &str, mass: f64, specificity: &str) -> Result<Self, InvalidModification> {
        Ok(Self { name: name.to_string(), mass, specificity: specificity.parse()? })
    }

    #[inline]
    pub fn site(&self) -> ModificationSite {
        self.specificity.site
    }

    /// 该修饰能否落在残基 `aa` 上。
    pub fn targets(&self, aa: u8) -> bool {
        self.specificity.residues.is_empty() || self.specificity.residues.contains(&aa)
    }
}

const COMMON_MODIFICATIONS: &[(&str, f64, &str)] = &[
    ("Carbamidomethylation of C", 57.021464, "C"),
    ("Oxidation of M", 15.994915, "M"),
    ("Phosphorylation of S", 79.966331, "S"),
    ("Phosphorylation of T", 79.966331, "T"),
    ("Phosphorylation of Y", 79.966331, "Y"),
    ("Acetylation of K", 42.010565, "K"),
    ("Acetylation of peptide N-term", 42.010565, "^"),
    ("Acetylation of protein N-term", 42.010565, "["),
    ("Formylation of peptide N-term", 27.994915, "^"),
    ("Carbamylation of peptide N-term", 43.005814, "^"),
    ("Palmitoylation of protein N-term", 238.229666, "["),
    ("Amidation of the peptide C-term", -0.984016, "$"),
    ("Amidation of the protein C-term", -0.984016, "]"),
    ("18O(2) of peptide C-term", 4.008491, "$"),
    ("Pyrolidone from Q", -17.026549, "^Q"),
    ("Pyrolidone from E", -18.010565, "^E"),
    ("Deamidation of N", 0.984016, "N"),
    ("Deamidation of Q", 0.984016, "Q"),
    ("Dehydration of S", -18.010565, "S"),
    ("Dehydration of T", -18.010565, "T"),
    ("HexNAc of S", 203.079373, "S"),
    ("HexNAc of T", 203.079373, "T"),
    ("Methylation of K", 14.01565, "K"),
    ("Methylation of R", 14.01565, "R"),
    ("Dimethylation of K", 28.0313, "K"),
    ("GlyGly of K", 114.042927, "K"),
    ("Sulfation of Y", 79.956815, "Y"),
];

/// 只读修饰注册表：按名称查找修饰定义。构建一次后以引用传入匹配器。
#[derive(Debug, Clone)]
pub struct ModificationRegistry {
    mods: Vec<Modification>,
    by_name: HashMap<String, usize>,
}

impl Default for ModificationRegistry {
    /// Registry preloaded with common Unimod modifications.
    fn default() -> Self {
        let mut reg = Self::empty();
        for &(name, mass, spec) in COMMON_MODIFICATIONS {
            if let Ok(m) = Modification::new(name, mass, spec) {
                reg.by_name.insert(m.name.clone(), reg.mods.len());
                reg.mods.push(m);
            }
        }
        reg
    }
}

impl ModificationRegistry {
    pub fn empty() -> Self {
        Self { mods: Vec::new(), by_name: HashMap::new() }
    }

    pub fn add(&mut self, m: Modification) -> Result<()> {
        if self.by_name.contains_key(&m.name) {
            bail!("modification '{}' is already registered", m.name);
        }
        self.by_name.insert(m.name.clone(), self.mods.len());
        self.mods.push(m);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Modification> {
        self.by_name.get(name).map(|&i| &self.mods[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Modification> {
        self.mods.iter()
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }
}

/// 一个已解析的修饰，附带 fixed / variable 标记。
#[derive(Debug, Clone)]
pub struct ResolvedModification {
    pub name: String,
    pub mass: f64,
    pub site: ModificationSite,
    pub fixed: bool,
    /// 目标残基位图（bit = 字母序号），0 表示任意残基
    mask: u32,
}

impl ResolvedModification {
    #[inline]
    pub fn targets(&self, aa: u8) -> bool {
        self.mask == 0 || (aa.is_ascii_uppercase() && self.mask & (1 << (aa - b'A')) != 0)
    }
}

/// 针对一次标签搜索按残基 / 终端预先分组的修饰集合。
#[derive(Debug, Clone)]
pub struct ModificationSet {
    mods: Vec<ResolvedModification>,
    residue_fixed: [Option<u16>; 26],
    residue_variable: Vec<Vec<u16>>,
    n_term: Vec<u16>,
    c_term: Vec<u16>,
}

impl ModificationSet {
    pub fn empty() -> Self {
        Self {
            mods: Vec::new(),
            residue_fixed: [None; 26],
            residue_variable: vec![Vec::new(); 26],
            n_term: Vec::new(),
            c_term: Vec::new(),
        }
    }

    /// 按名称解析 fixed / variable 修饰；名称未注册时报错。
    pub fn resolve(registry: &ModificationRegistry, params: &ModificationParams) -> Result<Self> {
        let mut set = Self::empty();
        let named = params.fixed.iter().map(|n| (n, true)).chain(params.variable.iter().map(|n| (n, false)));
        for (name, fixed) in named {
            let m = registry.get(name).ok_or_else(|| anyhow!("unknown modification '{}'", name))?;
            let mask = m.specificity.residues.iter().fold(0u32, |acc, &r| acc | 1 << (r - b'A'));
            let id = set.mods.len() as u16;
            set.mods.push(ResolvedModification { name: m.name.clone(), mass: m.mass, site: m.site(), fixed, mask });

            match m.site().terminus() {
                Some(Terminus::N) => set.n_term.push(id),
                Some(Terminus::C) => set.c_term.push(id),
                None => {
                    for &r in &m.specificity.residues {
                        let slot = (r - b'A') as usize;
                        if !fixed {
                            set.residue_variable[slot].push(id);
                        } else if let Some(prev) = set.residue_fixed[slot] {
                            log::warn!(
                                "fixed modifications '{}' and '{}' both target {}; keeping '{}'",
                                set.mods[prev as usize].name,
                                m.name,
                                r as char,
                                set.mods[prev as usize].name
                            );
                        } else {
                            set.residue_fixed[slot] = Some(id);
                        }
                    }
                }
            }
        }
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    #[inline]
    pub fn get(&self, id: u16) -> &ResolvedModification {
        &self.mods[id as usize]
    }

    #[inline]
    pub fn fixed_on(&self, aa: u8) -> Option<u16> {
        aa.is_ascii_uppercase().then(|| self.residue_fixed[(aa - b'A') as usize]).flatten()
    }

    #[inline]
    pub fn variable_on(&self, aa: u8) -> &[u16] {
        if aa.is_ascii_uppercase() { &self.residue_variable[(aa - b'A') as usize] } else { &[] }
    }

    #[inline]
    pub fn terminal(&self, terminus: Terminus) -> &[u16] {
        match terminus {
            Terminus::N => &self.n_term,
            Terminus::C => &self.c_term,
        }
    }

    /// 是否存在可落在 `aa` 上的蛋白终端修饰。
    pub fn has_protein_terminal(&self, terminus: Terminus, aa: u8) -> bool {
        self.terminal(terminus).iter().map(|&id| self.get(id)).any(|m| m.site.is_protein() && m.targets(aa))
    }

    /// 终端修饰可能带来的最大质量减少（非正）。
    pub fn min_terminal_mass(&self, terminus: Terminus) -> f64 {
        self.terminal(terminus).iter().map(|&id| self.get(id).mass).fold(0.0, f64::min)
    }

    /// 指定位置上须强制放置的 fixed 终端修饰（只取第一个）。
    pub fn forced_terminal(&self, terminus: Terminus, aa: u8, at_protein_end: bool) -> Option<u16> {
        self.terminal(terminus)
            .iter()
            .copied()
            .find(|&id| {
                let m = self.get(id);
                m.fixed && m.targets(aa) && (!m.site.is_protein() || at_protein_end)
            })
    }

    /// 可选的 variable 终端修饰。
    pub fn optional_terminal(&self, terminus: Terminus, aa: u8, at_protein_end: bool) -> impl Iterator<Item = u16> + '_ {
        self.terminal(terminus).iter().copied().filter(move |&id| {
            let m = self.get(id);
            !m.fixed && m.targets(aa) && (!m.site.is_protein() || at_protein_end)
        })
    }
}
