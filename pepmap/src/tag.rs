//! 序列标签：字面氨基酸片段与质量缺口的交替序列。

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::util::aa;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TagComponent {
    Sequence(String),
    MassGap(f64),
}

/// A de novo sequence tag such as `<215.08>TEST<231.11>`.
///
/// Consecutive gaps are merged into one gap and consecutive sequences are
/// concatenated, so components always alternate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    content: Vec<TagComponent>,
}

impl Tag {
    pub fn new() -> Self {
        Self::default()
    }

    /// `nTermGap`, one literal, `cTermGap`.
    pub fn from_gaps(n_term_gap: f64, sequence: &str, c_term_gap: f64) -> Self {
        let mut tag = Self::new();
        tag.add_mass_gap(n_term_gap);
        tag.add_sequence(sequence);
        tag.add_mass_gap(c_term_gap);
        tag
    }

    pub fn add_mass_gap(&mut self, mass: f64) {
        if let Some(TagComponent::MassGap(prev)) = self.content.last_mut() {
            *prev += mass;
        } else {
            self.content.push(TagComponent::MassGap(mass));
        }
    }

    pub fn add_sequence(&mut self, sequence: &str) {
        let sequence = sequence.to_ascii_uppercase();
        if let Some(TagComponent::Sequence(prev)) = self.content.last_mut() {
            prev.push_str(&sequence);
        } else {
            self.content.push(TagComponent::Sequence(sequence));
        }
    }

    pub fn content(&self) -> &[TagComponent] {
        &self.content
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// 字面残基质量与全部缺口之和（不含水）。组合残基按 0 计。
    pub fn mass(&self) -> f64 {
        self.content
            .iter()
            .map(|c| match c {
                TagComponent::Sequence(s) => s.bytes().filter_map(aa::residue_mass).sum::<f64>(),
                TagComponent::MassGap(m) => *m,
            })
            .sum()
    }

    /// 对应完整肽段的预期质量（含水）。
    pub fn peptide_mass(&self) -> f64 {
        self.mass() + aa::H2O
    }

    pub fn n_term_gap(&self) -> f64 {
        match self.content.first() {
            Some(TagComponent::MassGap(m)) => *m,
            _ => 0.0,
        }
    }

    pub fn c_term_gap(&self) -> f64 {
        match self.content.last() {
            Some(TagComponent::MassGap(m)) if self.content.len() > 1 => *m,
            _ => 0.0,
        }
    }

    /// 最长字面片段在组件中的下标；并列时取最靠前的。
    pub fn longest_sequence(&self) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (i, c) in self.content.iter().enumerate() {
            if let TagComponent::Sequence(s) = c {
                if best.map_or(true, |(_, len)| s.len() > len) {
                    best = Some((i, s.len()));
                }
            }
        }
        best.map(|(i, _)| i)
    }

    /// 所有字面片段按顺序拼接。
    pub fn as_sequence(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                TagComponent::Sequence(s) => Some(s.as_str()),
                TagComponent::MassGap(_) => None,
            })
            .collect()
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.content {
            match c {
                TagComponent::Sequence(s) => f.write_str(s)?,
                TagComponent::MassGap(m) => write!(f, "<{:.4}>", m)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagParseError {
    Empty,
    UnclosedGap,
    InvalidMass(String),
    InvalidResidue(char),
}

impl Display for TagParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagParseError::Empty => write!(f, "empty tag"),
            TagParseError::UnclosedGap => write!(f, "unclosed '<' in tag"),
            TagParseError::InvalidMass(s) => write!(f, "invalid mass gap '{}'", s),
            TagParseError::InvalidResidue(c) => write!(f, "invalid residue '{}' in tag", c),
        }
    }
}

impl std::error::Error for TagParseError {}

impl FromStr for Tag {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TagParseError::Empty);
        }
        let mut tag = Tag::new();
        let mut rest = s;
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('<') {
                let end = after.find('>').ok_or(TagParseError::UnclosedGap)?;
                let raw = after[..end].trim();
                let mass: f64 = raw.parse().map_err(|_| TagParseError::InvalidMass(raw.to_string()))?;
                if !mass.is_finite() || mass < 0.0 {
                    return Err(TagParseError::InvalidMass(raw.to_string()));
                }
                tag.add_mass_gap(mass);
                rest = &after[end + 1..];
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                let seq = &rest[..end];
                if let Some(bad) = seq.chars().find(|c| !c.is_ascii_alphabetic()) {
                    return Err(TagParseError::InvalidResidue(bad));
                }
                tag.add_sequence(seq);
                rest = &rest[end..];
            }
        }
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_merge() {
        let mut tag = Tag::new();
        tag.add_mass_gap(100.0);
        tag.add_mass_gap(50.5);
        tag.add_sequence("te");
        tag.add_sequence("ST");
        tag.add_mass_gap(10.0);
        assert_eq!(
            tag.content(),
            &[TagComponent::MassGap(150.5), TagComponent::Sequence("TEST".into()), TagComponent::MassGap(10.0)]
        );
        assert_eq!(tag.n_term_gap(), 150.5);
        assert_eq!(tag.c_term_gap(), 10.0);
        assert_eq!(tag.longest_sequence(), Some(1));
    }

    #[test]
    fn parse_and_display() {
        let tag: Tag = "<215.08>TEST<10>AK<0.5>".parse().unwrap();
        assert_eq!(tag.content().len(), 5);
        assert_eq!(tag.as_sequence(), "TESTAK");
        assert_eq!(tag.longest_sequence(), Some(1));
        assert_eq!(tag.to_string(), "<215.0800>TEST<10.0000>AK<0.5000>");
        let again: Tag = tag.to_string().parse().unwrap();
        assert_eq!(again, tag);
    }

    #[test]
    fn parse_errors() {
        assert_eq!("".parse::<Tag>(), Err(TagParseError::Empty));
        assert_eq!("<12.3TEST".parse::<Tag>(), Err(TagParseError::UnclosedGap));
        assert_eq!("<abc>TEST".parse::<Tag>(), Err(TagParseError::InvalidMass("abc".into())));
        assert_eq!("TE1ST".parse::<Tag>(), Err(TagParseError::InvalidResidue('1')));
    }

    #[test]
    fn mass_sums_residues_and_gaps() {
        let tag = Tag::from_gaps(100.0, "GA", 1.0);
        assert!((tag.mass() - (101.0 + 128.058578)).abs() < 1e-6);
        assert!((tag.peptide_mass() - tag.mass() - aa::H2O).abs() < 1e-12);
    }
}
