//! 氨基酸替换矩阵：限定变异搜索中允许的 original → substituted 组合。

use serde::{Deserialize, Serialize};

use crate::util::codon;

/// 命名的替换矩阵。行为原始残基，列为替换后残基，按位存储。
///
/// 配置文件中预定义矩阵写作名称（如 `"single_base"`），
/// 自定义矩阵写作两字母对列表（如 `["AR", "KR"]`）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MatrixRepr", into = "MatrixRepr")]
pub struct SubstitutionMatrix {
    key: String,
    rows: [u32; 26],
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum MatrixRepr {
    Named(String),
    Pairs(Vec<String>),
}

impl TryFrom<MatrixRepr> for SubstitutionMatrix {
    type Error = String;

    fn try_from(repr: MatrixRepr) -> Result<Self, Self::Error> {
        match repr {
            MatrixRepr::Named(name) => Self::by_name(&name).ok_or_else(|| format!("unknown substitution matrix '{}'", name)),
            MatrixRepr::Pairs(pairs) => {
                let mut m = Self::empty("custom");
                for pair in pairs {
                    match pair.as_bytes() {
                        [o, s] => m.add(o.to_ascii_uppercase(), s.to_ascii_uppercase()),
                        _ => return Err(format!("invalid substitution pair '{}'", pair)),
                    }
                }
                Ok(m)
            }
        }
    }
}

impl From<SubstitutionMatrix> for MatrixRepr {
    fn from(m: SubstitutionMatrix) -> Self {
        if m.key != "custom" {
            return MatrixRepr::Named(m.key);
        }
        let mut pairs = Vec::new();
        for o in b'A'..=b'Z' {
            for s in m.targets(o) {
                pairs.push(String::from_utf8_lossy(&[o, s]).into_owned());
            }
        }
        MatrixRepr::Pairs(pairs)
    }
}

#[inline]
fn letter(aa: u8) -> Option<usize> {
    aa.is_ascii_uppercase().then(|| (aa - b'A') as usize)
}

impl SubstitutionMatrix {
    fn empty(key: &str) -> Self {
        Self { key: key.to_string(), rows: [0; 26] }
    }

    /// 空的自定义矩阵，配合 [`SubstitutionMatrix::add`] 使用。
    pub fn custom() -> Self {
        Self::empty("custom")
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn add(&mut self, original: u8, substituted: u8) {
        if let (Some(o), Some(s)) = (letter(original), letter(substituted)) {
            if o != s {
                self.rows[o] |= 1 << s;
            }
        }
    }

    #[inline]
    pub fn allows(&self, original: u8, substituted: u8) -> bool {
        match (letter(original), letter(substituted)) {
            (Some(o), Some(s)) => self.rows[o] & (1 << s) != 0,
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|&r| r == 0)
    }

    /// Residues `original` may be substituted by.
    pub fn targets(&self, original: u8) -> impl Iterator<Item = u8> + '_ {
        let row = letter(original).map_or(0, |o| self.rows[o]);
        (0..26u8).filter(move |&s| row & (1 << s) != 0).map(|s| b'A' + s)
    }

    pub fn none() -> Self {
        Self::empty("none")
    }

    pub fn all() -> Self {
        let mut m = Self::empty("all");
        for &o in &crate::util::aa::STANDARD {
            for &s in &crate::util::aa::STANDARD {
                m.add(o, s);
            }
        }
        m
    }

    pub fn single_base() -> Self {
        let mut m = Self::empty("single_base");
        codon::single_base_changes(|_, _| true, |o, s| m.add(o, s));
        m
    }

    pub fn transitions() -> Self {
        let mut m = Self::empty("transitions");
        codon::single_base_changes(codon::is_transition, |o, s| m.add(o, s));
        m
    }

    pub fn transversions() -> Self {
        let mut m = Self::empty("transversions");
        codon::single_base_changes(|a, b| a != b && !codon::is_transition(a, b), |o, s| m.add(o, s));
        m
    }

    /// 按侧链性质分组，组内互换。
    pub fn synonymous() -> Self {
        let mut m = Self::empty("synonymous");
        let groups: [&[u8]; 5] = [b"GAVLMI", b"FYW", b"STCPNQ", b"KRH", b"DE"];
        for group in groups {
            for &o in group {
                for &s in group {
                    m.add(o, s);
                }
            }
        }
        m
    }

    /// Looks up one of the predefined matrices by its short name.
    pub fn by_name(name: &str) -> Option<Self> {
        let m = match name.to_ascii_lowercase().as_str() {
            "none" => Self::none(),
            "single_base" => Self::single_base(),
            "transitions" => Self::transitions(),
            "transversions" => Self::transversions(),
            "synonymous" => Self::synonymous(),
            "all" => Self::all(),
            _ => return None,
        };
        Some(m)
    }
}

impl Default for SubstitutionMatrix {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_base_reaches_lysine_from_arginine() {
        let m = SubstitutionMatrix::single_base();
        assert!(m.allows(b'R', b'K'));
        assert!(m.allows(b'T', b'P'));
        // GCN -> CGN needs two base changes
        assert!(!m.allows(b'A', b'R'));
        assert!(!m.allows(b'K', b'K'));
    }

    #[test]
    fn transitions_and_transversions_partition_single_base() {
        let single = SubstitutionMatrix::single_base();
        let ts = SubstitutionMatrix::transitions();
        let tv = SubstitutionMatrix::transversions();
        for &o in &crate::util::aa::STANDARD {
            for &s in &crate::util::aa::STANDARD {
                assert_eq!(single.allows(o, s), ts.allows(o, s) || tv.allows(o, s), "{}->{}", o as char, s as char);
            }
        }
        // AAA(K) -> AGA(R) is a transition
        assert!(ts.allows(b'K', b'R'));
    }

    #[test]
    fn none_and_all() {
        assert!(SubstitutionMatrix::none().is_empty());
        let all = SubstitutionMatrix::all();
        assert!(all.allows(b'A', b'R'));
        assert_eq!(all.targets(b'A').count(), 19);
        assert!(!all.allows(b'X', b'A'));
    }

    #[test]
    fn synonymous_groups() {
        let m = SubstitutionMatrix::synonymous();
        assert!(m.allows(b'D', b'E'));
        assert!(!m.allows(b'D', b'K'));
        assert_eq!(SubstitutionMatrix::by_name("Synonymous"), Some(m));
        assert!(SubstitutionMatrix::by_name("bogus").is_none());
    }

    #[test]
    fn serde_by_name_and_pairs() {
        let json = serde_json::to_string(&SubstitutionMatrix::transitions()).unwrap();
        assert_eq!(json, "\"transitions\"");
        let m: SubstitutionMatrix = serde_json::from_str("[\"AR\", \"kr\"]").unwrap();
        assert!(m.allows(b'A', b'R'));
        assert!(m.allows(b'K', b'R'));
        assert!(!m.allows(b'R', b'A'));
        assert_eq!(m.key(), "custom");
        let back: SubstitutionMatrix = serde_json::from_str(&serde_json::to_string(&m).unwrap()).unwrap();
        assert_eq!(back, m);
        assert!(serde_json::from_str::<SubstitutionMatrix>("\"bogus\"").is_err());
    }
}
