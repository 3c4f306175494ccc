//! 标准遗传密码表，用于推导单碱基替换矩阵。

const BASES: [u8; 4] = *b"TCAG";

// TCAG 顺序的 64 个密码子翻译结果，`*` 为终止密码子
const CODE: &[u8; 64] = b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";

#[inline]
fn base_index(b: u8) -> Option<usize> {
    BASES.iter().position(|&x| x == b)
}

/// 翻译一个密码子；终止密码子与非法碱基返回 `None`。
pub fn translate(codon: [u8; 3]) -> Option<u8> {
    let i = base_index(codon[0])? * 16 + base_index(codon[1])? * 4 + base_index(codon[2])?;
    match CODE[i] {
        b'*' => None,
        aa => Some(aa),
    }
}

pub fn codons_for(aa: u8) -> impl Iterator<Item = [u8; 3]> {
    (0..64usize).filter(move |&i| CODE[i] == aa).map(|i| [BASES[i / 16], BASES[(i / 4) % 4], BASES[i % 4]])
}

#[inline]
pub fn is_purine(b: u8) -> bool {
    matches!(b, b'A' | b'G')
}

/// A↔G and C↔T are transitions; every other base change is a transversion.
#[inline]
pub fn is_transition(from: u8, to: u8) -> bool {
    from != to && is_purine(from) == is_purine(to)
}

/// Visits every (original, substituted) residue pair reachable through one
/// base change that `accept(from_base, to_base)` admits.
pub fn single_base_changes(mut accept: impl FnMut(u8, u8) -> bool, mut visit: impl FnMut(u8, u8)) {
    for (i, &aa) in CODE.iter().enumerate() {
        if aa == b'*' {
            continue;
        }
        let codon = [BASES[i / 16], BASES[(i / 4) % 4], BASES[i % 4]];
        for pos in 0..3 {
            for &b in &BASES {
                if !accept(codon[pos], b) {
                    continue;
                }
                let mut mutated = codon;
                mutated[pos] = b;
                if let Some(other) = translate(mutated) {
                    if other != aa {
                        visit(aa, other);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_known_codons() {
        assert_eq!(translate(*b"ATG"), Some(b'M'));
        assert_eq!(translate(*b"TGG"), Some(b'W'));
        assert_eq!(translate(*b"TAA"), None);
        assert_eq!(translate(*b"ANG"), None);
    }

    #[test]
    fn codon_counts() {
        assert_eq!(codons_for(b'L').count(), 6);
        assert_eq!(codons_for(b'M').count(), 1);
        assert!(codons_for(b'R').all(|c| translate(c) == Some(b'R')));
    }

    #[test]
    fn transitions_are_within_class() {
        assert!(is_transition(b'A', b'G'));
        assert!(is_transition(b'C', b'T'));
        assert!(!is_transition(b'A', b'T'));
        assert!(!is_transition(b'A', b'A'));
    }
}
