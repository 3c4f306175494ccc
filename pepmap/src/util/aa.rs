//! 氨基酸字母表编码与残基质量。
//!
//! 索引文本使用紧凑字母表：`0` 为末尾哨兵 `$`，`1` 为蛋白分隔符 `/`，
//! 字母 `A..=Z` 依次编码为 `2..=27`。

pub const SIGMA: usize = 28; // {0:$, 1:/, 2..=27: A..Z}

pub const SENTINEL: u8 = 0;
pub const SEPARATOR: u8 = 1;

/// Monoisotopic mass of water, added once per peptide.
pub const H2O: f64 = 18.010565;

/// The twenty proteinogenic residues a corpus `X` may stand for.
pub const STANDARD: [u8; 20] = *b"ACDEFGHIKLMNPQRSTVWY";

const LETTERS: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[inline]
pub fn to_alphabet(b: u8) -> u8 {
    match b {
        b'$' => SENTINEL,
        b'/' => SEPARATOR,
        _ => {
            let up = b.to_ascii_uppercase();
            if up.is_ascii_uppercase() {
                2 + (up - b'A')
            } else {
                2 + (b'X' - b'A')
            }
        }
    }
}

#[inline]
pub fn from_alphabet(a: u8) -> u8 {
    match a {
        SENTINEL => b'$',
        SEPARATOR => b'/',
        2..=27 => b'A' + (a - 2),
        _ => b'X',
    }
}

/// 大写化，非字母字符视为 `X`。
pub fn normalize_seq(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .map(|&b| {
            let up = b.to_ascii_uppercase();
            if up.is_ascii_uppercase() { up } else { b'X' }
        })
        .collect()
}

/// 单一同位素残基质量；组合字母（B/J/Z/X）没有确定质量。
pub fn residue_mass(aa: u8) -> Option<f64> {
    let m = match aa {
        b'A' => 71.037114,
        b'R' => 156.101111,
        b'N' => 114.042927,
        b'D' => 115.026943,
        b'C' => 103.009185,
        b'E' => 129.042593,
        b'Q' => 128.058578,
        b'G' => 57.021464,
        b'H' => 137.058912,
        b'I' | b'L' => 113.084064,
        b'K' => 128.094963,
        b'M' => 131.040485,
        b'F' => 147.068414,
        b'P' => 97.052764,
        b'S' => 87.032028,
        b'T' => 101.047679,
        b'W' => 186.079313,
        b'Y' => 163.063329,
        b'V' => 99.068414,
        b'U' => 150.953633,
        b'O' => 237.147727,
        _ => return None,
    };
    Some(m)
}

#[inline]
pub fn is_concrete(aa: u8) -> bool {
    residue_mass(aa).is_some()
}

/// 字母所代表的具体残基集合：组合字母展开，具体残基返回自身。
pub fn concrete(aa: u8) -> &'static [u8] {
    match aa {
        b'B' => b"DN",
        b'J' => b"IL",
        b'Z' => b"EQ",
        b'X' => &STANDARD,
        b'A'..=b'Z' => {
            let i = (aa - b'A') as usize;
            &LETTERS[i..i + 1]
        }
        _ => &[],
    }
}

/// Sum of residue masses, `None` if any residue is ambiguous.
pub fn sequence_mass(seq: &[u8]) -> Option<f64> {
    seq.iter().map(|&aa| residue_mass(aa)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabet_roundtrip() {
        for &b in LETTERS.iter().chain(b"$/") {
            assert_eq!(from_alphabet(to_alphabet(b)), b);
        }
        assert_eq!(to_alphabet(b'a'), to_alphabet(b'A'));
        assert_eq!(to_alphabet(b'*'), to_alphabet(b'X'));
        assert!(LETTERS.iter().all(|&b| (to_alphabet(b) as usize) < SIGMA));
    }

    #[test]
    fn normalize_uppercases_and_masks() {
        assert_eq!(normalize_seq(b"acD*e"), b"ACDXE");
    }

    #[test]
    fn combination_letters_expand() {
        assert_eq!(concrete(b'B'), b"DN");
        assert_eq!(concrete(b'K'), b"K");
        assert_eq!(concrete(b'X').len(), 20);
        assert!(residue_mass(b'X').is_none());
        assert!(residue_mass(b'J').is_none());
    }

    #[test]
    fn peptide_mass() {
        let m = sequence_mass(b"GA").unwrap();
        assert!((m - 128.058578).abs() < 1e-6);
        assert!(sequence_mass(b"GXA").is_none());
    }
}
