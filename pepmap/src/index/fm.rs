use serde::{Deserialize, Serialize};

use super::bwt::{build_bwt, sample_sa};
use super::sa::build_sa;

/// FM 索引：
/// - 字母以 [0..sigma) 编码（0 预留为 $，且全文唯一）。
/// - 采用定长分块的 Occ 采样（块内顺扫补偿）。
/// - 后缀数组稀疏采样，定位时沿 LF 回溯到最近的采样行。
#[derive(Debug, Serialize, Deserialize)]
pub struct FMIndex {
    pub sigma: u8,
    pub block: u32,
    /// C[i] = 文本中字母 < i 的累计数量
    pub c: Vec<u32>,
    /// BWT 序列（与文本同长度）
    pub bwt: Vec<u8>,
    /// Occ 采样（按块存储，行优先展平）：occ_samples[block_id * sigma + c]
    pub occ_samples: Vec<u32>,
    /// SA 采样间隔（文本坐标）
    pub sa_step: u32,
    sa_marks: Vec<u64>,
    /// sa_marks 每个字之前的置位累计
    sa_mark_rank: Vec<u32>,
    sa_values: Vec<u32>,
}

impl FMIndex {
    /// 从数值化文本构建（文本末尾必须是唯一的 0）。
    pub fn build(text: &[u8], sigma: u8, block: usize, sa_step: u32) -> Self {
        let sa = build_sa(text);
        let bwt = build_bwt(text, &sa);
        let (sa_marks, sa_values) = sample_sa(&sa, sa_step);
        drop(sa);

        let n = bwt.len();
        let sigma_us = sigma as usize;
        let block = block.max(1);
        // 计算 C 表
        let mut freq = vec![0u32; sigma_us];
        for &ch in &bwt {
            let ci = ch as usize;
            if ci < sigma_us { freq[ci] += 1; }
        }
        let mut c = vec![0u32; sigma_us];
        let mut acc = 0u32;
        for i in 0..sigma_us {
            c[i] = acc;
            acc += freq[i];
        }

        // 采样 Occ
        let num_blocks = n.div_ceil(block);
        let mut occ_samples = vec![0u32; num_blocks * sigma_us];
        let mut running = vec![0u32; sigma_us];
        for bi in 0..num_blocks {
            occ_samples[bi * sigma_us..(bi + 1) * sigma_us].copy_from_slice(&running);
            let end = ((bi + 1) * block).min(n);
            for &ch in &bwt[bi * block..end] {
                let ci = ch as usize;
                if ci < sigma_us { running[ci] += 1; }
            }
        }

        let mut sa_mark_rank = Vec::with_capacity(sa_marks.len());
        let mut seen = 0u32;
        for &w in &sa_marks {
            sa_mark_rank.push(seen);
            seen += w.count_ones();
        }

        Self {
            sigma,
            block: block as u32,
            c,
            bwt,
            occ_samples,
            sa_step: sa_step.max(1),
            sa_marks,
            sa_mark_rank,
            sa_values,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bwt.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bwt.is_empty()
    }

    #[inline]
    pub fn full_range(&self) -> (usize, usize) {
        (0, self.bwt.len())
    }

    #[inline]
    pub fn occ(&self, c: u8, pos: usize) -> u32 {
        // 返回 BWT[0..pos) 中 c 的出现次数
        if pos == 0 { return 0; }
        let sigma_us = self.sigma as usize;
        let block = self.block as usize;
        let bi = (pos - 1) / block; // 所在块编号
        let base = self.occ_samples[bi * sigma_us + c as usize];
        let add = self.bwt[bi * block..pos].iter().filter(|&&ch| ch == c).count() as u32;
        base + add
    }

    /// 在区间 [l, r) 前追加字符 c，返回新区间；若为空区间则 l >= r。
    /// 字母表之外的字符得到空区间。
    #[inline]
    pub fn extend_left(&self, l: usize, r: usize, c: u8) -> (usize, usize) {
        if c >= self.sigma || l >= r {
            return (0, 0);
        }
        let c0 = self.c[c as usize] as usize;
        (c0 + self.occ(c, l) as usize, c0 + self.occ(c, r) as usize)
    }

    /// 精确计数：返回模式串的 SA 区间（可能为空）。pat 已编码。
    pub fn count(&self, pat: &[u8]) -> (usize, usize) {
        self.backward_search(pat).unwrap_or((0, 0))
    }

    /// 反向搜索精确匹配，pat 已经是编码后的字母表（不应包含 0）
    pub fn backward_search(&self, pat: &[u8]) -> Option<(usize, usize)> {
        if self.bwt.is_empty() { return None; }
        let (mut l, mut r) = self.full_range();
        for &a in pat.iter().rev() {
            let (nl, nr) = self.extend_left(l, r, a);
            if nl >= nr { return None; }
            l = nl; r = nr;
        }
        Some((l, r))
    }

    #[inline]
    fn lf(&self, row: usize) -> usize {
        let ch = self.bwt[row];
        self.c[ch as usize] as usize + self.occ(ch, row) as usize
    }

    #[inline]
    fn sampled(&self, row: usize) -> Option<u32> {
        let (w, b) = (row / 64, row % 64);
        let word = self.sa_marks[w];
        if word & (1 << b) == 0 {
            return None;
        }
        let idx = self.sa_mark_rank[w] + (word & ((1u64 << b) - 1)).count_ones();
        Some(self.sa_values[idx as usize])
    }

    /// 单行 SA 值：沿 LF 回溯至采样行。
    pub fn sa_at(&self, mut row: usize) -> u32 {
        let mut steps = 0u32;
        loop {
            if let Some(v) = self.sampled(row) {
                return v + steps;
            }
            if self.bwt[row] == 0 {
                return steps;
            }
            row = self.lf(row);
            steps += 1;
        }
    }

    /// 取出 SA 区间 [l, r) 对应的全部文本位置。
    pub fn locate(&self, l: usize, r: usize) -> Vec<u32> {
        (l..r.min(self.len())).map(|row| self.sa_at(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::aa;

    fn encode(s: &[u8]) -> Vec<u8> {
        s.iter().map(|&b| aa::to_alphabet(b)).collect()
    }

    fn index_of(s: &[u8], block: usize, step: u32) -> FMIndex {
        FMIndex::build(&encode(s), aa::SIGMA as u8, block, step)
    }

    fn naive_positions(text: &[u8], pat: &[u8]) -> Vec<u32> {
        (0..=text.len().saturating_sub(pat.len()))
            .filter(|&i| &text[i..i + pat.len()] == pat)
            .map(|i| i as u32)
            .collect()
    }

    #[test]
    fn count_and_locate_agree_with_scan() {
        let text = b"/PEPTIDEK/MKPEPTIDERPEP/KPEPP/$";
        for block in [1usize, 3, 64] {
            for step in [1u32, 2, 8] {
                let fm = index_of(text, block, step);
                for pat in [&b"PEP"[..], b"PEPTIDE", b"K", b"/K", b"ZZ", b"P/"] {
                    let (l, r) = fm.count(&encode(pat));
                    let mut got = fm.locate(l, r);
                    got.sort_unstable();
                    assert_eq!(got, naive_positions(text, pat), "pat={:?} block={} step={}", pat, block, step);
                }
            }
        }
    }

    #[test]
    fn extend_left_outside_alphabet_is_empty() {
        let fm = index_of(b"/AC/$", 4, 2);
        let (l, r) = fm.full_range();
        let (nl, nr) = fm.extend_left(l, r, 200);
        assert!(nl >= nr);
        assert!(fm.backward_search(&encode(b"W")).is_none());
    }

    #[test]
    fn sa_at_recovers_every_row() {
        let text = encode(b"/MKVLAAGIVALLLAAGCSSSKEETPKLAEVSTK/$");
        let fm = FMIndex::build(&text, aa::SIGMA as u8, 16, 5);
        let sa = build_sa(&text);
        for (row, &p) in sa.iter().enumerate() {
            assert_eq!(fm.sa_at(row), p);
        }
    }
}
