/// 根据后缀数组构建 BWT。
/// text 为数值化字母表（0..SIGMA），sa 为后缀数组位置。
pub fn build_bwt(text: &[u8], sa: &[u32]) -> Vec<u8> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    sa.iter()
        .map(|&p| {
            let i = p as usize;
            if i == 0 { text[n - 1] } else { text[i - 1] }
        })
        .collect()
}

/// 稀疏采样后缀数组：保留文本位置为 `step` 整数倍的行。
/// 返回 (按行排序的采样标记位图, 采样值)，采样值顺序与行顺序一致。
pub fn sample_sa(sa: &[u32], step: u32) -> (Vec<u64>, Vec<u32>) {
    let step = step.max(1);
    let mut marks = vec![0u64; sa.len().div_ceil(64)];
    let mut values = Vec::with_capacity(sa.len() / step as usize + 1);
    for (row, &p) in sa.iter().enumerate() {
        if p % step == 0 {
            marks[row / 64] |= 1 << (row % 64);
            values.push(p);
        }
    }
    (marks, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::sa::build_sa;

    #[test]
    fn bwt_of_small_text() {
        // / A B / $
        let text = [1u8, 2, 3, 1, 0];
        let sa = build_sa(&text);
        let bwt = build_bwt(&text, &sa);
        // 行：$ -> '/', /$ -> 'B', /AB/$ -> '$', AB/$ -> '/', B/$ -> 'A'
        assert_eq!(bwt, vec![1, 3, 0, 1, 2]);
    }

    #[test]
    fn sampling_keeps_multiples() {
        let sa = vec![4u32, 3, 0, 1, 2];
        let (marks, values) = sample_sa(&sa, 2);
        assert_eq!(values, vec![4, 0, 2]);
        assert_eq!(marks[0], 0b10101);
    }
}
