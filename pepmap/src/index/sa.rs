use rayon::prelude::*;

/// 构建后缀数组（倍增法，每轮并行排序）。
/// 输入为数值化文本（0:$，1:/，2..=27:A..Z），末尾须为唯一的 0。
pub fn build_sa(text: &[u8]) -> Vec<u32> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sa: Vec<u32> = (0..n as u32).collect();
    let mut rank: Vec<i32> = text.iter().map(|&b| b as i32).collect();
    let mut tmp: Vec<i32> = vec![0; n];

    let mut k = 1usize;
    loop {
        let key = |i: u32| {
            let i = i as usize;
            (rank[i], if i + k < n { rank[i + k] } else { -1 })
        };
        sa.par_sort_unstable_by_key(|&i| key(i));

        tmp[sa[0] as usize] = 0;
        for w in 1..n {
            let (a, b) = (sa[w - 1], sa[w]);
            tmp[b as usize] = tmp[a as usize] + i32::from(key(a) != key(b));
        }

        rank.copy_from_slice(&tmp);
        if rank[sa[n - 1] as usize] as usize == n - 1 || k >= n {
            break;
        }
        k <<= 1;
    }

    sa
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_sa(text: &[u8]) -> Vec<u32> {
        let n = text.len();
        let mut suffixes: Vec<(usize, &[u8])> = (0..n).map(|i| (i, &text[i..])).collect();
        suffixes.sort_by(|a, b| a.1.cmp(b.1));
        suffixes.into_iter().map(|(i, _)| i as u32).collect()
    }

    fn make_text(len: usize) -> Vec<u8> {
        let mut x: u32 = 1_234_567;
        let mut v = Vec::with_capacity(len + 1);
        for _ in 0..len {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            v.push(1 + ((x >> 16) % 6) as u8);
        }
        v.push(0);
        v
    }

    #[test]
    fn sa_basic() {
        // 文本：/ A C / $  -> 1 2 4 1 0
        let text = [1u8, 2, 4, 1, 0];
        assert_eq!(build_sa(&text), vec![4, 3, 0, 1, 2]);
    }

    #[test]
    fn sa_matches_naive_on_small_random_texts() {
        for len in 1..=40 {
            let text = make_text(len);
            assert_eq!(build_sa(&text), naive_sa(&text), "mismatch on len={}", len);
        }
    }

    #[test]
    fn sa_handles_repeats() {
        let mut text = vec![2u8; 33];
        text.push(0);
        assert_eq!(build_sa(&text), naive_sa(&text));
    }
}
