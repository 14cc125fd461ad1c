use alloc::vec::Vec;
use core::cmp;

/// Prefix sums over slot heights.
#[derive(Clone, Debug, Default)]
pub(crate) struct Fenwick {
    tree: Vec<f64>, // 1-indexed
    values: Vec<f64>,
    total: f64,
    max_bit: usize,
}

impl Fenwick {
    pub(crate) fn from_sizes(sizes: &[f64]) -> Self {
        let n = sizes.len();
        let mut tree = alloc::vec![0.0f64; n + 1];
        let mut total = 0.0;
        for i in 1..=n {
            let v = sizes[i - 1];
            total += v;
            tree[i] += v;
            let j = i + lsb(i);
            if j <= n {
                tree[j] += tree[i];
            }
        }
        Self {
            tree,
            values: sizes.to_vec(),
            total,
            max_bit: if n == 0 {
                0
            } else {
                highest_power_of_two_leq(n)
            },
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn get(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    /// Replaces the value at `index` and returns the delta.
    pub(crate) fn set(&mut self, index: usize, value: f64) -> f64 {
        let Some(current) = self.values.get_mut(index) else {
            return 0.0;
        };
        let delta = value - *current;
        *current = value;
        self.add(index, delta);
        delta
    }

    fn add(&mut self, index: usize, delta: f64) {
        let n = self.len();
        if index >= n || delta == 0.0 {
            return;
        }
        self.total += delta;
        let mut i = index + 1;
        while i <= n {
            self.tree[i] += delta;
            i += lsb(i);
        }
    }

    /// Sum of the first `count` values.
    pub(crate) fn prefix_sum(&self, count: usize) -> f64 {
        let mut i = cmp::min(count, self.len());
        let mut sum = 0.0;
        while i > 0 {
            sum += self.tree[i];
            i &= i - 1;
        }
        sum
    }

    pub(crate) fn total(&self) -> f64 {
        self.total
    }

    /// Returns the number of values whose prefix sum is <= `target`, i.e. the index of the slot
    /// containing offset `target` (clamped to `len`).
    pub(crate) fn lower_bound(&self, mut target: f64) -> usize {
        let n = self.len();
        if n == 0 || target < 0.0 {
            return 0;
        }
        let mut idx = 0usize;
        let mut bit = self.max_bit;
        while bit != 0 {
            let next = idx + bit;
            if next <= n && self.tree[next] <= target {
                target -= self.tree[next];
                idx = next;
            }
            bit >>= 1;
        }
        idx
    }
}

fn lsb(i: usize) -> usize {
    i & i.wrapping_neg()
}

fn highest_power_of_two_leq(n: usize) -> usize {
    let mut p = 1usize;
    while p <= n / 2 {
        p <<= 1;
    }
    p
}
