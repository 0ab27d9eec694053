//! 数值统计工具.

use ordered_float::OrderedFloat;

/// numpy 风格的线性插值百分位数. `pct` 取值范围为 \[0, 100\].
///
/// # 注意
///
/// `values` 必须非空, 否则程序 panic.
pub(crate) fn percentile(values: &[f32], pct: f64) -> f32 {
    assert!(!values.is_empty(), "百分位数要求非空输入");
    debug_assert!((0.0..=100.0).contains(&pct));

    let mut sorted: Vec<OrderedFloat<f32>> = values.iter().copied().map(OrderedFloat).collect();
    sorted.sort_unstable();

    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let a = sorted[lo].0;
    let b = sorted[hi].0;
    a + (b - a) * (rank - lo as f64) as f32
}

/// 一次求出 \[1st, 99th\] 百分位裁剪界.
#[inline]
pub(crate) fn clip_bounds(values: &[f32]) -> (f32, f32) {
    use crate::consts::{PERCENTILE_HIGH, PERCENTILE_LOW};
    (
        percentile(values, PERCENTILE_LOW),
        percentile(values, PERCENTILE_HIGH),
    )
}

/// 均值与总体标准差 (ddof = 0). 以 `f64` 累加避免大体数据下的精度损失.
///
/// 输入为空时返回 `(0.0, 0.0)`.
pub(crate) fn mean_std<'a, I>(values: I) -> (f32, f32)
where
    I: Iterator<Item = &'a f32> + Clone,
{
    let mut count = 0u64;
    let mut sum = 0.0f64;
    for &v in values.clone() {
        count += 1;
        sum += v as f64;
    }
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;

    let mut sq = 0.0f64;
    for &v in values {
        let d = v as f64 - mean;
        sq += d * d;
    }
    (mean as f32, (sq / count as f64).sqrt() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_percentile_generic() {
        let v: Vec<f32> = (0..=100).map(|i| i as f32).collect();
        assert!(float_eq(percentile(&v, 0.0), 0.0));
        assert!(float_eq(percentile(&v, 50.0), 50.0));
        assert!(float_eq(percentile(&v, 100.0), 100.0));
        assert!(float_eq(percentile(&v, 1.0), 1.0));
        assert!(float_eq(percentile(&v, 99.0), 99.0));
    }

    #[test]
    fn test_percentile_interpolated() {
        // rank = 0.5 * (2 - 1) = 0.5, 线性插值.
        assert!(float_eq(percentile(&[0.0, 1.0], 50.0), 0.5));
        assert!(float_eq(percentile(&[3.0], 75.0), 3.0));
    }

    #[test]
    fn test_mean_std_generic() {
        let v = [2.0f32, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let (mean, std) = mean_std(v.iter());
        assert!(float_eq(mean, 5.0));
        assert!(float_eq(std, 2.0));
    }

    #[test]
    fn test_mean_std_empty() {
        let (mean, std) = mean_std([].iter());
        assert_eq!((mean, std), (0.0, 0.0));
    }
}
