//! 组织切片边界检测.
//!
//! MRI 体数据的顶部和底部常有大段空白切片. 本模块沿给定轴逐切片取最大
//! 强度, 找出真正含组织的索引区间, 后续采样只在该区间内进行.

use crate::consts::TISSUE_THRESHOLD_RATIO;
use crate::Idx2d;
use ndarray::{ArrayView3, Axis};

/// 返回沿 `axis` 含组织的切片闭区间 `(start, end)`.
///
/// 判定标准: 切片内最大强度严格大于全局最大强度的 5%.
///
/// # 注意
///
/// 1. `axis` 必须小于 3, `axis` 方向长度必须非零, 否则程序 panic.
/// 2. 若没有任何切片达标 (退化/全空体数据), 回退为整个区间
///   `(0, len - 1)`. 这是有意的回退分支, 不是错误.
pub fn tissue_bounds(data: ArrayView3<'_, f32>, axis: usize) -> Idx2d {
    let n = data.len_of(Axis(axis));
    assert_ne!(n, 0, "体数据沿轴 {axis} 长度为零");

    let maxes: Vec<f32> = (0..n)
        .map(|i| {
            data.index_axis(Axis(axis), i)
                .iter()
                .fold(f32::NEG_INFINITY, |m, &v| m.max(v))
        })
        .collect();

    let global = maxes.iter().fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    let threshold = global * TISSUE_THRESHOLD_RATIO;

    let first = maxes.iter().position(|&m| m > threshold);
    let last = maxes.iter().rposition(|&m| m > threshold);
    match (first, last) {
        (Some(a), Some(b)) => (a, b),
        _ => (0, n - 1),
    }
}
