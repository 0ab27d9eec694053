//! 概率热力图的累积与可视化.
//!
//! 滑动窗口的 patch 相互重叠, 同一像素会收到多个 patch 的概率.
//! 本模块把逐 patch 概率摊回像素平面取均值, 再渲染为 jet 伪彩
//! 叠加图.

use crate::consts::NORM_EPSILON;
use crate::Idx2d;
use ndarray::{s, Array2, Array3, ArrayView3, Zip};
use once_cell::sync::Lazy;

/// jet 色表, 按 256 级量化预先求值.
static JET_LUT: Lazy<[[f32; 3]; 256]> = Lazy::new(|| {
    let mut lut = [[0.0f32; 3]; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        *entry = jet(i as f32 / 255.0);
    }
    lut
});

/// matplotlib 风格的 jet 分段线性色表. `x` 应在 \[0, 1\] 内.
fn jet(x: f32) -> [f32; 3] {
    let seg = |a: f32, b: f32| (4.0 * x + a).min(-4.0 * x + b).clamp(0.0, 1.0);
    [seg(-1.5, 4.5), seg(-0.5, 3.5), seg(0.5, 2.5)]
}

/// 把逐 patch 概率摊回 `(h, w)` 像素平面, 每个像素取覆盖它的全部
/// patch 概率的均值.
///
/// 未被任何 patch 覆盖的像素 (滑窗未达的边缘) 值为 0.
///
/// # 注意
///
/// `coords` 与 `probs` 长度必须一致, 且每个窗口都须落在平面内,
/// 否则程序 panic.
pub fn accumulate(coords: &[Idx2d], probs: &[f32], shape: Idx2d, patch: usize) -> Array2<f32> {
    assert_eq!(coords.len(), probs.len(), "坐标与预测个数不一致");

    let mut sum = Array2::<f32>::zeros(shape);
    let mut count = Array2::<f32>::zeros(shape);
    for (&(r, c), &p) in coords.iter().zip(probs) {
        sum.slice_mut(s![r..r + patch, c..c + patch])
            .mapv_inplace(|v| v + p);
        count
            .slice_mut(s![r..r + patch, c..c + patch])
            .mapv_inplace(|v| v + 1.0);
    }
    Zip::from(&mut sum)
        .and(&count)
        .for_each(|s, &c| *s /= c + NORM_EPSILON);
    sum
}

/// 把热力图线性拉伸到 \[0, 1\]. 常数热力图归一化为全零.
pub fn normalize(heat: &Array2<f32>) -> Array2<f32> {
    let min = heat.iter().fold(f32::INFINITY, |m, &v| m.min(v));
    let max = heat.iter().fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    heat.mapv(|v| (v - min) / (max - min + NORM_EPSILON))
}

/// 按 jet 色表渲染 \[0, 1\] 热力图为 `(h, w, 3)` 浮点 RGB.
pub fn colorize(heat: &Array2<f32>) -> Array3<f32> {
    let (h, w) = heat.dim();
    Array3::from_shape_fn((h, w, 3), |(i, j, c)| {
        let x = heat[(i, j)].clamp(0.0, 1.0);
        JET_LUT[(x * 255.0).round() as usize][c]
    })
}

/// 把伪彩热力图按 `alpha` 叠加到灰度底图上, 输出 u8 RGB.
///
/// # 注意
///
/// 两图的 `(h, w, 3)` 形状必须一致, 否则程序 panic.
pub fn overlay(base: ArrayView3<'_, u8>, heat_rgb: &Array3<f32>, alpha: f32) -> Array3<u8> {
    assert_eq!(base.dim(), heat_rgb.dim(), "底图与热力图形状不一致");

    let mut out = Array3::<u8>::zeros(base.dim());
    Zip::from(&mut out)
        .and(&base)
        .and(heat_rgb)
        .for_each(|o, &b, &h| {
            let v = (1.0 - alpha) * (b as f32 / 255.0) + alpha * h;
            *o = (num::clamp(v, 0.0, 1.0) * 255.0).round() as u8;
        });
    out
}

/// \[0, 1\] 浮点 RGB 转 u8 RGB.
pub fn to_u8(rgb: &Array3<f32>) -> Array3<u8> {
    rgb.mapv(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
}
