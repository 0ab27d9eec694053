//! 滑动窗口分块.
//!
//! 把渲染后的切片图像切成重叠的方形 patch, 作为分类器的输入单元.
//! 坐标约定: `(row, col)` 为 patch 左上角像素.

use crate::Idx2d;
use itertools::iproduct;
use ndarray::{s, Array3, Array4, Zip};

/// 枚举 `h x w` 图像上边长 `patch`, 步长 `stride` 的全部窗口左上角.
///
/// 遍历顺序为行优先: 先固定行扫完一整行的列, 再移到下一行.
/// 窗口完全落在图像内; 图像尺寸与步长不整除时, 右/下边缘的剩余
/// 像素不会被单独补一个窗口.
///
/// `patch` 为零或大于任一图像边长时返回空向量.
///
/// # 注意
///
/// `stride` 必须为正, 否则程序 panic.
pub fn tile_coords(h: usize, w: usize, patch: usize, stride: usize) -> Vec<Idx2d> {
    assert!(stride > 0, "stride 必须为正");
    if patch == 0 || patch > h || patch > w {
        return Vec::new();
    }
    iproduct!(
        (0..=h - patch).step_by(stride),
        (0..=w - patch).step_by(stride)
    )
    .collect()
}

/// 按坐标批量抠出 patch, 同时把 u8 像素缩放到 \[0, 1\] 浮点.
///
/// 返回形状 `(n, patch, patch, 3)`, 第 0 维与 `coords` 顺序一一对应.
///
/// # 注意
///
/// 任一坐标的窗口越界时程序 panic. 坐标应来自 [`tile_coords`].
pub fn extract_patches(image: &Array3<u8>, coords: &[Idx2d], patch: usize) -> Array4<f32> {
    let mut out = Array4::<f32>::zeros((coords.len(), patch, patch, 3));
    for (n, &(r, c)) in coords.iter().enumerate() {
        let src = image.slice(s![r..r + patch, c..c + patch, ..]);
        let dst = out.slice_mut(s![n, .., .., ..]);
        Zip::from(dst).and(src).for_each(|d, &s| *d = s as f32 / 255.0);
    }
    out
}
