//! 体数据切片到 RGB 图像的渲染.
//!
//! 分类器输入是 2D RGB 图像, 本模块负责从 3D 体数据中选取切片索引,
//! 并把每张切片渲染为固定尺寸的 8 位三通道图像.

use crate::consts::{DEFAULT_AXIAL_AXIS, DEFAULT_SLICE_SIZE};
use crate::stats;
use crate::MriVolume;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::{stack, Array3, ArrayView2, Axis};

/// 切片渲染参数.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// 输出图像边长 (像素), 渲染结果为 `size x size` 的正方形.
    pub size: usize,

    /// 为 `true` 时, 三个通道取相邻三张切片 (前一张, 当前, 后一张);
    /// 为 `false` 时, 三个通道都复制当前切片.
    pub neighbor_stack: bool,

    /// 切片堆叠方向 (RAS+ 下 2 为轴向).
    pub axis: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            size: DEFAULT_SLICE_SIZE,
            neighbor_stack: false,
            axis: DEFAULT_AXIAL_AXIS,
        }
    }
}

/// 在闭区间 `[start, end]` 内均匀选取 `n` 个切片索引.
///
/// 索引按比例位置线性插值后四舍五入, 首尾索引总在结果中 (`n >= 2` 时).
/// 结果单调不减; 区间长度小于 `n` 时会出现重复索引, 这是有意为之,
/// 保证输出切片数恒等于 `n`.
///
/// # 注意
///
/// `start > end` 时程序 panic.
pub fn choose_indices(start: usize, end: usize, n: usize) -> Vec<usize> {
    assert!(start <= end, "切片区间起点 {start} 大于终点 {end}");
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => (0..n)
            .map(|i| {
                let p = i as f64 / (n - 1) as f64;
                (start as f64 + p * (end - start) as f64).round() as usize
            })
            .collect(),
    }
}

/// 把第 `index` 张切片渲染为 `(size, size, 3)` 的 u8 图像.
///
/// 边界切片的邻居索引钳制到有效范围 (首张切片的 "前一张" 即其自身).
///
/// # 注意
///
/// `index` 超出 `opts.axis` 方向长度时程序 panic.
pub fn render_slice(volume: &MriVolume, index: usize, opts: &RenderOptions) -> Array3<u8> {
    let n = volume.len_along(opts.axis);
    assert!(index < n, "切片索引 {index} 超出范围 (共 {n} 张)");

    let mid = volume.cross_section(opts.axis, index);
    let rgb = if opts.neighbor_stack {
        let prev = volume.cross_section(opts.axis, index.saturating_sub(1));
        let next = volume.cross_section(opts.axis, (index + 1).min(n - 1));
        stack_to_u8(&[prev, mid, next])
    } else {
        stack_to_u8(&[mid, mid, mid])
    };
    resize_rgb(&rgb, opts.size)
}

/// 三张同形状切片叠成三通道, 按 \[p1, p99\] 裁剪后线性映射到 \[0, 255\].
fn stack_to_u8(channels: &[ArrayView2<'_, f32>; 3]) -> Array3<u8> {
    // 三个视图形状一致, 该操作不会生成 `Err`, 可直接 unwrap.
    let mut merged = stack(Axis(2), channels).unwrap();

    let values: Vec<f32> = merged.iter().copied().collect();
    let (lo, hi) = stats::clip_bounds(&values);
    merged.mapv_inplace(|v| v.clamp(lo, hi));

    let min = merged.iter().fold(f32::INFINITY, |m, &v| m.min(v));
    merged.mapv_inplace(|v| v - min);
    let max = merged.iter().fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    if max > 0.0 {
        merged.mapv_inplace(|v| v / max);
    }
    merged.mapv(|v| (v * 255.0) as u8)
}

/// Lanczos 重采样到 `size x size`.
fn resize_rgb(rgb: &Array3<u8>, size: usize) -> Array3<u8> {
    let (h, w, _) = rgb.dim();
    // 标准布局的 (h, w, 3) 数组与 RgbImage 的行主序缓冲一致,
    // 该操作不会生成 `None`, 可直接 unwrap.
    let img = RgbImage::from_raw(w as u32, h as u32, rgb.to_owned().into_raw_vec()).unwrap();
    let resized = imageops::resize(&img, size as u32, size as u32, FilterType::Lanczos3);
    // 缓冲长度恰为 size * size * 3, 该操作不会生成 `Err`, 可直接 unwrap.
    Array3::from_shape_vec((size, size, 3), resized.into_raw()).unwrap()
}
