//! 各向同性重采样.
//!
//! 把体素间距不等于 1mm 的体数据用三线性插值重采样到 1×1×1mm,
//! 使 "数组索引差一" 在任何扫描上都对应相同的物理距离.

use ndarray::Array3;

/// 目标轴长: 原轴长乘以体素间距 (毫米), 四舍五入且至少为 1.
#[inline]
fn target_len(len: usize, spacing: f32) -> usize {
    ((len as f32 * spacing).round() as usize).max(1)
}

/// 输出索引映射回源坐标. 端点对齐: 输出首/尾索引分别落在源首/尾索引上.
#[inline]
fn src_pos(i: usize, n_in: usize, n_out: usize) -> f32 {
    if n_out <= 1 {
        0.0
    } else {
        i as f32 * (n_in - 1) as f32 / (n_out - 1) as f32
    }
}

/// 三线性插值重采样到 1mm 各向同性间距.
pub(crate) fn resample_to_isotropic(data: &Array3<f32>, spacing: [f32; 3]) -> Array3<f32> {
    let (d0, d1, d2) = data.dim();
    let out = (
        target_len(d0, spacing[0]),
        target_len(d1, spacing[1]),
        target_len(d2, spacing[2]),
    );

    Array3::from_shape_fn(out, |(i, j, k)| {
        trilinear(
            data,
            src_pos(i, d0, out.0),
            src_pos(j, d1, out.1),
            src_pos(k, d2, out.2),
        )
    })
}

/// 在 (x, y, z) 浮点坐标处做三线性插值. 坐标必须落在数据范围内.
fn trilinear(data: &Array3<f32>, x: f32, y: f32, z: f32) -> f32 {
    let (d0, d1, d2) = data.dim();

    let x0 = (x.floor() as usize).min(d0 - 1);
    let y0 = (y.floor() as usize).min(d1 - 1);
    let z0 = (z.floor() as usize).min(d2 - 1);
    let x1 = (x0 + 1).min(d0 - 1);
    let y1 = (y0 + 1).min(d1 - 1);
    let z1 = (z0 + 1).min(d2 - 1);

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let fz = z - z0 as f32;

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;

    let c00 = lerp(data[(x0, y0, z0)], data[(x1, y0, z0)], fx);
    let c01 = lerp(data[(x0, y0, z1)], data[(x1, y0, z1)], fx);
    let c10 = lerp(data[(x0, y1, z0)], data[(x1, y1, z0)], fx);
    let c11 = lerp(data[(x0, y1, z1)], data[(x1, y1, z1)], fx);

    let c0 = lerp(c00, c10, fy);
    let c1 = lerp(c01, c11, fy);
    lerp(c0, c1, fz)
}
