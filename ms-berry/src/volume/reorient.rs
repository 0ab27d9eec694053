//! 体数据方向规范化.
//!
//! nii 文件可以用任意轴顺序与方向存储体素. 本模块从 header 的仿射矩阵推断
//! 每个体素轴对应的世界轴, 并把数组重排为 RAS+ 约定
//! (轴 0 向右增长, 轴 1 向前增长, 轴 2 向上增长).

use ndarray::{Array3, Axis};
use nifti::NiftiHeader;

/// 体素轴到世界轴的映射. `orient[k] = (w, positive)` 表示体素轴 `k`
/// 对应世界轴 `w`, 且方向是否与世界正方向一致.
pub(crate) type AxisOrientation = [(usize, bool); 3];

/// 从 nii header 提取 4x4 仿射矩阵 (体素索引 → RAS+ 世界坐标, 毫米).
///
/// 优先使用 sform, 其次 qform, 都不可用时退化为 pixdim 对角阵.
pub(crate) fn affine_from_header(h: &NiftiHeader) -> [[f32; 4]; 4] {
    if h.sform_code > 0 {
        return [h.srow_x, h.srow_y, h.srow_z, [0.0, 0.0, 0.0, 1.0]];
    }
    if h.qform_code > 0 {
        return affine_from_quaternion(h);
    }
    let [_, sx, sy, sz, ..] = h.pixdim;
    [
        [sx, 0.0, 0.0, 0.0],
        [0.0, sy, 0.0, 0.0],
        [0.0, 0.0, sz, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// nifti-1 标准的 qform 重建: 由单位四元数 (a, b, c, d) 与 qfac 构造旋转.
fn affine_from_quaternion(h: &NiftiHeader) -> [[f32; 4]; 4] {
    let (b, c, d) = (h.quatern_b, h.quatern_c, h.quatern_d);
    let a = (1.0 - b * b - c * c - d * d).max(0.0).sqrt();

    // pixdim[0] 只允许 ±1, 决定第三个体素轴的手性.
    let qfac = if h.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
    let [_, sx, sy, sz, ..] = h.pixdim;

    let rot = [
        [
            a * a + b * b - c * c - d * d,
            2.0 * (b * c - a * d),
            2.0 * (b * d + a * c),
        ],
        [
            2.0 * (b * c + a * d),
            a * a + c * c - b * b - d * d,
            2.0 * (c * d - a * b),
        ],
        [
            2.0 * (b * d - a * c),
            2.0 * (c * d + a * b),
            a * a + d * d - b * b - c * c,
        ],
    ];

    let mut aff = [[0.0f32; 4]; 4];
    for (i, row) in rot.iter().enumerate() {
        aff[i][0] = row[0] * sx;
        aff[i][1] = row[1] * sy;
        aff[i][2] = row[2] * sz * qfac;
        aff[i][3] = [h.quatern_x, h.quatern_y, h.quatern_z][i];
    }
    aff[3] = [0.0, 0.0, 0.0, 1.0];
    aff
}

/// 推断每个体素轴最接近的世界轴与方向.
///
/// 仿射矩阵退化 (零列或两个体素轴落到同一世界轴) 时返回 `None`,
/// 调用者应跳过方向规范化.
pub(crate) fn axis_orientation(aff: &[[f32; 4]; 4]) -> Option<AxisOrientation> {
    let mut used = [false; 3];
    let mut ans: AxisOrientation = [(0, true); 3];

    for (k, slot) in ans.iter_mut().enumerate() {
        let mut best = 0.0f32;
        let mut world = 0usize;
        for (i, row) in aff.iter().take(3).enumerate() {
            let v = row[k].abs();
            if v > best {
                best = v;
                world = i;
            }
        }
        if best == 0.0 || used[world] {
            return None;
        }
        used[world] = true;
        *slot = (world, aff[world][k] >= 0.0);
    }
    Some(ans)
}

/// 按轴映射把体数据重排为 RAS+, 同时重排体素间距.
pub(crate) fn to_canonical(
    data: Array3<f32>,
    spacing: [f32; 3],
    orient: AxisOrientation,
) -> (Array3<f32>, [f32; 3]) {
    let mut perm = [0usize; 3];
    let mut flip = [false; 3];
    let mut new_spacing = [1.0f32; 3];

    for (k, &(world, positive)) in orient.iter().enumerate() {
        perm[world] = k;
        flip[world] = !positive;
        new_spacing[world] = spacing[k];
    }

    let mut data = data.permuted_axes(perm);
    for (world, &f) in flip.iter().enumerate() {
        if f {
            data.invert_axis(Axis(world));
        }
    }

    let data = if data.is_standard_layout() {
        data
    } else {
        data.as_standard_layout().to_owned()
    };
    (data, new_spacing)
}
