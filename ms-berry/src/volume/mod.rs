//! 3D MRI 体数据载入与标准化.
//!
//! 所有下游模块 (切片渲染, patch 推理, 数据集导出) 都假设体数据已经过
//! 本模块的规范化: RAS+ 轴序, 1mm 各向同性间距, z-score 标准化并按
//! \[p1, p99\] 裁剪离群值.

pub mod bounds;
mod reorient;
mod resample;

use crate::consts::{ISOTROPIC_TOLERANCE, NORM_EPSILON};
use crate::error::PipelineError;
use crate::stats;
use crate::{Idx2d, Idx3d};
use ndarray::{Array3, ArrayView2, ArrayView3, Axis};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use std::path::Path;

pub use bounds::tissue_bounds;

/// 规范化后的 3D MRI 体数据.
///
/// 数组索引顺序与 RAS+ 世界轴一致: 轴 0 向右, 轴 1 向前, 轴 2 向上
/// (轴 2 即轴向切片堆叠方向). 体素值为 z-score 标准化后的强度.
#[derive(Debug, Clone)]
pub struct MriVolume {
    data: Array3<f32>,
    spacing: [f32; 3],
}

impl MriVolume {
    /// 从 nii / nii.gz 文件载入并完成全部规范化.
    ///
    /// 步骤依次为:
    ///
    /// 1. 4D 扫描只保留第一个时间点;
    /// 2. 按 header 仿射矩阵重排为 RAS+ (斜轴等无法判定方向时跳过);
    /// 3. 体素间距偏离 1mm 超过容差时, 三线性重采样到各向同性;
    /// 4. z-score 标准化, 再按标准化后的 \[p1, p99\] 裁剪.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let wrap = |source| PipelineError::VolumeLoad {
            path: path.to_path_buf(),
            source,
        };

        let obj = ReaderOptions::new().read_file(path).map_err(wrap)?;
        let header = obj.header().clone();
        let raw = obj.into_volume().into_ndarray::<f32>().map_err(wrap)?;

        // 4D 扫描 (多时间点/多回波) 只取第一个体数据.
        let raw = if raw.ndim() == 4 {
            raw.index_axis_move(Axis(3), 0)
        } else {
            raw
        };
        let ndim = raw.ndim();
        let data = raw
            .into_dimensionality::<ndarray::Ix3>()
            .map_err(|_| PipelineError::InvalidVolume {
                path: path.to_path_buf(),
                ndim,
            })?;

        let spacing = [header.pixdim[1], header.pixdim[2], header.pixdim[3]];

        let (data, spacing) =
            match reorient::axis_orientation(&reorient::affine_from_header(&header)) {
                Some(orient) => reorient::to_canonical(data, spacing, orient),
                None => {
                    log::warn!(
                        "`{}` 仿射矩阵退化, 跳过方向规范化",
                        path.display()
                    );
                    (data, spacing)
                }
            };

        let mut volume = Self { data, spacing };
        if !volume.is_isotropic() {
            log::info!(
                "`{}` 体素间距 {:?}mm, 重采样到 1mm 各向同性",
                path.display(),
                volume.spacing
            );
            volume.data = resample::resample_to_isotropic(&volume.data, volume.spacing);
            volume.spacing = [1.0, 1.0, 1.0];
        }
        volume.normalize();
        Ok(volume)
    }

    /// 直接由数组与间距构造, 不做任何规范化. 仅用于实验目的.
    pub fn from_parts(data: Array3<f32>, spacing: [f32; 3]) -> Self {
        Self { data, spacing }
    }

    /// z-score 标准化后按 \[p1, p99\] 裁剪. 常数体数据标准化为全零.
    fn normalize(&mut self) {
        let (mean, std) = stats::mean_std(self.data.iter());
        let denom = std + NORM_EPSILON;
        self.data.mapv_inplace(|v| (v - mean) / denom);

        let values: Vec<f32> = self.data.iter().copied().collect();
        let (lo, hi) = stats::clip_bounds(&values);
        self.data.mapv_inplace(|v| v.clamp(lo, hi));
    }

    /// 三个维度的轴长.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 体素间距 (毫米).
    #[inline]
    pub fn spacing(&self) -> [f32; 3] {
        self.spacing
    }

    /// 沿 `axis` 的切片数.
    #[inline]
    pub fn len_along(&self, axis: usize) -> usize {
        self.data.len_of(Axis(axis))
    }

    /// 三个方向的间距是否都在 1mm 容差内.
    #[inline]
    pub fn is_isotropic(&self) -> bool {
        self.spacing
            .iter()
            .all(|&s| (s - 1.0).abs() <= ISOTROPIC_TOLERANCE)
    }

    /// 体素总数.
    #[inline]
    pub fn voxel_count(&self) -> usize {
        self.data.len()
    }

    /// 体素数据视图.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 沿 `axis` 的第 `index` 张切片.
    ///
    /// # 注意
    ///
    /// `axis >= 3` 或 `index` 越界时程序 panic.
    #[inline]
    pub fn cross_section(&self, axis: usize, index: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(axis), index)
    }

    /// 沿 `axis` 含组织的切片闭区间. 详见 [`tissue_bounds`].
    #[inline]
    pub fn tissue_bounds(&self, axis: usize) -> Idx2d {
        tissue_bounds(self.data.view(), axis)
    }
}
