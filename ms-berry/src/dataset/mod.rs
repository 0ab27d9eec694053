//! 训练数据集导出.
//!
//! 把规范化后的体数据批量导出为切片 PNG 与 patch 样本, 并生成
//! manifest 清单供训练脚本索引. 患者级的训练/验证划分与目录组织
//! 由外部脚本完成, 不在本模块范围内.

use crate::error::PipelineError;
use crate::pipeline::{render_samples, save_rgb, PipelineConfig};
use crate::{tile, Idx2d, MriVolume};
use ndarray::{s, Array3, ArrayView3};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// manifest 清单中一个患者体数据的记录.
#[derive(Debug, Clone)]
pub struct ManifestRow {
    /// 患者标识.
    pub patient_id: String,

    /// 类别标签 (MS 为 1, 对照为 0).
    pub label: u8,

    /// 模态 (如 `T1`, `T2`).
    pub modality: String,

    /// 该患者切片 PNG 所在目录.
    pub slice_dir: PathBuf,

    /// 实际导出的切片数.
    pub n_slices: usize,
}

/// 把记录写为 csv 清单, 列为
/// `patient_id,label,modality,slice_dir,n_slices`.
pub fn write_manifest(rows: &[ManifestRow], path: &Path) -> Result<(), PipelineError> {
    let wrap = |source| PipelineError::ManifestWrite {
        path: path.to_path_buf(),
        source,
    };

    let file = fs::File::create(path).map_err(wrap)?;
    let mut w = BufWriter::new(file);
    writeln!(w, "patient_id,label,modality,slice_dir,n_slices").map_err(wrap)?;
    for r in rows {
        writeln!(
            w,
            "{},{},{},{},{}",
            r.patient_id,
            r.label,
            r.modality,
            r.slice_dir.display(),
            r.n_slices
        )
        .map_err(wrap)?;
    }
    w.flush().map_err(wrap)
}

/// 载入一个体数据并把采样切片写入 `out_dir`, 返回写出的张数.
///
/// 文件名形如 `slice_01.png`, 序号从 1 开始.
pub fn export_volume_slices<P: AsRef<Path>>(
    path: P,
    out_dir: &Path,
    cfg: &PipelineConfig,
) -> Result<usize, PipelineError> {
    fs::create_dir_all(out_dir).map_err(|e| PipelineError::ManifestWrite {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    let volume = MriVolume::open(path)?;
    let slices = render_samples(&volume, cfg);
    for (pos, slice) in slices.iter().enumerate() {
        let fname = out_dir.join(format!("slice_{:02}.png", pos + 1));
        save_rgb(&slice.image, &fname)?;
    }
    Ok(slices.len())
}

/// patch 样本筛选参数. 默认值即训练数据导出时的标准配置.
#[derive(Debug, Clone, Copy)]
pub struct PatchFilter {
    /// 像素视为脑组织的最低强度.
    pub intensity_threshold: u8,

    /// patch 内组织像素的最低占比.
    pub min_tissue_ratio: f32,

    /// patch 内强度方差下限, 用于剔除平坦背景与均匀噪声.
    pub var_threshold: f32,
}

impl Default for PatchFilter {
    fn default() -> Self {
        Self {
            intensity_threshold: 20,
            min_tissue_ratio: 0.5,
            var_threshold: 40.0,
        }
    }
}

/// 判断一个 patch 是否含足够脑组织, 适合作为训练样本.
///
/// 两个条件须同时满足: 强度严格大于阈值的像素占比超过
/// `min_tissue_ratio`, 且全 patch 强度方差超过 `var_threshold`.
pub fn patch_is_interesting(patch: ArrayView3<'_, u8>, filter: &PatchFilter) -> bool {
    let total = patch.len();
    if total == 0 {
        return false;
    }

    let tissue = patch
        .iter()
        .filter(|&&v| v > filter.intensity_threshold)
        .count();
    if (tissue as f32 / total as f32) <= filter.min_tissue_ratio {
        return false;
    }

    let mean = patch.iter().map(|&v| v as f64).sum::<f64>() / total as f64;
    let var = patch
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / total as f64;
    var as f32 > filter.var_threshold
}

/// 把切片图像按步长 1 穷举切成 patch, 只保留通过筛选的样本.
///
/// 返回每个样本的左上角坐标与像素副本, 顺序为行优先.
pub fn split_image_into_patches(
    image: &Array3<u8>,
    patch: usize,
    filter: &PatchFilter,
) -> Vec<(Idx2d, Array3<u8>)> {
    let (h, w, _) = image.dim();
    tile::tile_coords(h, w, patch, 1)
        .into_iter()
        .filter_map(|(r, c)| {
            let view = image.slice(s![r..r + patch, c..c + patch, ..]);
            patch_is_interesting(view, filter).then(|| ((r, c), view.to_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3 as A3;

    #[test]
    fn test_flat_patch_rejected() {
        // 全黑与均匀亮块都缺少纹理.
        let filter = PatchFilter::default();
        let black = A3::<u8>::zeros((8, 8, 3));
        assert!(!patch_is_interesting(black.view(), &filter));
        let flat = A3::<u8>::from_elem((8, 8, 3), 200);
        assert!(!patch_is_interesting(flat.view(), &filter));
    }

    #[test]
    fn test_textured_patch_accepted() {
        let patch = A3::from_shape_fn((8, 8, 3), |(i, j, _)| (30 + 10 * ((i + j) % 8)) as u8);
        assert!(patch_is_interesting(patch.view(), &PatchFilter::default()));
    }

    #[test]
    fn test_mostly_background_rejected() {
        // 纹理充分但组织占比不足一半.
        let mut patch = A3::<u8>::zeros((8, 8, 3));
        patch
            .slice_mut(s![0..3, .., ..])
            .assign(&A3::from_shape_fn((3, 8, 3), |(i, j, _)| {
                (50 + 20 * (i + j)) as u8
            }));
        assert!(!patch_is_interesting(patch.view(), &PatchFilter::default()));
    }

    #[test]
    fn test_split_image_counts() {
        // 左半边有纹理组织, 右半边全黑.
        let image = A3::from_shape_fn((8, 16, 3), |(i, j, _)| {
            if j < 8 {
                (40 + 13 * ((i * 8 + j) % 11)) as u8
            } else {
                0
            }
        });
        let kept = split_image_into_patches(&image, 4, &PatchFilter::default());

        // 穷举窗口共 (8-4+1) * (16-4+1) = 65 个, 全黑区域必然被剔除.
        assert!(!kept.is_empty());
        assert!(kept.len() < 65);
        for ((r, c), p) in &kept {
            assert_eq!(p.dim(), (4, 4, 3));
            // 全黑窗口 (c >= 8) 不可能通过筛选.
            assert!(*c < 8);
            assert!(*r <= 4);
        }
    }

    #[test]
    fn test_write_manifest_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.csv");
        let rows = vec![
            ManifestRow {
                patient_id: "P001".into(),
                label: 1,
                modality: "T2".into(),
                slice_dir: PathBuf::from("out/P001"),
                n_slices: 20,
            },
            ManifestRow {
                patient_id: "P002".into(),
                label: 0,
                modality: "T2".into(),
                slice_dir: PathBuf::from("out/P002"),
                n_slices: 18,
            },
        ];
        write_manifest(&rows, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "patient_id,label,modality,slice_dir,n_slices");
        assert_eq!(lines[1], "P001,1,T2,out/P001,20");
        assert_eq!(lines[2], "P002,0,T2,out/P002,18");
    }

    #[test]
    fn test_export_missing_volume() {
        let dir = tempfile::tempdir().unwrap();
        let err = export_volume_slices(
            "/no/such/volume.nii.gz",
            dir.path(),
            &PipelineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::VolumeLoad { .. }));
    }
}
