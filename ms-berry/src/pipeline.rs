//! 端到端推理流水线.
//!
//! 串起各阶段: 载入体数据, 选取切片, 渲染 RGB 图像, 滑窗分块,
//! 批量分类, 热力图累积与叠加. 每个阶段也可单独调用, 本模块只负责
//! 编排与错误归集.

use crate::consts::{
    DEFAULT_AXIAL_AXIS, DEFAULT_BATCH_SIZE, DEFAULT_N_SLICES, DEFAULT_PATCH_SIZE,
    DEFAULT_SLICE_SIZE, DEFAULT_STRIDE, OVERLAY_ALPHA,
};
use crate::error::PipelineError;
use crate::model::{predict_batched, PatchClassifier};
use crate::render::{choose_indices, render_slice, RenderOptions};
use crate::{heatmap, tile, MriVolume};
use either::Either;
use image::RgbImage;
use ndarray::Array3;
use std::fs;
use std::path::Path;

/// 流水线参数. [`Default`] 给出推理服务使用的标准配置.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 均匀采样的切片数.
    pub n_slices: usize,

    /// 渲染时三通道是否取相邻三张切片.
    pub use_neighbor_stack: bool,

    /// 渲染图像边长 (像素).
    pub size: usize,

    /// 切片堆叠方向 (RAS+ 下 2 为轴向).
    pub axis: usize,

    /// 为 `true` 时忽略 `n_slices`, 处理组织区间内的全部切片.
    pub use_all_slices: bool,

    /// 滑动窗口边长 (像素).
    pub patch_size: usize,

    /// 滑动窗口步长 (像素).
    pub stride: usize,

    /// 单次送入分类器的 patch 数上限.
    pub batch_size: usize,

    /// 为 `true` 时在结果中附带未叠加热力图的原始切片图像.
    pub return_raw: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            n_slices: DEFAULT_N_SLICES,
            use_neighbor_stack: false,
            size: DEFAULT_SLICE_SIZE,
            axis: DEFAULT_AXIAL_AXIS,
            use_all_slices: false,
            patch_size: DEFAULT_PATCH_SIZE,
            stride: DEFAULT_STRIDE,
            batch_size: DEFAULT_BATCH_SIZE,
            return_raw: false,
        }
    }
}

impl PipelineConfig {
    /// 对应的切片渲染参数.
    #[inline]
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            size: self.size,
            neighbor_stack: self.use_neighbor_stack,
            axis: self.axis,
        }
    }
}

/// 渲染完成, 等待推理的一张切片.
#[derive(Debug, Clone)]
pub struct RenderedSlice {
    /// 切片在体数据中的索引.
    pub index: usize,

    /// `(size, size, 3)` 的 u8 RGB 图像.
    pub image: Array3<u8>,
}

/// 一张切片的推理结果. 三张图都是 `(size, size, 3)` 的 u8 RGB.
#[derive(Debug, Clone)]
pub struct SliceResult {
    /// 切片在体数据中的索引.
    pub index: usize,

    /// jet 伪彩渲染的热力图.
    pub heatmap: Array3<u8>,

    /// 热力图叠加到切片底图后的混合图像.
    pub overlay: Array3<u8>,

    /// 原始切片图像, 仅 `return_raw` 时附带.
    pub raw: Option<Array3<u8>>,
}

/// 按配置确定待处理的切片索引序列.
fn sampled_indices(volume: &MriVolume, cfg: &PipelineConfig) -> Vec<usize> {
    let (start, end) = volume.tissue_bounds(cfg.axis);
    let iter = if cfg.use_all_slices {
        log::info!("全切片模式: 处理 [{start}, {end}] 共 {} 张", end - start + 1);
        Either::Left(start..=end)
    } else {
        Either::Right(choose_indices(start, end, cfg.n_slices).into_iter())
    };
    iter.collect()
}

/// 从已规范化的体数据渲染采样切片.
pub fn render_samples(volume: &MriVolume, cfg: &PipelineConfig) -> Vec<RenderedSlice> {
    let opts = cfg.render_options();
    sampled_indices(volume, cfg)
        .into_iter()
        .map(|index| RenderedSlice {
            index,
            image: render_slice(volume, index, &opts),
        })
        .collect()
}

/// 载入体数据并渲染采样切片 (不做推理).
pub fn preprocess_volume<P: AsRef<Path>>(
    path: P,
    cfg: &PipelineConfig,
) -> Result<Vec<RenderedSlice>, PipelineError> {
    let volume = MriVolume::open(path)?;
    Ok(render_samples(&volume, cfg))
}

/// 对单张渲染切片做滑窗推理与热力图合成.
fn predict_one<C>(
    classifier: &C,
    slice: &RenderedSlice,
    cfg: &PipelineConfig,
) -> Result<SliceResult, PipelineError>
where
    C: PatchClassifier + ?Sized,
{
    let coords = tile::tile_coords(cfg.size, cfg.size, cfg.patch_size, cfg.stride);
    let patches = tile::extract_patches(&slice.image, &coords, cfg.patch_size);
    let probs = predict_batched(classifier, &patches, cfg.batch_size)?;

    let mean = heatmap::accumulate(&coords, &probs, (cfg.size, cfg.size), cfg.patch_size);
    let norm = heatmap::normalize(&mean);
    let colored = heatmap::colorize(&norm);
    let over = heatmap::overlay(slice.image.view(), &colored, OVERLAY_ALPHA);

    Ok(SliceResult {
        index: slice.index,
        heatmap: heatmap::to_u8(&colored),
        overlay: over,
        raw: cfg.return_raw.then(|| slice.image.clone()),
    })
}

/// 对一组渲染切片依次做推理.
///
/// 输出顺序与输入一致. 任一切片失败立即中止, 错误中带有该切片在
/// 序列中的位置; 不返回部分结果.
pub fn predict_slices<C>(
    classifier: &C,
    slices: &[RenderedSlice],
    cfg: &PipelineConfig,
) -> Result<Vec<SliceResult>, PipelineError>
where
    C: PatchClassifier + ?Sized,
{
    let total = slices.len();
    slices
        .iter()
        .enumerate()
        .map(|(pos, slice)| {
            log::info!("推理切片 {}/{total} (体数据索引 {})", pos + 1, slice.index);
            predict_one(classifier, slice, cfg).map_err(|e| match e {
                PipelineError::Inference(ie) => PipelineError::Inference(ie.with_slice(pos)),
                other => other,
            })
        })
        .collect()
}

/// 完整流水线: 文件路径进, 逐切片热力图结果出.
pub fn predict_volume<C, P>(
    classifier: &C,
    path: P,
    cfg: &PipelineConfig,
) -> Result<Vec<SliceResult>, PipelineError>
where
    C: PatchClassifier + ?Sized,
    P: AsRef<Path>,
{
    let slices = preprocess_volume(path, cfg)?;
    predict_slices(classifier, &slices, cfg)
}

/// 把采样切片渲染为 PNG 写入 `out_dir`, 返回写出的张数.
///
/// 文件名形如 `slice_000.png`, 序号为切片在输出序列中的位置.
pub fn render_preview(
    volume: &MriVolume,
    out_dir: &Path,
    cfg: &PipelineConfig,
) -> Result<usize, PipelineError> {
    fs::create_dir_all(out_dir).map_err(|e| PipelineError::ImageWrite {
        path: out_dir.to_path_buf(),
        source: image::ImageError::IoError(e),
    })?;

    let slices = render_samples(volume, cfg);
    for (pos, slice) in slices.iter().enumerate() {
        let path = out_dir.join(format!("slice_{pos:03}.png"));
        save_rgb(&slice.image, &path)?;
    }
    Ok(slices.len())
}

/// 载入体数据并把预览切片写入 `out_dir`. 详见 [`render_preview`].
pub fn preview_to_dir<P: AsRef<Path>>(
    path: P,
    out_dir: &Path,
    cfg: &PipelineConfig,
) -> Result<usize, PipelineError> {
    let volume = MriVolume::open(path)?;
    render_preview(&volume, out_dir, cfg)
}

/// `(h, w, 3)` u8 数组存为 PNG.
pub(crate) fn save_rgb(rgb: &Array3<u8>, path: &Path) -> Result<(), PipelineError> {
    let (h, w, _) = rgb.dim();
    let mut img = RgbImage::new(w as u32, h as u32);
    for i in 0..h {
        for j in 0..w {
            let pixel = [rgb[(i, j, 0)], rgb[(i, j, 1)], rgb[(i, j, 2)]];
            img.put_pixel(j as u32, i as u32, image::Rgb(pixel));
        }
    }
    img.save(path).map_err(|e| PipelineError::ImageWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use ndarray::{s, Array3 as A3, ArrayView4, Axis};

    /// 恒定概率桩分类器.
    struct Const(f32);

    impl PatchClassifier for Const {
        fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError> {
            Ok(vec![self.0; batch.len_of(Axis(0))])
        }
    }

    /// 总是失败的桩分类器.
    struct AlwaysFail;

    impl PatchClassifier for AlwaysFail {
        fn predict(&self, _: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError> {
            Err(InferenceError::new("mock failure"))
        }
    }

    fn test_volume() -> MriVolume {
        let mut data = A3::<f32>::zeros((24, 24, 24));
        data.slice_mut(s![4..20, 4..20, 6..18])
            .assign(&A3::from_shape_fn((16, 16, 12), |(i, j, k)| {
                ((i + j + k) % 7) as f32 + 1.0
            }));
        MriVolume::from_parts(data, [1.0, 1.0, 1.0])
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            n_slices: 4,
            size: 32,
            patch_size: 8,
            stride: 4,
            batch_size: 16,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.n_slices, 20);
        assert_eq!(cfg.size, 224);
        assert_eq!(cfg.patch_size, 32);
        assert_eq!(cfg.stride, 8);
        assert_eq!(cfg.batch_size, 128);
        assert!(!cfg.use_all_slices);
        assert!(!cfg.return_raw);
    }

    #[test]
    fn test_render_samples_shape_invariant() {
        let v = test_volume();
        let cfg = test_config();
        let slices = render_samples(&v, &cfg);
        assert_eq!(slices.len(), 4);
        for s in &slices {
            assert_eq!(s.image.dim(), (32, 32, 3));
            // 组织区间为 [6, 17].
            assert!((6..=17).contains(&s.index));
        }
        assert!(slices.windows(2).all(|w| w[0].index <= w[1].index));
    }

    #[test]
    fn test_render_samples_all_slices() {
        let v = test_volume();
        let cfg = PipelineConfig {
            use_all_slices: true,
            ..test_config()
        };
        let slices = render_samples(&v, &cfg);
        assert_eq!(slices.len(), 12);
        assert_eq!(slices[0].index, 6);
        assert_eq!(slices[11].index, 17);
    }

    #[test]
    fn test_predict_slices_end_to_end() {
        let _ = simple_logger::SimpleLogger::new().init();

        let v = test_volume();
        let cfg = test_config();
        let slices = render_samples(&v, &cfg);
        let results = predict_slices(&Const(0.5), &slices, &cfg).unwrap();

        assert_eq!(results.len(), slices.len());
        for (r, s) in results.iter().zip(&slices) {
            assert_eq!(r.index, s.index);
            assert_eq!(r.heatmap.dim(), (32, 32, 3));
            assert_eq!(r.overlay.dim(), (32, 32, 3));
            assert!(r.raw.is_none());
        }

        // 恒定概率归一化后处处为 0, 伪彩即 jet(0) = 深蓝.
        let hm = &results[0].heatmap;
        for i in 0..32 {
            for j in 0..32 {
                assert_eq!(hm[(i, j, 0)], 0);
                assert_eq!(hm[(i, j, 1)], 0);
                assert_eq!(hm[(i, j, 2)], 128);
            }
        }
    }

    #[test]
    fn test_predict_return_raw() {
        let v = test_volume();
        let cfg = PipelineConfig {
            return_raw: true,
            ..test_config()
        };
        let slices = render_samples(&v, &cfg);
        let results = predict_slices(&Const(0.25), &slices, &cfg).unwrap();

        // 附带的原图与渲染切片逐像素一致.
        let raw = results[0].raw.as_ref().unwrap();
        assert_eq!(raw, &slices[0].image);
    }

    #[test]
    fn test_predict_failure_tags_slice() {
        let v = test_volume();
        let cfg = test_config();
        let slices = render_samples(&v, &cfg);
        let err = predict_slices(&AlwaysFail, &slices, &cfg).unwrap_err();
        match err {
            PipelineError::Inference(ie) => {
                assert_eq!(ie.slice, Some(0));
                assert_eq!(ie.batch, Some(0));
            }
            other => panic!("意料之外的错误: {other}"),
        }
    }

    #[test]
    fn test_render_preview_writes_png() {
        let v = test_volume();
        let cfg = test_config();
        let dir = tempfile::tempdir().unwrap();

        let n = render_preview(&v, dir.path(), &cfg).unwrap();
        assert_eq!(n, 4);
        for pos in 0..4 {
            let path = dir.path().join(format!("slice_{pos:03}.png"));
            assert!(path.is_file());
        }
    }

    #[test]
    fn test_trait_object_classifier() {
        // 分类器可以作为 trait 对象传入.
        let v = test_volume();
        let cfg = test_config();
        let slices = render_samples(&v, &cfg);
        let boxed: Box<dyn PatchClassifier> = Box::new(Const(0.9));
        let results = predict_slices(boxed.as_ref(), &slices, &cfg).unwrap();
        assert_eq!(results.len(), 4);
    }
}
