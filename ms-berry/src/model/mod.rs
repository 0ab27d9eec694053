//! patch 分类器抽象与批量推理.

pub mod onnx;

pub use onnx::OnnxPatchClassifier;

use crate::error::InferenceError;
use ndarray::{Array4, ArrayView4, Axis};

/// patch 级病灶分类器.
///
/// 输入为形状 `(n, patch, patch, 3)` 的浮点批次, 像素值已缩放到
/// \[0, 1\]; 输出为 `n` 个病灶概率, 顺序与输入一致.
///
/// 实现方只需处理单个批次; 切批与结果拼接由 [`predict_batched`] 完成.
pub trait PatchClassifier {
    /// 对一个批次的 patch 给出逐 patch 的病灶概率.
    fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError>;
}

/// 把 patch 集合按 `batch_size` 切批依次送入分类器, 拼接全部概率.
///
/// 输出顺序与 `patches` 第 0 维一致. 任一批次失败立即返回错误,
/// 错误中带有批次序号. 分类器返回的概率个数与批内 patch 数不符
/// 同样视为推理失败.
///
/// # 注意
///
/// `batch_size` 必须为正, 否则程序 panic.
pub fn predict_batched<C>(
    classifier: &C,
    patches: &Array4<f32>,
    batch_size: usize,
) -> Result<Vec<f32>, InferenceError>
where
    C: PatchClassifier + ?Sized,
{
    assert!(batch_size > 0, "batch_size 必须为正");

    let mut probs = Vec::with_capacity(patches.len_of(Axis(0)));
    for (bi, chunk) in patches.axis_chunks_iter(Axis(0), batch_size).enumerate() {
        let out = classifier.predict(chunk).map_err(|e| e.with_batch(bi))?;
        if out.len() != chunk.len_of(Axis(0)) {
            return Err(InferenceError::new(format!(
                "分类器返回 {} 个概率, 但批内有 {} 个 patch",
                out.len(),
                chunk.len_of(Axis(0))
            ))
            .with_batch(bi));
        }
        probs.extend(out);
    }
    Ok(probs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    /// 返回每个 patch 左上角像素值的桩分类器.
    struct FirstPixel;

    impl PatchClassifier for FirstPixel {
        fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError> {
            Ok((0..batch.len_of(Axis(0)))
                .map(|n| batch[(n, 0, 0, 0)])
                .collect())
        }
    }

    /// 总是少返回一个概率的桩分类器.
    struct ShortOutput;

    impl PatchClassifier for ShortOutput {
        fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError> {
            Ok(vec![0.5; batch.len_of(Axis(0)).saturating_sub(1)])
        }
    }

    /// 第二批失败的桩分类器.
    struct FailSecondBatch;

    impl PatchClassifier for FailSecondBatch {
        fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError> {
            if batch[(0, 0, 0, 0)] >= 3.0 {
                Err(InferenceError::new("mock failure"))
            } else {
                Ok(vec![0.0; batch.len_of(Axis(0))])
            }
        }
    }

    /// 第 n 个 patch 全体像素取值 n.
    fn indexed_patches(n: usize) -> Array4<f32> {
        Array4::from_shape_fn((n, 2, 2, 3), |(i, _, _, _)| i as f32)
    }

    #[test]
    fn test_predict_batched_preserves_order() {
        let patches = indexed_patches(10);
        let probs = predict_batched(&FirstPixel, &patches, 3).unwrap();
        let expect: Vec<f32> = (0..10).map(|i| i as f32).collect();
        assert_eq!(probs, expect);
    }

    #[test]
    fn test_predict_batched_exact_multiple() {
        let patches = indexed_patches(8);
        assert_eq!(predict_batched(&FirstPixel, &patches, 4).unwrap().len(), 8);
        assert_eq!(predict_batched(&FirstPixel, &patches, 8).unwrap().len(), 8);
        assert_eq!(predict_batched(&FirstPixel, &patches, 100).unwrap().len(), 8);
    }

    #[test]
    fn test_predict_batched_empty_input() {
        let patches = indexed_patches(0);
        assert!(predict_batched(&FirstPixel, &patches, 4).unwrap().is_empty());
    }

    #[test]
    fn test_predict_batched_length_mismatch() {
        let patches = indexed_patches(4);
        let err = predict_batched(&ShortOutput, &patches, 4).unwrap_err();
        assert_eq!(err.batch, Some(0));
        assert!(err.reason.contains("4 个 patch"));
    }

    #[test]
    fn test_predict_batched_tags_failing_batch() {
        let patches = indexed_patches(6);
        let err = predict_batched(&FailSecondBatch, &patches, 3).unwrap_err();
        assert_eq!(err.batch, Some(1));
        assert_eq!(err.slice, None);
    }
}
