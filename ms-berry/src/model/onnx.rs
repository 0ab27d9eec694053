//! ONNX 后端的 patch 分类器.

use crate::error::{InferenceError, PipelineError};
use crate::model::PatchClassifier;
use ndarray::ArrayView4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// 基于 onnxruntime 的病灶分类器.
///
/// # 注意
///
/// 1. 权重加载开销大, 进程内应只构造一次, 用 `Arc` 在线程间共享.
/// 2. onnxruntime 的推理调用需要独占会话, 内部用互斥锁串行化;
///    并发调用 [`PatchClassifier::predict`] 是安全的, 但会排队.
#[derive(Debug)]
pub struct OnnxPatchClassifier {
    session: Mutex<Session>,
    output_name: String,
    path: PathBuf,
}

impl OnnxPatchClassifier {
    /// 从 onnx 权重文件加载分类器.
    ///
    /// 文件不存在时返回 [`PipelineError::ModelWeightsNotFound`],
    /// 不会进入 onnxruntime 初始化.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PipelineError::ModelWeightsNotFound(path.to_path_buf()));
        }

        let wrap = |e: ort::Error| {
            PipelineError::Inference(InferenceError::new(format!("onnxruntime: {e}")))
        };
        let session = Session::builder()
            .and_then(|b| Ok(b.with_optimization_level(GraphOptimizationLevel::Level3)?))
            .and_then(|mut b| b.commit_from_file(path))
            .map_err(wrap)?;
        let output_name = session.outputs()[0].name().to_string();

        log::info!("已加载分类器权重: `{}`", path.display());
        Ok(Self {
            session: Mutex::new(session),
            output_name,
            path: path.to_path_buf(),
        })
    }

    /// 权重文件路径.
    #[inline]
    pub fn weights_path(&self) -> &Path {
        &self.path
    }
}

impl PatchClassifier for OnnxPatchClassifier {
    fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError> {
        let shape: Vec<usize> = batch.shape().to_vec();
        let data: Vec<f32> = batch.iter().copied().collect();
        let input = ort::value::Value::from_array((shape.as_slice(), data))
            .map_err(|e| InferenceError::new(format!("构造输入张量失败: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::new("分类器会话互斥锁已中毒"))?;
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| InferenceError::new(format!("onnxruntime: {e}")))?;

        let (_, probs) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::new(format!("提取输出张量失败: {e}")))?;
        Ok(probs.to_vec())
    }
}
