//! 流水线运行时错误.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// 批量推理错误.
///
/// 携带出错位置 (输出序列中的切片位置与批次序号, 若可知), 便于定位问题.
#[derive(Debug)]
pub struct InferenceError {
    /// 出错切片在输出序列中的位置.
    pub slice: Option<usize>,

    /// 出错批次序号 (从 0 开始).
    pub batch: Option<usize>,

    /// 底层原因.
    pub reason: String,
}

impl InferenceError {
    /// 由底层原因构建.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            slice: None,
            batch: None,
            reason: reason.into(),
        }
    }

    /// 附加批次序号. 已有批次信息时保留原值.
    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch.get_or_insert(batch);
        self
    }

    /// 附加切片位置. 已有切片信息时保留原值.
    pub fn with_slice(mut self, slice: usize) -> Self {
        self.slice.get_or_insert(slice);
        self
    }
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "推理失败")?;
        if let Some(s) = self.slice {
            write!(f, " (切片 {s})")?;
        }
        if let Some(b) = self.batch {
            write!(f, " (批次 {b})")?;
        }
        write!(f, ": {}", self.reason)
    }
}

impl Error for InferenceError {}

/// 流水线错误总类.
///
/// 任一错误都会中止整个体数据的处理; 本 crate 不会返回部分切片结果.
#[derive(Debug)]
pub enum PipelineError {
    /// 体数据文件无法读取或已损坏.
    VolumeLoad {
        /// 出错文件路径.
        path: PathBuf,
        /// 底层 nifti 错误.
        source: nifti::NiftiError,
    },

    /// 压缩 4D 后体数据仍不是 3 维.
    InvalidVolume {
        /// 出错文件路径.
        path: PathBuf,
        /// 压缩后的实际维数.
        ndim: usize,
    },

    /// 分类器权重文件不存在. 这属于配置错误, 不应重试.
    ModelWeightsNotFound(PathBuf),

    /// 批量推理失败.
    Inference(InferenceError),

    /// 切片图像写盘失败 (预览/导出模式).
    ImageWrite {
        /// 目标文件路径.
        path: PathBuf,
        /// 底层图像库错误.
        source: image::ImageError,
    },

    /// manifest 清单写盘失败 (数据集导出模式).
    ManifestWrite {
        /// 目标文件路径.
        path: PathBuf,
        /// 底层 io 错误.
        source: std::io::Error,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VolumeLoad { path, source } => {
                write!(f, "无法读取体数据 `{}`: {source}", path.display())
            }
            Self::InvalidVolume { path, ndim } => {
                write!(f, "`{}` 不是 3D MRI 体数据 (实际 {ndim} 维)", path.display())
            }
            Self::ModelWeightsNotFound(path) => {
                write!(f, "分类器权重文件 `{}` 不存在", path.display())
            }
            Self::Inference(e) => write!(f, "{e}"),
            Self::ImageWrite { path, source } => {
                write!(f, "无法写出图像 `{}`: {source}", path.display())
            }
            Self::ManifestWrite { path, source } => {
                write!(f, "无法写出清单 `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::VolumeLoad { source, .. } => Some(source),
            Self::Inference(e) => Some(e),
            Self::ImageWrite { source, .. } => Some(source),
            Self::ManifestWrite { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<InferenceError> for PipelineError {
    #[inline]
    fn from(e: InferenceError) -> Self {
        Self::Inference(e)
    }
}
