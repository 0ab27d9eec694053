//! 通用常量.

/// 默认采样切片数.
pub const DEFAULT_N_SLICES: usize = 20;

/// 默认输出切片边长 (正方形).
pub const DEFAULT_SLICE_SIZE: usize = 224;

/// 规范化到 RAS+ 后, 默认的轴向 (axial) 轴索引.
pub const DEFAULT_AXIAL_AXIS: usize = 2;

/// 默认 patch 边长.
pub const DEFAULT_PATCH_SIZE: usize = 32;

/// 默认滑动窗口步长.
pub const DEFAULT_STRIDE: usize = 8;

/// 默认推理批大小.
pub const DEFAULT_BATCH_SIZE: usize = 128;

/// 组织切片判定阈值: 切片内最大强度超过全局最大强度的该比例, 才算含组织.
pub const TISSUE_THRESHOLD_RATIO: f32 = 0.05;

/// 体素间距与 1mm 各向同性的允许偏差. 超过则触发重采样.
pub const ISOTROPIC_TOLERANCE: f32 = 1e-3;

/// 除法保护与归一化用的小量.
pub const NORM_EPSILON: f32 = 1e-8;

/// 强度裁剪的下百分位.
pub const PERCENTILE_LOW: f64 = 1.0;

/// 强度裁剪的上百分位.
pub const PERCENTILE_HIGH: f64 = 99.0;

/// overlay 中热图的混合权重 (原图权重为 1 减该值).
pub const OVERLAY_ALPHA: f32 = 0.5;
