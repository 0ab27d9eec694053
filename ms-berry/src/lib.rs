#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供 3D 脑部 MRI (nii 格式) 的多发性硬化 (MS) 病灶推理流水线.
//!
//! 流水线按 "体数据 → 切片 → patch → 概率 → 热图" 的顺序组织:
//!
//! 1. 加载体数据, 规范化到 RAS+ 方向, 重采样到各向同性间距, 并做强度规范化
//!   (实现位于 `ms-berry/src/volume`);
//! 2. 检测组织所在的切片范围, 在范围内均匀采样切片索引并渲染为
//!   8-bit RGB 切片图 (实现位于 `ms-berry/src/render`);
//! 3. 滑动窗口把切片图切成固定大小的 patch (实现位于 `ms-berry/src/tile`);
//! 4. 分批把 patch 送入分类器, 得到每个 patch 的 MS 概率
//!   (实现位于 `ms-berry/src/model`);
//! 5. 把概率按覆盖区域加法沉积并取均值, 得到逐像素热图, 再经 jet
//!   色带与原图混合生成 overlay (实现位于 `ms-berry/src/heatmap`);
//! 6. `ms-berry/src/pipeline` 把上述步骤按切片序逐张编排.
//!
//! # 注意
//!
//! 1. 分类器 (网络结构与权重) 是外部协作者. 本 crate 只依赖
//!   "固定大小 patch → \[0,1\] 概率" 这一契约, 见 [`model::PatchClassifier`].
//! 2. 单个体数据内的处理是单线程同步的; 跨请求共享的只有只读的分类器句柄.
//! 3. 任一切片失败会中止整个体数据的处理, 不产生部分结果.
//! 4. 在非期望情况下 (越界索引, 零步长等), 程序会直接 panic,
//!   而不会导致内存错误. As what Rust promises.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

pub mod consts;

mod error;

pub use error::{InferenceError, PipelineError};

/// 3D MRI 体数据的加载与规范化.
pub mod volume;

pub use volume::MriVolume;

pub mod render;
pub mod tile;

pub mod model;

pub use model::{OnnxPatchClassifier, PatchClassifier};

pub mod heatmap;

pub mod pipeline;

pub use pipeline::{PipelineConfig, RenderedSlice, SliceResult};

pub mod dataset;

mod stats;

pub mod prelude;
