//! # 解码结果模型
//!
//! - `ProbedBounds`：探测阶段输出，只含尺寸与格式，不含像素
//! - `DecodedPage`：解码阶段输出，已按采样系数缩小的位图
//! - `PageDelivery`：分发给视图的结果，附带来源（内存缓存 / 本地解码）

use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageFormat};

use super::RequestKey;

/// 结果来源，供缓存层区分命中与新解码（日志 / 统计）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadedFrom {
    /// 内存缓存命中。
    Memory,
    /// 从本地来源新解码。
    Disk,
}

/// 探测阶段输出：图片头中的宽高与格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbedBounds {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

/// 已解码的页面位图。
#[derive(Debug, Clone)]
pub struct DecodedPage {
    pub key: RequestKey,
    pub image: DynamicImage,
    /// 原图尺寸（探测所得）。
    pub source_size: (u32, u32),
    /// 实际使用的采样系数。
    pub sample_size: u32,
    pub loaded_from: LoadedFrom,
}

impl DecodedPage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// 位图占用的字节数，作为缓存预算的计量单位。
    pub fn byte_size(&self) -> usize {
        self.image.as_bytes().len()
    }
}

/// 分发给视图的加载结果。
#[derive(Debug, Clone)]
pub struct PageDelivery {
    pub page: Arc<DecodedPage>,
    pub loaded_from: LoadedFrom,
}
