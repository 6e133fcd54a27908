//! # 配置模块
//!
//! ## 设计思路
//!
//! 将加载链路所有可调参数集中到 `LoaderConfig`：目标尺寸、内存缓存预算、
//! 解码并发度、非 JPEG 解码的像素上限、降采样滤镜以及阅读器预加载窗口。
//!
//! ## 实现思路
//!
//! - `Default` 提供可直接使用的配置（目标尺寸按 1080p 屏幕推导）。
//! - `for_display` 按设备宽高推导目标尺寸：长边 × 2，一次计算后保持不变。
//! - `memory_cache_budget` 按可用内存百分比推导缓存字节预算。

use std::time::Duration;

use image::imageops::FilterType;

/// 目标尺寸相对屏幕长边的放大倍数，为布局与缩放留出余量。
const DISPLAY_SIZE_MARGIN: u32 = 2;

/// 默认内存缓存占可用内存的百分比。
pub const DEFAULT_CACHE_PERCENT: u8 = 10;

/// 页面加载配置。
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// 解码结果长边上限（像素）。
    pub target_size: u32,
    /// 已解码页面的内存缓存预算（字节）。
    pub memory_cache_bytes: usize,
    /// 同时进行的解码任务上限。
    pub max_parallel_decodes: usize,
    /// 非 JPEG 页面整图解码允许的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 单页压缩数据允许读入内存的最大字节数。
    pub max_page_bytes: u64,
    /// 二次降采样使用的滤镜。
    pub resize_filter: FilterType,
    /// 当前页两侧保持实例化的页面数量。
    pub offscreen_page_limit: usize,
    /// 关闭管线时等待在途解码结束的时长。
    pub shutdown_grace: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            target_size: target_size_for_display(1920, 1080),
            memory_cache_bytes: 64 * 1024 * 1024,
            max_parallel_decodes: 3,
            max_decoded_pixels: 40_000_000,
            max_page_bytes: 64 * 1024 * 1024,
            resize_filter: FilterType::Triangle,
            offscreen_page_limit: 1,
            shutdown_grace: Duration::from_millis(500),
        }
    }
}

impl LoaderConfig {
    /// 按屏幕尺寸构建配置，其余参数取默认值。
    ///
    /// # 示例
    /// ```rust
    /// use comic_pager::page_loader::LoaderConfig;
    ///
    /// let config = LoaderConfig::for_display(1080, 2340);
    /// assert_eq!(config.target_size, 4680);
    /// ```
    pub fn for_display(width: u32, height: u32) -> Self {
        Self {
            target_size: target_size_for_display(width, height),
            ..Self::default()
        }
    }

    /// 覆盖内存缓存预算。
    pub fn with_memory_cache_bytes(mut self, bytes: usize) -> Self {
        self.memory_cache_bytes = bytes;
        self
    }

    /// 覆盖目标尺寸（主要用于测试与非屏幕场景）。
    pub fn with_target_size(mut self, target_size: u32) -> Self {
        self.target_size = target_size;
        self
    }
}

/// 屏幕长边 × 2。
pub fn target_size_for_display(width: u32, height: u32) -> u32 {
    width.max(height).saturating_mul(DISPLAY_SIZE_MARGIN)
}

/// 按可用内存的百分比计算缓存预算，百分比超过 100 时按 100 处理。
pub fn memory_cache_budget(available_bytes: u64, percent: u8) -> usize {
    let percent = u64::from(percent.min(100));
    let budget = available_bytes / 100 * percent + available_bytes % 100 * percent / 100;
    usize::try_from(budget).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_size_doubles_longest_edge() {
        assert_eq!(target_size_for_display(1080, 1920), 3840);
        assert_eq!(target_size_for_display(2560, 1600), 5120);
        assert_eq!(target_size_for_display(0, 0), 0);
    }

    #[test]
    fn target_size_saturates_instead_of_overflowing() {
        assert_eq!(target_size_for_display(u32::MAX, 1), u32::MAX);
    }

    #[test]
    fn cache_budget_is_fraction_of_available_memory() {
        assert_eq!(memory_cache_budget(1_000, DEFAULT_CACHE_PERCENT), 100);
        assert_eq!(memory_cache_budget(512 * 1024 * 1024, 10), 53_687_091);
        assert_eq!(memory_cache_budget(1_000, 250), 1_000);
        assert_eq!(memory_cache_budget(0, 10), 0);
    }

    #[test]
    fn for_display_keeps_other_defaults() {
        let config = LoaderConfig::for_display(800, 600);
        let defaults = LoaderConfig::default();

        assert_eq!(config.target_size, 1600);
        assert_eq!(config.memory_cache_bytes, defaults.memory_cache_bytes);
        assert_eq!(config.max_parallel_decodes, defaults.max_parallel_decodes);
        assert_eq!(config.offscreen_page_limit, 1);
    }
}
