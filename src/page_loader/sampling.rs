//! 采样系数计算。
//!
//! 给定探测到的宽高与目标长边 `t`，求最小的 2 的幂 `s`，使
//! `ceil(w / s) <= t` 且 `ceil(h / s) <= t`。整数 `t` 下该条件与 `w / s <= t`
//! 等价，同时保证实际输出尺寸（向上取整）不越界。

/// 采样系数上限，避免 `u32` 溢出。
const MAX_SAMPLE_SIZE: u64 = 1 << 31;

/// 计算解码采样系数。
///
/// - 图片已小于目标尺寸时返回 1（从不放大）。
/// - `target <= 0` 视为“不限制”，返回 1。
///
/// # 示例
/// ```rust
/// use comic_pager::page_loader::calculate_sample_size;
///
/// assert_eq!(calculate_sample_size(3000, 2000, 1080), 4);
/// assert_eq!(calculate_sample_size(800, 600, 1080), 1);
/// assert_eq!(calculate_sample_size(3000, 2000, 0), 1);
/// ```
pub fn calculate_sample_size(width: u32, height: u32, target: i64) -> u32 {
    if target <= 0 {
        return 1;
    }

    let target = target as u64;
    let longest = u64::from(width.max(height));
    let mut sample = 1u64;

    while sample < MAX_SAMPLE_SIZE && longest.div_ceil(sample) > target {
        sample *= 2;
    }

    sample as u32
}

/// 按采样系数计算输出尺寸（向上取整，最小为 1）。
pub fn sampled_dimensions(width: u32, height: u32, sample: u32) -> (u32, u32) {
    let sample = sample.max(1);
    (width.div_ceil(sample).max(1), height.div_ceil(sample).max(1))
}
