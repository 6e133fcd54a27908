//! # 请求键模块
//!
//! 请求键是形如 URI 的字符串，既是内存缓存的键，也是处理器路由的依据：
//!
//! ```text
//! localcomic://#12      本地漫画第 12 页（0 起始）
//! file:///tmp/a.jpg     本地图片文件
//! ```
//!
//! 同一页码生成的键逐字节相同，不同页码的键一定不同。

use std::fmt;
use std::path::{Path, PathBuf};

use super::PageError;

/// 本地漫画页面请求的固定 scheme。
pub const LOCAL_COMIC_SCHEME: &str = "localcomic";
/// 本地文件请求的 scheme。
pub const FILE_SCHEME: &str = "file";

/// 缓存与路由使用的请求键。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey(String);

impl RequestKey {
    /// 构建本地漫画页面键：scheme 固定，authority 为空，片段为十进制页码。
    pub fn local_page(index: usize) -> Self {
        Self(format!("{}://#{}", LOCAL_COMIC_SCHEME, index))
    }

    /// 构建本地文件键。
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self(format!("{}://{}", FILE_SCHEME, path.as_ref().display()))
    }

    /// 包装外部传入的原始字符串，不做校验。
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `:` 之前的部分；没有 `:` 时返回 `None`。
    pub fn scheme(&self) -> Option<&str> {
        let (scheme, _) = self.0.split_once(':')?;
        if scheme.is_empty() {
            None
        } else {
            Some(scheme)
        }
    }

    /// 第一个 `#` 之后的部分。
    pub fn fragment(&self) -> Option<&str> {
        self.0.split_once('#').map(|(_, fragment)| fragment)
    }

    /// 从片段中解析页码。
    ///
    /// 片段必须是非空的纯十进制数字，`+3`、` 3`、`-1` 都视为格式错误。
    pub fn page_index(&self) -> Result<usize, PageError> {
        let fragment = self
            .fragment()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| PageError::MalformedKey(format!("缺少页码片段：{}", self.0)))?;

        if !fragment.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PageError::MalformedKey(format!("页码片段不是十进制数字：{}", self.0)));
        }

        fragment
            .parse::<usize>()
            .map_err(|e| PageError::MalformedKey(format!("页码解析失败：{}（{}）", self.0, e)))
    }

    /// 解析 `file://` 键中的路径。
    pub fn file_path(&self) -> Result<PathBuf, PageError> {
        let prefix = format!("{}://", FILE_SCHEME);
        match self.0.strip_prefix(&prefix) {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Err(PageError::MalformedKey(format!("不是文件请求键：{}", self.0))),
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
