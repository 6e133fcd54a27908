//! # 请求处理器模块
//!
//! ## 设计思路
//!
//! 图片管线按请求键的 scheme 把请求路由给处理器。来源种类在编译期固定，
//! 因此处理器是一个封闭枚举 `RequestHandler`，而不是开放的 trait 对象：
//!
//! - `LocalComic`：`localcomic://#N`，从 `PageSource` 读取第 N 页
//! - `File`：`file://<path>`，读取本地图片文件（封面、单图）
//!
//! 两者共用 `BoundedDecoder` 完成两阶段有界解码。
//!
//! ## 实现思路
//!
//! `load` 只做：解析键 → 校验页码 → 委托解码器（两次打开流）→ 包装结果。
//! 处理器不持有任何位图，也不持有锁，可被多个工作线程同时调用。

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use super::decode::BoundedDecoder;
use super::{
    DecodedPage, FILE_SCHEME, LOCAL_COMIC_SCHEME, LoadedFrom, LoaderConfig, PageError, RequestKey,
};
use crate::page_source::{PageSource, PageStream};

/// 本地漫画页面处理器。
///
/// 与 `PageSource` 共享所有权，但不负责它的生命周期（`dispose` 由会话调用）。
#[derive(Clone)]
pub struct LocalComicHandler {
    source: Arc<dyn PageSource>,
    decoder: BoundedDecoder,
}

impl LocalComicHandler {
    pub fn new(source: Arc<dyn PageSource>, config: &LoaderConfig) -> Self {
        Self {
            source,
            decoder: BoundedDecoder::new(config),
        }
    }

    /// 请求键的 scheme 是否为 `localcomic`。
    pub fn can_handle(&self, key: &RequestKey) -> bool {
        key.scheme() == Some(LOCAL_COMIC_SCHEME)
    }

    /// 第 `index` 页的请求键。纯函数，常数时间。
    pub fn key_for(&self, index: usize) -> RequestKey {
        RequestKey::local_page(index)
    }

    pub fn page_count(&self) -> usize {
        self.source.page_count()
    }

    pub fn target_size(&self) -> u32 {
        self.decoder.target_size()
    }

    /// 加载并有界解码一页。
    ///
    /// 页码越界时直接失败，不会打开任何流。
    pub fn load(&self, key: &RequestKey) -> Result<DecodedPage, PageError> {
        let index = key.page_index()?;
        let count = self.source.page_count();
        if index >= count {
            return Err(PageError::PageIndexOutOfRange { index, count });
        }

        let label = format!("第 {} 页", index);
        let outcome = self
            .decoder
            .decode(|| self.source.open_page(index), &label)?;

        Ok(DecodedPage {
            key: key.clone(),
            image: outcome.image,
            source_size: outcome.source_size,
            sample_size: outcome.sample_size,
            loaded_from: LoadedFrom::Disk,
        })
    }
}

/// 本地图片文件处理器。
#[derive(Debug, Clone)]
pub struct FileHandler {
    decoder: BoundedDecoder,
}

impl FileHandler {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            decoder: BoundedDecoder::new(config),
        }
    }

    pub fn can_handle(&self, key: &RequestKey) -> bool {
        key.scheme() == Some(FILE_SCHEME)
    }

    pub fn load(&self, key: &RequestKey) -> Result<DecodedPage, PageError> {
        let path = key.file_path()?;
        let label = path.display().to_string();

        let outcome = self.decoder.decode(
            || {
                let file = File::open(&path).map_err(|e| {
                    PageError::Decode(format!("无法打开图片文件 '{}'：{}", path.display(), e))
                })?;
                Ok(Box::new(BufReader::new(file)) as PageStream)
            },
            &label,
        )?;

        Ok(DecodedPage {
            key: key.clone(),
            image: outcome.image,
            source_size: outcome.source_size,
            sample_size: outcome.sample_size,
            loaded_from: LoadedFrom::Disk,
        })
    }
}

/// 注册到图片管线的处理器。
#[derive(Clone)]
pub enum RequestHandler {
    LocalComic(LocalComicHandler),
    File(FileHandler),
}

impl RequestHandler {
    pub fn can_handle(&self, key: &RequestKey) -> bool {
        match self {
            Self::LocalComic(handler) => handler.can_handle(key),
            Self::File(handler) => handler.can_handle(key),
        }
    }

    pub fn load(&self, key: &RequestKey) -> Result<DecodedPage, PageError> {
        match self {
            Self::LocalComic(handler) => handler.load(key),
            Self::File(handler) => handler.load(key),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LocalComic(_) => "local-comic",
            Self::File(_) => "file",
        }
    }
}

impl From<LocalComicHandler> for RequestHandler {
    fn from(handler: LocalComicHandler) -> Self {
        Self::LocalComic(handler)
    }
}

impl From<FileHandler> for RequestHandler {
    fn from(handler: FileHandler) -> Self {
        Self::File(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    struct FixedPages {
        pages: Vec<Vec<u8>>,
        opens: AtomicUsize,
    }

    impl PageSource for FixedPages {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn open_page(&self, index: usize) -> Result<PageStream, PageError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let page = self.pages.get(index).ok_or(PageError::PageIndexOutOfRange {
                index,
                count: self.pages.len(),
            })?;
            Ok(Box::new(Cursor::new(page.clone())))
        }

        fn dispose(&self) -> Result<(), PageError> {
            Ok(())
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    fn handler_with(pages: Vec<Vec<u8>>, target: u32) -> (LocalComicHandler, Arc<FixedPages>) {
        let source = Arc::new(FixedPages {
            pages,
            opens: AtomicUsize::new(0),
        });
        let config = LoaderConfig::default().with_target_size(target);
        (LocalComicHandler::new(source.clone(), &config), source)
    }

    #[test]
    fn routes_only_local_comic_scheme() {
        let (handler, _) = handler_with(Vec::new(), 100);

        assert!(handler.can_handle(&handler.key_for(0)));
        assert!(!handler.can_handle(&RequestKey::file("/tmp/a.png")));
        assert!(!handler.can_handle(&RequestKey::from_raw("https://example.com/1.jpg")));
        assert!(!handler.can_handle(&RequestKey::from_raw("localcomic")));
    }

    #[test]
    fn loads_page_with_disk_provenance() {
        let (handler, source) = handler_with(vec![png_bytes(10, 10), png_bytes(200, 100)], 50);

        let page = handler.load(&handler.key_for(1)).expect("load should succeed");

        assert_eq!(page.dimensions(), (50, 25));
        assert_eq!(page.sample_size, 4);
        assert_eq!(page.source_size, (200, 100));
        assert_eq!(page.loaded_from, LoadedFrom::Disk);
        assert_eq!(page.key, RequestKey::local_page(1));
        assert_eq!(source.opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn out_of_range_never_opens_a_stream() {
        let (handler, source) = handler_with(vec![png_bytes(10, 10)], 50);

        let result = handler.load(&handler.key_for(5));

        assert_eq!(result.err(), Some(PageError::PageIndexOutOfRange { index: 5, count: 1 }));
        assert_eq!(source.opens.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn malformed_key_is_rejected_before_io() {
        let (handler, source) = handler_with(vec![png_bytes(10, 10)], 50);

        let result = handler.load(&RequestKey::from_raw("localcomic://#first"));

        assert!(matches!(result, Err(PageError::MalformedKey(_))));
        assert_eq!(source.opens.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn file_handler_decodes_from_path() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock error")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("comic-pager-file-handler-{nanos}.png"));
        std::fs::write(&path, png_bytes(120, 60)).expect("write fixture");

        let handler = RequestHandler::from(FileHandler::new(&LoaderConfig::default().with_target_size(60)));
        let key = RequestKey::file(&path);

        assert!(handler.can_handle(&key));
        let page = handler.load(&key).expect("load should succeed");
        assert_eq!(page.dimensions(), (60, 30));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn file_handler_reports_missing_file_as_decode_error() {
        let handler = FileHandler::new(&LoaderConfig::default());
        let result = handler.load(&RequestKey::file("/definitely/missing/page.png"));
        assert!(matches!(result, Err(PageError::Decode(_))));
    }
}
