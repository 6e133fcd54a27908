//! 集成测试共用的页面来源替身：统计打开、关闭、释放次数，可注入延迟与故障。

#![allow(dead_code)]

use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use comic_pager::page_loader::PageError;
use comic_pager::page_source::{PageSource, PageStream};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb};

pub struct CountingPages {
    pages: Vec<Vec<u8>>,
    broken_page: Option<(usize, Vec<u8>)>,
    pub broken: AtomicBool,
    pub opens: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
    pub disposals: AtomicUsize,
    pub fail_dispose: bool,
    pub open_delay: Duration,
}

impl CountingPages {
    pub fn new(pages: Vec<Vec<u8>>) -> Self {
        Self {
            pages,
            broken_page: None,
            broken: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            disposals: AtomicUsize::new(0),
            fail_dispose: false,
            open_delay: Duration::ZERO,
        }
    }

    pub fn repeated(page: Vec<u8>, count: usize) -> Self {
        Self::new(vec![page; count])
    }

    /// `index` 页在 `broken` 为真时返回 `bytes`。
    pub fn with_broken_page(mut self, index: usize, bytes: Vec<u8>) -> Self {
        self.broken_page = Some((index, bytes));
        self.broken.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub fn with_failing_dispose(mut self) -> Self {
        self.fail_dispose = true;
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn disposals(&self) -> usize {
        self.disposals.load(Ordering::SeqCst)
    }
}

impl PageSource for CountingPages {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn open_page(&self, index: usize) -> Result<PageStream, PageError> {
        if self.disposals() > 0 {
            return Err(PageError::SourceDisposed);
        }
        let page = self.pages.get(index).ok_or(PageError::PageIndexOutOfRange {
            index,
            count: self.pages.len(),
        })?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.open_delay.is_zero() {
            std::thread::sleep(self.open_delay);
        }

        let bytes = match &self.broken_page {
            Some((broken_index, bytes)) if *broken_index == index && self.broken.load(Ordering::SeqCst) => {
                bytes.clone()
            }
            _ => page.clone(),
        };

        Ok(Box::new(CountingStream {
            inner: Cursor::new(bytes),
            closes: Arc::clone(&self.closes),
        }))
    }

    fn dispose(&self) -> Result<(), PageError> {
        self.disposals.fetch_add(1, Ordering::SeqCst);
        if self.fail_dispose {
            return Err(PageError::Decode("archive handle already gone".to_string()));
        }
        Ok(())
    }
}

struct CountingStream {
    inner: Cursor<Vec<u8>>,
    closes: Arc<AtomicUsize>,
}

impl Read for CountingStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Drop for CountingStream {
    fn drop(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| Rgb([(x % 251) as u8, (y % 241) as u8, 90]));
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut cursor, format)
        .expect("failed to encode fixture image");
    cursor.into_inner()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

pub fn gray_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| Luma([((x / 64 + y / 64) % 2 * 255) as u8]));
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("failed to encode fixture image");
    cursor.into_inner()
}

/// 轮询直到条件成立，超时则失败。
pub fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("timed out waiting for {what}");
}
