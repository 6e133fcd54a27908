//! 目录页面来源：目录下每个图片文件是一页，按自然顺序排序
//! （`page2.jpg` 排在 `page10.jpg` 之前）。

use std::cmp::Ordering as CmpOrdering;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{PageSource, PageStream};
use crate::page_loader::PageError;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// 以目录为档案的页面来源。
///
/// 每次 `open_page` 都新打开一个文件句柄，天然支持并发独立读取。
#[derive(Debug)]
pub struct DirectoryPageSource {
    root: PathBuf,
    pages: Vec<PathBuf>,
    disposed: AtomicBool,
}

impl DirectoryPageSource {
    /// 扫描目录中的图片文件（不递归）。
    pub fn open(root: impl AsRef<Path>) -> Result<Self, PageError> {
        let root = root.as_ref().to_path_buf();
        let entries = fs::read_dir(&root)
            .map_err(|e| PageError::SourceUnavailable(format!("无法读取漫画目录 '{}'：{}", root.display(), e)))?;

        let mut pages: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_image_file(path))
            .collect();
        pages.sort_by(|a, b| natural_cmp(&file_name_lower(a), &file_name_lower(b)));

        log::info!("📁 已打开漫画目录 - 路径: {} 页数: {}", root.display(), pages.len());

        Ok(Self {
            root,
            pages,
            disposed: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 第 `index` 页对应的文件路径。
    pub fn page_path(&self, index: usize) -> Option<&Path> {
        self.pages.get(index).map(PathBuf::as_path)
    }
}

impl PageSource for DirectoryPageSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn open_page(&self, index: usize) -> Result<PageStream, PageError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(PageError::SourceDisposed);
        }

        let path = self.pages.get(index).ok_or(PageError::PageIndexOutOfRange {
            index,
            count: self.pages.len(),
        })?;

        let file = File::open(path)
            .map_err(|e| PageError::Decode(format!("无法打开页面文件 '{}'：{}", path.display(), e)))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn dispose(&self) -> Result<(), PageError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Err(PageError::SourceDisposed);
        }
        log::debug!("🧹 已释放漫画目录：{}", self.root.display());
        Ok(())
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// 自然排序：连续数字按数值比较，其余字符逐个比较。
fn natural_cmp(a: &str, b: &str) -> CmpOrdering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return CmpOrdering::Equal,
            (None, Some(_)) => return CmpOrdering::Less,
            (Some(_), None) => return CmpOrdering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let left_digits = take_digits(&mut left);
                let right_digits = take_digits(&mut right);
                let left_trimmed = left_digits.trim_start_matches('0');
                let right_trimmed = right_digits.trim_start_matches('0');

                let ordering = left_trimmed
                    .len()
                    .cmp(&right_trimmed.len())
                    .then_with(|| left_trimmed.cmp(right_trimmed))
                    .then_with(|| left_digits.len().cmp(&right_digits.len()));
                if ordering != CmpOrdering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                if l != r {
                    return l.cmp(&r);
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}
