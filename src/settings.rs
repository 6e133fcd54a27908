//! # 设置存储
//!
//! 阅读器只有一项持久化偏好（页面显示模式），以整数形式保存在 JSON 文件中。
//! 文件缺失、不可读或内容无法解析时按空设置处理，不影响打开漫画。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 页面显示模式的设置键。
pub const SETTINGS_PAGE_VIEW_MODE: &str = "page_view_mode";

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    preferences: BTreeMap<String, i64>,
}

/// 整数偏好存储。`path` 为空时只保存在内存中。
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    file: Mutex<SettingsFile>,
}

impl SettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = load_settings_file(&path);
        Self {
            path: Some(path),
            file: Mutex::new(file),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            file: Mutex::new(SettingsFile::default()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.file
            .lock()
            .ok()
            .and_then(|file| file.preferences.get(key).copied())
            .unwrap_or(default)
    }

    /// 写入偏好并立即落盘。
    pub fn put_int(&self, key: &str, value: i64) -> Result<(), AppError> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| AppError::Settings("设置锁已中毒".to_string()))?;
        file.preferences.insert(key.to_string(), value);

        let Some(path) = &self.path else {
            return Ok(());
        };

        let content = serde_json::to_string_pretty(&*file)
            .map_err(|e| AppError::Settings(format!("序列化设置失败: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}

fn load_settings_file(path: &Path) -> SettingsFile {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            if path.exists() {
                log::warn!("⚠️ 读取设置文件失败，使用默认设置: {}", e);
            }
            return SettingsFile::default();
        }
    };

    serde_json::from_str(&content).unwrap_or_else(|e| {
        log::warn!("⚠️ 解析设置文件失败，使用默认设置: {}", e);
        SettingsFile::default()
    })
}
