//! # 漫画页面渲染 — 命令行入口
//!
//! 打开一个图片目录作为漫画，经完整的加载管线渲染一页，
//! 可选地把结果保存为 PNG，并以 JSON 打印解码与缓存统计。
//!
//! ```text
//! comic-pager <dir> [page] [--display WxH] [--memory-mb N]
//!             [--mode fill|fit|width] [--settings file.json] [--out file.png]
//! ```

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use image::ImageFormat;
use serde::Serialize;

use comic_pager::error::AppError;
use comic_pager::page_loader::{DEFAULT_CACHE_PERCENT, LoaderConfig, memory_cache_budget};
use comic_pager::page_source::DirectoryPageSource;
use comic_pager::pipeline::CacheStats;
use comic_pager::reader::{MenuAction, ReaderSession};
use comic_pager::settings::SettingsStore;

use cli::CliArgs;

#[derive(Debug, Serialize)]
struct RenderReport {
    page: usize,
    page_count: usize,
    key: String,
    source_size: (u32, u32),
    decoded_size: (u32, u32),
    sample_size: u32,
    loaded_from: String,
    view_mode: String,
    cache: CacheStats,
    output: Option<PathBuf>,
}

fn run(args: CliArgs) -> Result<RenderReport, AppError> {
    let mut config = LoaderConfig::for_display(args.display.0, args.display.1);
    if let Some(memory_mb) = args.memory_mb {
        config = config.with_memory_cache_bytes(memory_cache_budget(
            memory_mb.saturating_mul(1024 * 1024),
            DEFAULT_CACHE_PERCENT,
        ));
    }

    let settings = Arc::new(match &args.settings {
        Some(path) => SettingsStore::open(path),
        None => SettingsStore::in_memory(),
    });

    let source = DirectoryPageSource::open(&args.dir)?;
    let mut session = ReaderSession::open(Arc::new(source), &config, settings, args.page)?;
    if let Some(mode) = args.mode {
        session.on_menu_item(MenuAction::from(mode));
    }

    let key = session.key_for(session.current_page());
    let delivery = session.pipeline().load_blocking(&key)?;
    let page = &delivery.page;

    if let Some(out) = &args.out {
        page.image
            .save_with_format(out, ImageFormat::Png)
            .map_err(|e| AppError::Encode(format!("保存 '{}' 失败: {}", out.display(), e)))?;
        log::info!("💾 已保存到 {}", out.display());
    }

    let report = RenderReport {
        page: session.current_page() + 1,
        page_count: session.page_count(),
        key: key.to_string(),
        source_size: page.source_size,
        decoded_size: page.dimensions(),
        sample_size: page.sample_size,
        loaded_from: format!("{:?}", delivery.loaded_from),
        view_mode: format!("{:?}", session.view_mode()),
        cache: session.pipeline().cache_stats(),
        output: args.out.clone(),
    };

    session.close();
    Ok(report)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CliArgs::parse();

    match run(args) {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => log::error!("输出报告失败: {}", e),
        },
        Err(err) => {
            log::error!("❌ 渲染失败: {}", err);
            std::process::exit(1);
        }
    }
}
