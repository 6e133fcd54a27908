//! 命令行参数解析

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use comic_pager::reader::MenuAction;

/// 经完整加载管线渲染漫画目录中的一页
#[derive(Parser, Debug)]
#[command(name = "comic-pager", version, about = "经完整加载管线渲染漫画目录中的一页")]
pub struct CliArgs {
    /// 漫画目录（每个图片文件是一页）
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// 要渲染的页码（从 1 开始）
    #[arg(value_name = "PAGE", default_value_t = 1)]
    pub page: usize,

    /// 屏幕尺寸，用于推导目标解码尺寸
    #[arg(long, value_name = "WxH", value_parser = parse_display, default_value = "1920x1080")]
    pub display: (u32, u32),

    /// 可用内存（MB），缓存预算取其 10%
    #[arg(long, value_name = "N")]
    pub memory_mb: Option<u64>,

    /// 页面显示模式
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// 设置文件路径（不指定则只保存在内存中）
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// 渲染结果输出为 PNG
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Fill,
    Fit,
    Width,
}

impl From<ModeArg> for MenuAction {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Fill => MenuAction::ViewModeAspectFill,
            ModeArg::Fit => MenuAction::ViewModeAspectFit,
            ModeArg::Width => MenuAction::ViewModeFitWidth,
        }
    }
}

fn parse_display(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("无效的显示尺寸 '{}'，应为 WxH", value))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|_| format!("无效的显示尺寸 '{}'", value))
    };
    Ok((parse(width)?, parse(height)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positional_and_flags() {
        let args = CliArgs::try_parse_from([
            "comic-pager",
            "comics/a",
            "4",
            "--display",
            "1080x1920",
            "--mode",
            "width",
        ])
        .expect("args should parse");

        assert_eq!(args.dir, PathBuf::from("comics/a"));
        assert_eq!(args.page, 4);
        assert_eq!(args.display, (1080, 1920));
        assert_eq!(args.mode.map(MenuAction::from), Some(MenuAction::ViewModeFitWidth));
    }

    #[test]
    fn defaults_apply() {
        let args = CliArgs::try_parse_from(["comic-pager", "comics/a"]).expect("args should parse");
        assert_eq!(args.page, 1);
        assert_eq!(args.display, (1920, 1080));
        assert!(args.out.is_none());
        assert!(args.mode.is_none());
    }

    #[test]
    fn rejects_missing_dir_and_bad_values() {
        assert!(CliArgs::try_parse_from(["comic-pager"]).is_err());
        assert!(CliArgs::try_parse_from(["comic-pager", "d", "--display", "big"]).is_err());
        assert!(CliArgs::try_parse_from(["comic-pager", "d", "--mode", "stretch"]).is_err());
        assert!(CliArgs::try_parse_from(["comic-pager", "d", "x"]).is_err());
    }
}
