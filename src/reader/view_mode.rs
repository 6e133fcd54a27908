//! 页面显示模式与布局计算。

/// 页面显示模式。整数值用于持久化，顺序不可变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageViewMode {
    /// 等比缩放铺满视口，超出部分裁掉。
    AspectFill,
    /// 等比缩放完整显示在视口内。
    #[default]
    AspectFit,
    /// 宽度铺满，顶部对齐，纵向可滚动。
    FitWidth,
}

impl PageViewMode {
    pub fn ordinal(self) -> i64 {
        match self {
            Self::AspectFill => 0,
            Self::AspectFit => 1,
            Self::FitWidth => 2,
        }
    }

    pub fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::AspectFill),
            1 => Some(Self::AspectFit),
            2 => Some(Self::FitWidth),
            _ => None,
        }
    }

    /// 计算 `image` 尺寸的位图在 `viewport` 中的缩放与偏移。
    ///
    /// 任一尺寸为 0 时返回 1.0 倍、零偏移。
    pub fn layout(self, image: (u32, u32), viewport: (u32, u32)) -> PageLayout {
        let (iw, ih) = image;
        let (vw, vh) = viewport;
        if iw == 0 || ih == 0 || vw == 0 || vh == 0 {
            return PageLayout {
                scale: 1.0,
                offset_x: 0.0,
                offset_y: 0.0,
                width: iw as f64,
                height: ih as f64,
            };
        }

        let scale_x = vw as f64 / iw as f64;
        let scale_y = vh as f64 / ih as f64;
        let scale = match self {
            Self::AspectFill => scale_x.max(scale_y),
            Self::AspectFit => scale_x.min(scale_y),
            Self::FitWidth => scale_x,
        };

        let width = iw as f64 * scale;
        let height = ih as f64 * scale;
        let offset_x = (vw as f64 - width) / 2.0;
        let offset_y = match self {
            Self::FitWidth => 0.0,
            _ => (vh as f64 - height) / 2.0,
        };

        PageLayout {
            scale,
            offset_x,
            offset_y,
            width,
            height,
        }
    }
}

/// 布局结果（视口坐标，单位像素）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
}

/// 阅读器菜单项。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    ViewModeAspectFill,
    ViewModeAspectFit,
    ViewModeFitWidth,
}

impl MenuAction {
    pub fn view_mode(self) -> PageViewMode {
        match self {
            Self::ViewModeAspectFill => PageViewMode::AspectFill,
            Self::ViewModeAspectFit => PageViewMode::AspectFit,
            Self::ViewModeFitWidth => PageViewMode::FitWidth,
        }
    }
}
