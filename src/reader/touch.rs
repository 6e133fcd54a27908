//! 点击翻页区域。

/// 点击页面后的动作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapAction {
    EnterFullscreen,
    PreviousPage,
    NextPage,
    ExitFullscreen,
}

/// 按点击的横坐标分类。
///
/// 非全屏时任何点击都进入全屏；全屏时左三分之一上一页、右三分之一下一页、
/// 中间退出全屏。
pub fn classify_tap(x: f32, width: f32, fullscreen: bool) -> TapAction {
    if !fullscreen {
        return TapAction::EnterFullscreen;
    }

    if x < width / 3.0 {
        TapAction::PreviousPage
    } else if x > width / 3.0 * 2.0 {
        TapAction::NextPage
    } else {
        TapAction::ExitFullscreen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_tap_enters_fullscreen_when_windowed() {
        assert_eq!(classify_tap(1.0, 900.0, false), TapAction::EnterFullscreen);
        assert_eq!(classify_tap(899.0, 900.0, false), TapAction::EnterFullscreen);
    }

    #[test]
    fn thirds_map_to_page_turns() {
        assert_eq!(classify_tap(100.0, 900.0, true), TapAction::PreviousPage);
        assert_eq!(classify_tap(450.0, 900.0, true), TapAction::ExitFullscreen);
        assert_eq!(classify_tap(800.0, 900.0, true), TapAction::NextPage);
        // 边界点属于中间区域。
        assert_eq!(classify_tap(300.0, 900.0, true), TapAction::ExitFullscreen);
        assert_eq!(classify_tap(600.0, 900.0, true), TapAction::ExitFullscreen);
    }
}
