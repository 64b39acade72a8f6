/// Root font size the bottom threshold is expressed against.
const BASE_FONT_PX: f64 = 16.0;

/// Layout of a scrollable list as reported by the rendering collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    /// Full content height.
    pub scroll_height: f64,
    /// Current scroll offset from the top.
    pub scroll_top: f64,
    /// Visible height of the scroll area.
    pub offset_height: f64,
    /// Active root font size; scales the bottom threshold.
    pub font_size_px: f64,
}

impl ScrollMetrics {
    fn font_scale(&self) -> f64 {
        if self.font_size_px > 0.0 {
            self.font_size_px / BASE_FONT_PX
        } else {
            1.0
        }
    }
}

/// Whether the visible region is within `bottom_space` (at the base font
/// size) of the end of the list.
///
/// An invisible list (zero content height) is never close to the bottom.
pub fn close_to_bottom(metrics: &ScrollMetrics, bottom_space: f64) -> bool {
    if metrics.scroll_height == 0.0 {
        return false;
    }
    let remaining = metrics.scroll_height - metrics.scroll_top - metrics.offset_height;
    remaining < bottom_space * metrics.font_scale()
}

/// Direction of the navigation step that produced the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Target element geometry relative to the scroll area's visible top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetBox {
    pub offset: f64,
    pub height: f64,
}

/// New scroll offset that brings `target` into view, or `None` if it is
/// already fully visible inside the `padding` margins.
///
/// The near edge is moved to the padding boundary. When the target is taller
/// than the visible area both edges overflow; `direction` picks which one wins.
pub fn scroll_into_view(
    target: TargetBox,
    scroll_top: f64,
    viewport_height: f64,
    padding: f64,
    direction: Direction,
) -> Option<f64> {
    let top_hidden = target.offset < padding;
    let bottom_hidden = target.offset + target.height > viewport_height - padding;
    if !top_hidden && !bottom_hidden {
        return None;
    }

    let absolute = target.offset + scroll_top;
    let reveal_top = absolute - padding;
    let reveal_bottom = absolute - viewport_height + target.height + padding;

    let new_top = match (top_hidden, bottom_hidden) {
        (true, false) => reveal_top,
        (false, true) => reveal_bottom,
        _ => match direction {
            Direction::Up => reveal_top,
            Direction::Down => reveal_bottom,
        },
    };
    Some(new_top.max(0.0).round())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(scroll_height: f64, scroll_top: f64, offset_height: f64) -> ScrollMetrics {
        ScrollMetrics {
            scroll_height,
            scroll_top,
            offset_height,
            font_size_px: 16.0,
        }
    }

    #[test]
    fn test_close_to_bottom_threshold() {
        // 1000 - 300 - 640 = 60 < 70
        assert!(close_to_bottom(&metrics(1000.0, 300.0, 640.0), 70.0));
        // 1000 - 200 - 640 = 160
        assert!(!close_to_bottom(&metrics(1000.0, 200.0, 640.0), 70.0));
    }

    #[test]
    fn test_close_to_bottom_scales_with_font() {
        let mut m = metrics(1000.0, 220.0, 680.0); // 100px remaining
        assert!(!close_to_bottom(&m, 70.0));
        m.font_size_px = 24.0; // threshold 105
        assert!(close_to_bottom(&m, 70.0));
    }

    #[test]
    fn test_invisible_list_never_close() {
        assert!(!close_to_bottom(&metrics(0.0, 0.0, 0.0), 70.0));
    }

    #[test]
    fn test_short_list_is_close() {
        // Content shorter than the viewport: negative remaining space.
        assert!(close_to_bottom(&metrics(300.0, 0.0, 800.0), 70.0));
    }

    #[test]
    fn test_visible_target_no_scroll() {
        let target = TargetBox {
            offset: 50.0,
            height: 40.0,
        };
        assert_eq!(scroll_into_view(target, 100.0, 400.0, 10.0, Direction::Down), None);
    }

    #[test]
    fn test_target_below_reveals_bottom_edge() {
        let target = TargetBox {
            offset: 380.0,
            height: 40.0,
        };
        // absolute 480; 480 - 400 + 40 + 10 = 130
        assert_eq!(
            scroll_into_view(target, 100.0, 400.0, 10.0, Direction::Down),
            Some(130.0)
        );
    }

    #[test]
    fn test_target_above_reveals_top_edge() {
        let target = TargetBox {
            offset: -30.0,
            height: 40.0,
        };
        // absolute 70; 70 - 10 = 60
        assert_eq!(
            scroll_into_view(target, 100.0, 400.0, 10.0, Direction::Up),
            Some(60.0)
        );
    }

    #[test]
    fn test_padding_edge_is_inclusive() {
        let target = TargetBox {
            offset: 10.0,
            height: 380.0,
        };
        assert_eq!(scroll_into_view(target, 0.0, 400.0, 10.0, Direction::Down), None);
    }

    #[test]
    fn test_tall_target_follows_direction() {
        let target = TargetBox {
            offset: -20.0,
            height: 600.0,
        };
        let up = scroll_into_view(target, 200.0, 400.0, 10.0, Direction::Up);
        let down = scroll_into_view(target, 200.0, 400.0, 10.0, Direction::Down);
        assert_eq!(up, Some(170.0));
        assert_eq!(down, Some(390.0));
    }

    #[test]
    fn test_never_scrolls_negative() {
        let target = TargetBox {
            offset: 2.0,
            height: 20.0,
        };
        assert_eq!(
            scroll_into_view(target, 0.0, 400.0, 10.0, Direction::Up),
            Some(0.0)
        );
    }
}
