use crate::events::Rect;

/// Допуски сравнения границ окна и экрана
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tolerance {
    pub position: i64,
    pub size: i64,
}

// Смещённое окружение (панели, доки) > масштабированное > стандартное
const OFFSET_TOLERANCE: Tolerance = Tolerance { position: 100, size: 20 };
const SCALED_TOLERANCE: Tolerance = Tolerance { position: 150, size: 50 };
const STANDARD_TOLERANCE: Tolerance = Tolerance { position: 20, size: 20 };

const OFFSET_THRESHOLD: i64 = 50;

/// Подобрать допуски по тому, как оконный менеджер сообщает границы
pub fn tolerance_for(window: &Rect, screen: &Rect) -> Tolerance {
    let dx = (window.x as i64 - screen.x as i64).abs();
    let dy = (window.y as i64 - screen.y as i64).abs();
    if dx > OFFSET_THRESHOLD || dy > OFFSET_THRESHOLD {
        return OFFSET_TOLERANCE;
    }

    // Окно больше экрана на 10%: масштабирование или несколько мониторов
    let oversized_w = window.width as u64 * 10 > screen.width as u64 * 11;
    let oversized_h = window.height as u64 * 10 > screen.height as u64 * 11;
    if oversized_w || oversized_h {
        return SCALED_TOLERANCE;
    }

    STANDARD_TOLERANCE
}

pub fn is_fullscreen_like(window: &Rect, screen: &Rect) -> bool {
    if screen.width == 0 || screen.height == 0 {
        return false;
    }

    let tol = tolerance_for(window, screen);
    (window.x as i64 - screen.x as i64).abs() <= tol.position
        && (window.y as i64 - screen.y as i64).abs() <= tol.position
        && window.width as i64 >= screen.width as i64 - tol.size
        && window.height as i64 >= screen.height as i64 - tol.size
}

/// Хранит последнее состояние и сообщает только о переключениях
#[derive(Debug, Default)]
pub struct MaximizationMonitor {
    hidden: bool,
}

impl MaximizationMonitor {
    /// `Some(hidden)` только когда состояние сменилось
    pub fn observe(&mut self, fullscreen_like: bool) -> Option<bool> {
        if self.hidden == fullscreen_like {
            return None;
        }
        self.hidden = fullscreen_like;
        Some(fullscreen_like)
    }

    #[cfg(test)]
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: Rect = Rect::new(0, 0, 1920, 1080);

    #[test]
    fn test_exact_screen_bounds_are_fullscreen() {
        assert!(is_fullscreen_like(&SCREEN, &SCREEN));
    }

    #[test]
    fn test_half_screen_is_not_fullscreen() {
        assert!(!is_fullscreen_like(&Rect::new(0, 0, 960, 540), &SCREEN));
    }

    #[test]
    fn test_maximized_below_top_panel() {
        // Окно под панелью высотой 18px
        assert!(is_fullscreen_like(&Rect::new(0, 18, 1920, 1062), &SCREEN));
        assert!(!is_fullscreen_like(&Rect::new(0, 18, 1920, 1000), &SCREEN));
    }

    #[test]
    fn test_tolerance_bands_keep_relative_order() {
        let offset = tolerance_for(&Rect::new(60, 0, 1800, 1080), &SCREEN);
        let scaled = tolerance_for(&Rect::new(0, 0, 2200, 1080), &SCREEN);
        let standard = tolerance_for(&Rect::new(0, 0, 1920, 1080), &SCREEN);

        assert_eq!(offset, OFFSET_TOLERANCE);
        assert_eq!(scaled, SCALED_TOLERANCE);
        assert_eq!(standard, STANDARD_TOLERANCE);
        assert!(scaled.position > offset.position && offset.position > standard.position);
    }

    #[test]
    fn test_docked_window_with_offset_origin() {
        // Док слева 80px: позиционный допуск 100px
        assert!(is_fullscreen_like(&Rect::new(80, 0, 1910, 1080), &SCREEN));
        assert!(!is_fullscreen_like(&Rect::new(300, 0, 1620, 1080), &SCREEN));
    }

    #[test]
    fn test_secondary_screen_origin() {
        let screen = Rect::new(1920, 0, 2560, 1440);
        assert!(is_fullscreen_like(&Rect::new(1920, 0, 2560, 1440), &screen));
        assert!(!is_fullscreen_like(&Rect::new(0, 0, 1920, 1080), &screen));
    }

    #[test]
    fn test_monitor_reports_only_flips() {
        let mut monitor = MaximizationMonitor::default();
        assert_eq!(monitor.observe(false), None);
        assert_eq!(monitor.observe(true), Some(true));
        assert_eq!(monitor.observe(true), None);
        assert!(monitor.is_hidden());
        assert_eq!(monitor.observe(false), Some(false));
    }
}
