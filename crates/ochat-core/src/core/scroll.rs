//! Stick-to-bottom tracking for the message list.
//!
//! While sticking, every rendered frame scrolls the view to the bottom.
//! Scrolling up releases it; scrolling back near the bottom re-engages it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Distance from the bottom, in pixels, that still counts as "at the bottom".
pub const SCROLL_THRESHOLD: f64 = 200.0;
/// Minimum upward finger travel, in pixels, that counts as a touch scroll.
pub const TOUCH_THRESHOLD: f64 = 10.0;

/// Scroll geometry of the message list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl Viewport {
    pub fn distance_from_bottom(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }

    pub fn near_bottom(&self) -> bool {
        self.distance_from_bottom() <= SCROLL_THRESHOLD
    }
}

/// Shared stick-to-bottom flag.
#[derive(Debug, Clone, Default)]
pub struct StickToBottom {
    flag: Arc<AtomicBool>,
}

impl StickToBottom {
    pub fn new(initial: bool) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(initial)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn set(&self, enabled: bool) {
        self.flag.store(enabled, Ordering::Relaxed);
    }

    /// Wheel input: scrolling up releases, scrolling down near the bottom sticks.
    pub fn on_wheel(&self, delta_y: f64, viewport: Viewport) {
        if delta_y < 0.0 {
            self.set(false);
        } else if delta_y > 0.0 && viewport.near_bottom() {
            self.set(true);
        }
    }

    /// Starts tracking a touch gesture.
    pub fn touch(&self, start_y: f64) -> TouchTracker {
        TouchTracker {
            stick: self.clone(),
            start_y,
        }
    }
}

/// Follows one touch gesture.
#[derive(Debug, Clone)]
pub struct TouchTracker {
    stick: StickToBottom,
    start_y: f64,
}

impl TouchTracker {
    /// Measures travel from where the touch started.
    ///
    /// Anything short of an upward swipe past the threshold releases; a
    /// longer upward swipe sticks again only near the bottom.
    pub fn on_move(&self, y: f64, viewport: Viewport) {
        let delta = y - self.start_y;
        if delta > -TOUCH_THRESHOLD {
            self.stick.set(false);
        } else if viewport.near_bottom() {
            self.stick.set(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(distance: f64) -> Viewport {
        Viewport {
            scroll_top: 1000.0 - 400.0 - distance,
            scroll_height: 1000.0,
            client_height: 400.0,
        }
    }

    #[test]
    fn test_wheel_up_releases() {
        let stick = StickToBottom::new(true);
        stick.on_wheel(-5.0, viewport(0.0));
        assert!(!stick.is_enabled());
    }

    #[test]
    fn test_wheel_down_near_bottom_sticks() {
        let stick = StickToBottom::new(false);
        stick.on_wheel(5.0, viewport(500.0));
        assert!(!stick.is_enabled());
        stick.on_wheel(5.0, viewport(150.0));
        assert!(stick.is_enabled());
    }

    #[test]
    fn test_touch_thresholds() {
        let stick = StickToBottom::new(true);
        let touch = stick.touch(300.0);

        touch.on_move(310.0, viewport(0.0));
        assert!(!stick.is_enabled(), "dragging down scrolls up");

        touch.on_move(295.0, viewport(50.0));
        assert!(!stick.is_enabled(), "below touch threshold");

        touch.on_move(285.0, viewport(50.0));
        assert!(stick.is_enabled());

        touch.on_move(270.0, viewport(600.0));
        assert!(stick.is_enabled(), "far from the bottom leaves the flag alone");
    }

    #[test]
    fn test_slow_upward_swipe_sticks_again() {
        let stick = StickToBottom::new(false);
        let touch = stick.touch(300.0);
        for step in 1..=10 {
            touch.on_move(300.0 - 3.0 * f64::from(step), viewport(100.0));
        }
        assert!(stick.is_enabled());
    }

    #[test]
    fn test_upward_swipe_far_from_bottom_keeps_release() {
        let stick = StickToBottom::new(false);
        let touch = stick.touch(300.0);
        touch.on_move(250.0, viewport(800.0));
        assert!(!stick.is_enabled());
    }

    #[test]
    fn test_clones_share_flag() {
        let stick = StickToBottom::new(false);
        let other = stick.clone();
        other.set(true);
        assert!(stick.is_enabled());
    }
}
