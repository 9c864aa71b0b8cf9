//! Single-button gesture decoder.
//!
//! The board has one usable button, so menu input is encoded in gestures:
//! click scrolls, double click selects, long press goes back.

use espchain::module::Button;

const DEBOUNCE_MS: u64 = 30;
const DOUBLE_CLICK_MS: u64 = 300;
const LONG_PRESS_MS: u64 = 800;

/// Button codes the gestures map to
const CODE_SCROLL: u8 = 1;
const CODE_SELECT: u8 = 2;
const CODE_BACK: u8 = 3;

#[derive(Default)]
pub struct Gestures {
    pressed: bool,
    last_edge: u64,
    press_at: u64,
    long_handled: bool,
    clicks: u8,
    last_click: u64,
}

impl Gestures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current (debounced here) button level; returns a completed gesture.
    pub fn update(&mut self, pressed: bool, now_ms: u64) -> Option<Button> {
        if pressed != self.pressed {
            if now_ms.saturating_sub(self.last_edge) < DEBOUNCE_MS {
                return None;
            }
            self.last_edge = now_ms;
            self.pressed = pressed;
            if pressed {
                self.press_at = now_ms;
                self.long_handled = false;
            } else if !self.long_handled {
                if self.clicks == 0 {
                    self.clicks = 1;
                    self.last_click = now_ms;
                } else {
                    self.clicks = 0;
                    return Button::from_code(CODE_SELECT);
                }
            }
        } else if pressed
            && !self.long_handled
            && now_ms.saturating_sub(self.press_at) > LONG_PRESS_MS
        {
            self.long_handled = true;
            self.clicks = 0;
            return Button::from_code(CODE_BACK);
        }

        if self.clicks > 0 && now_ms.saturating_sub(self.last_click) > DOUBLE_CLICK_MS {
            self.clicks = 0;
            return Button::from_code(CODE_SCROLL);
        }
        None
    }
}
