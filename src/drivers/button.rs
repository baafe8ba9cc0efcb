//! Polled "measure now" push-button.
//!
//! ## Hardware
//!
//! Active-low momentary switch on [`pins::MEASURE_BUTTON_GPIO`] with a
//! pull-up. The input worker calls [`MeasureButton::poll`] at its poll rate;
//! a press is reported once, after the line has read low for
//! [`DEBOUNCE_MS`], and the button must be released before it can fire again.
//!
//! | State      | Line low                    | Line high  |
//! |------------|-----------------------------|------------|
//! | `Released` | → `Bouncing`                | stay       |
//! | `Bouncing` | stable ≥ 50 ms → `Held`, fire | → `Released` |
//! | `Held`     | stay                        | → `Released` |

use crate::drivers::hw_init;
use crate::pins;

/// Contact bounce filter.
pub const DEBOUNCE_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ButtonState {
    Released,
    Bouncing { since_ms: u64 },
    Held,
}

pub struct MeasureButton {
    gpio: i32,
    state: ButtonState,
}

impl Default for MeasureButton {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasureButton {
    pub fn new() -> Self {
        Self {
            gpio: pins::MEASURE_BUTTON_GPIO,
            state: ButtonState::Released,
        }
    }

    /// Sample the line at monotonic time `now_ms`. Returns `true` exactly
    /// once per debounced press.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let down = !hw_init::gpio_level(self.gpio);
        let (next, fired) = match (self.state, down) {
            (ButtonState::Released, true) => (ButtonState::Bouncing { since_ms: now_ms }, false),
            (ButtonState::Bouncing { since_ms }, true) if now_ms.saturating_sub(since_ms) >= DEBOUNCE_MS => {
                (ButtonState::Held, true)
            }
            (ButtonState::Bouncing { .. } | ButtonState::Held, false) => (ButtonState::Released, false),
            (state, _) => (state, false),
        };
        if fired {
            log::debug!("Button: GPIO{} press", self.gpio);
        }
        self.state = next;
        fired
    }
}
