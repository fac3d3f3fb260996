//! Sense HAT front panel: LED matrix, joystick and display state.

pub mod framebuffer;
pub mod joystick;
pub mod led;
pub mod sensehat;

pub use framebuffer::{default_matrix, FramebufferMatrix, HeadlessMatrix, LedMatrix};
pub use joystick::{Direction, JoystickEvent, KeyAction};
pub use led::{Frame, Rgb};
pub use sensehat::SenseHatSensors;

use crate::error::Result;
use crate::metrics::data::MetricSet;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Display mode showing sparkles instead of a metric graph.
pub const SPARKLE_MODE: usize = 0;

/// What the user asked for with the joystick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayAction {
    Rotated(u16),
    Mode(usize),
    Sleep,
    Wake,
}

impl DisplayAction {
    pub fn describe(&self) -> String {
        match self {
            DisplayAction::Rotated(deg) => format!("Rotated display to {}°", deg),
            DisplayAction::Mode(SPARKLE_MODE) => "Display mode: sparkles".to_string(),
            DisplayAction::Mode(mode) => format!("Display mode: {}", mode),
            DisplayAction::Sleep => "Display off".to_string(),
            DisplayAction::Wake => "Display on".to_string(),
        }
    }
}

/// Rotation, display mode and sleep state driven by the joystick.
#[derive(Debug, Clone)]
pub struct DisplayState {
    rotation: u16,
    mode: usize,
    min_mode: usize,
    max_mode: usize,
    sleeping: bool,
    forced_off: bool,
    sleep_after: Duration,
    last_activity: Instant,
}

impl DisplayState {
    /// Modes run from `SPARKLE_MODE` to `max_mode`. An out-of-range
    /// `mode` falls back to sparkles.
    pub fn new(
        max_mode: usize,
        mode: usize,
        rotation: u16,
        sleep_after: Duration,
        forced_off: bool,
        now: Instant,
    ) -> Self {
        Self {
            rotation: rotation % 360,
            mode: if mode <= max_mode { mode } else { SPARKLE_MODE },
            min_mode: SPARKLE_MODE,
            max_mode,
            sleeping: forced_off,
            forced_off,
            sleep_after,
            last_activity: now,
        }
    }

    pub fn rotation(&self) -> u16 {
        self.rotation
    }

    pub fn mode(&self) -> usize {
        self.mode
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    fn rotate(&mut self, delta: i32) -> u16 {
        self.rotation = (self.rotation as i32 + delta).rem_euclid(360) as u16;
        self.rotation
    }

    fn step_mode(&mut self, forward: bool) -> usize {
        self.mode = if forward {
            if self.mode >= self.max_mode {
                self.min_mode
            } else {
                self.mode + 1
            }
        } else if self.mode <= self.min_mode {
            self.max_mode
        } else {
            self.mode - 1
        };
        self.mode
    }

    /// Apply a joystick event.
    pub fn handle(&mut self, event: JoystickEvent, now: Instant) -> DisplayAction {
        let action = match event.direction {
            Direction::Up => DisplayAction::Rotated(self.rotate(-90)),
            Direction::Down => DisplayAction::Rotated(self.rotate(90)),
            Direction::Left => DisplayAction::Mode(self.step_mode(false)),
            Direction::Right => DisplayAction::Mode(self.step_mode(true)),
            Direction::Middle => {
                if self.sleeping {
                    self.sleeping = false;
                    self.forced_off = false;
                    DisplayAction::Wake
                } else {
                    self.sleeping = true;
                    DisplayAction::Sleep
                }
            }
        };
        if action != DisplayAction::Sleep {
            self.last_activity = now;
        }
        debug!(?event, ?action, "Joystick");
        action
    }

    /// Put the display to sleep when forced off or idle too long.
    ///
    /// Sleep is sticky: only the middle button wakes the display again.
    pub fn update_sleep(&mut self, now: Instant) -> bool {
        if !self.sleeping
            && (self.forced_off || now.saturating_duration_since(self.last_activity) > self.sleep_after)
        {
            debug!("Display going to sleep");
            self.sleeping = true;
        }
        self.sleeping
    }
}

/// LED matrix plus the state needed to draw it.
pub struct Device {
    state: DisplayState,
    matrix: Box<dyn LedMatrix>,
    sparkles: Frame,
    rng: StdRng,
    show_progress: bool,
}

impl Device {
    pub fn new(state: DisplayState, matrix: Box<dyn LedMatrix>, show_progress: bool) -> Self {
        Self {
            state,
            matrix,
            sparkles: Frame::blank(),
            rng: StdRng::from_entropy(),
            show_progress,
        }
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub fn handle(&mut self, event: JoystickEvent, now: Instant) -> DisplayAction {
        self.state.handle(event, now)
    }

    pub fn update_sleep(&mut self, now: Instant) -> bool {
        self.state.update_sleep(now)
    }

    /// Frame for the current mode, before rotation.
    pub fn compose(&mut self, metrics: &MetricSet, progress: f64) -> Frame {
        if self.state.is_sleeping() {
            return Frame::blank();
        }

        let mut frame = match metrics.for_display_mode(self.state.mode()) {
            Some((_, series)) => {
                let values = series.display_slice(led::WIDTH);
                led::graph(&values, series.display_min_max(led::WIDTH), series.limits())
            }
            None => {
                led::sparkle(&mut self.sparkles, &mut self.rng);
                self.sparkles.clone()
            }
        };

        if self.show_progress {
            led::draw_progress(&mut frame, progress);
        }
        frame
    }

    /// Draw the current mode on the LED matrix.
    pub fn render(&mut self, metrics: &MetricSet, progress: f64) -> Result<()> {
        let frame = self.compose(metrics, progress);
        self.matrix.show(&frame.rotated(self.state.rotation()))
    }

    pub fn clear(&mut self) -> Result<()> {
        self.matrix.clear()
    }
}
