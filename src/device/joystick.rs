//! Sense HAT joystick input via the Linux evdev interface.

use crate::error::{MonitorError, Result};
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Input device name registered by the Sense HAT driver.
pub const JOYSTICK_NAME: &str = "Raspberry Pi Sense HAT Joystick";

const INPUT_CLASS: &str = "/sys/class/input";

/// `struct input_event` on 64-bit Linux: timeval (16) + type + code + value.
pub const INPUT_EVENT_SIZE: usize = 24;

const EV_KEY: u16 = 0x01;
const KEY_ENTER: u16 = 28;
const KEY_UP: u16 = 103;
const KEY_LEFT: u16 = 105;
const KEY_RIGHT: u16 = 106;
const KEY_DOWN: u16 = 108;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Pressed,
    Held,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoystickEvent {
    pub direction: Direction,
    pub action: KeyAction,
}

impl JoystickEvent {
    pub fn pressed(direction: Direction) -> Self {
        Self {
            direction,
            action: KeyAction::Pressed,
        }
    }
}

/// Decode one raw `input_event`. Releases and non-key events yield `None`.
pub fn parse_input_event(buf: &[u8; INPUT_EVENT_SIZE]) -> Option<JoystickEvent> {
    let ev_type = u16::from_ne_bytes([buf[16], buf[17]]);
    let code = u16::from_ne_bytes([buf[18], buf[19]]);
    let value = i32::from_ne_bytes([buf[20], buf[21], buf[22], buf[23]]);

    if ev_type != EV_KEY {
        return None;
    }

    let direction = match code {
        KEY_UP => Direction::Up,
        KEY_DOWN => Direction::Down,
        KEY_LEFT => Direction::Left,
        KEY_RIGHT => Direction::Right,
        KEY_ENTER => Direction::Middle,
        _ => return None,
    };

    let action = match value {
        1 => KeyAction::Pressed,
        2 => KeyAction::Held,
        _ => return None,
    };

    Some(JoystickEvent { direction, action })
}

/// Find `/dev/input/eventN` for the input device called `name`.
pub fn find_event_device(class_dir: &Path, name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(class_dir).ok()?;
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(event) = file_name.to_str().filter(|n| n.starts_with("event")) else {
            continue;
        };
        let matches = fs::read_to_string(entry.path().join("device").join("name"))
            .map(|content| content.trim() == name)
            .unwrap_or(false);
        if matches {
            return Some(Path::new("/dev/input").join(event));
        }
    }
    None
}

/// Read events from `reader` until EOF or the receiver goes away.
pub fn pump_events(mut reader: impl Read, tx: &mpsc::UnboundedSender<JoystickEvent>) -> Result<()> {
    let mut buf = [0u8; INPUT_EVENT_SIZE];
    loop {
        match reader.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        if let Some(event) = parse_input_event(&buf) {
            if tx.send(event).is_err() {
                return Ok(());
            }
        }
    }
}

/// Pump `reader` on a detached OS thread.
///
/// The read blocks until the next key event, so it must not live on the
/// runtime's blocking pool: dropping the runtime would wait for it.
pub fn spawn_event_pump<R>(
    reader: R,
    tx: mpsc::UnboundedSender<JoystickEvent>,
) -> Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("joystick".to_string())
        .spawn(move || {
            if let Err(e) = pump_events(reader, &tx) {
                warn!("Joystick reader stopped: {}", e);
            }
        })?;
    Ok(handle)
}

/// Start reading the Sense HAT joystick.
pub fn spawn_joystick_reader(
    tx: mpsc::UnboundedSender<JoystickEvent>,
) -> Result<JoinHandle<()>> {
    let path = find_event_device(Path::new(INPUT_CLASS), JOYSTICK_NAME)
        .ok_or_else(|| MonitorError::device_error("Sense HAT joystick not found"))?;
    let file = File::open(&path).map_err(|e| {
        MonitorError::device_error(format!("Cannot open {}: {}", path.display(), e))
    })?;
    debug!("Reading joystick events from {}", path.display());

    spawn_event_pump(file, tx)
}
