//! LED matrix outputs: the Sense HAT framebuffer and a headless stand-in.

use super::led::Frame;
use crate::error::{MonitorError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name the Sense HAT driver registers for its framebuffer.
pub const SENSE_HAT_FB_NAME: &str = "RPi-Sense FB";

const GRAPHICS_CLASS: &str = "/sys/class/graphics";

/// Something that can show a [`Frame`].
pub trait LedMatrix: Send {
    fn show(&mut self, frame: &Frame) -> Result<()>;

    fn clear(&mut self) -> Result<()> {
        self.show(&Frame::blank())
    }

    /// False for outputs that discard everything.
    fn is_physical(&self) -> bool {
        true
    }
}

/// Encode a frame as 64 little-endian RGB565 pixels.
pub fn encode_rgb565(frame: &Frame) -> [u8; 128] {
    let mut out = [0u8; 128];
    for (chunk, px) in out.chunks_exact_mut(2).zip(frame.pixels()) {
        chunk.copy_from_slice(&px.to_rgb565().to_le_bytes());
    }
    out
}

/// Locate `/dev/fbN` for the framebuffer registered as `name`.
pub fn find_framebuffer(class_dir: &Path, name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(class_dir).ok()?;
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(fb) = file_name.to_str().filter(|n| n.starts_with("fb")) else {
            continue;
        };
        let matches = fs::read_to_string(entry.path().join("name"))
            .map(|content| content.trim() == name)
            .unwrap_or(false);
        if matches {
            return Some(Path::new("/dev").join(fb));
        }
    }
    None
}

/// Sense HAT LED matrix driven through its framebuffer device.
pub struct FramebufferMatrix {
    file: File,
    path: PathBuf,
}

impl FramebufferMatrix {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().write(true).open(&path).map_err(|e| {
            MonitorError::device_error(format!("Cannot open {}: {}", path.display(), e))
        })?;
        debug!("Using LED framebuffer {}", path.display());
        Ok(Self { file, path })
    }

    /// Open the Sense HAT framebuffer if one is present.
    pub fn detect() -> Option<Result<Self>> {
        find_framebuffer(Path::new(GRAPHICS_CLASS), SENSE_HAT_FB_NAME).map(Self::open)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedMatrix for FramebufferMatrix {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&encode_rgb565(frame))?;
        Ok(())
    }
}

/// Used when no LED matrix is attached.
#[derive(Debug, Default)]
pub struct HeadlessMatrix;

impl LedMatrix for HeadlessMatrix {
    fn show(&mut self, _frame: &Frame) -> Result<()> {
        Ok(())
    }

    fn is_physical(&self) -> bool {
        false
    }
}

/// Best available LED output: the framebuffer if found, else headless.
pub fn default_matrix() -> Box<dyn LedMatrix> {
    match FramebufferMatrix::detect() {
        Some(Ok(fb)) => Box::new(fb),
        Some(Err(e)) => {
            tracing::warn!("LED matrix unavailable: {}", e);
            Box::new(HeadlessMatrix)
        }
        None => {
            debug!("No Sense HAT framebuffer found, running headless");
            Box::new(HeadlessMatrix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::led::Rgb;
    use super::*;
    use std::io::Read;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pif451-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_encode_rgb565_little_endian() {
        let mut frame = Frame::blank();
        frame.set(0, 0, Rgb::RED);
        frame.set(7, 7, Rgb::BLUE);
        let bytes = encode_rgb565(&frame);
        assert_eq!(&bytes[0..2], &[0x00, 0xF8]);
        assert_eq!(&bytes[126..128], &[0x1F, 0x00]);
        assert!(bytes[2..126].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_find_framebuffer_by_name() {
        let dir = temp_dir("fbclass");
        for (fb, name) in [("fb0", "BCM2708 FB"), ("fb1", "RPi-Sense FB")] {
            fs::create_dir_all(dir.join(fb)).unwrap();
            fs::write(dir.join(fb).join("name"), format!("{}\n", name)).unwrap();
        }

        assert_eq!(
            find_framebuffer(&dir, SENSE_HAT_FB_NAME),
            Some(PathBuf::from("/dev/fb1"))
        );
        assert_eq!(find_framebuffer(&dir, "Other FB"), None);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_framebuffer_writes_whole_frame() {
        let dir = temp_dir("fbdev");
        let dev = dir.join("fb1");
        fs::write(&dev, b"").unwrap();

        let mut matrix = FramebufferMatrix::open(&dev).unwrap();
        let mut frame = Frame::blank();
        frame.set(1, 0, Rgb::GREEN);
        matrix.show(&frame).unwrap();
        matrix.clear().unwrap();

        let mut contents = Vec::new();
        File::open(&dev).unwrap().read_to_end(&mut contents).unwrap();
        assert_eq!(contents.len(), 128);
        assert!(contents.iter().all(|b| *b == 0));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_headless_matrix() {
        let mut matrix = HeadlessMatrix;
        assert!(matrix.show(&Frame::blank()).is_ok());
        assert!(!matrix.is_physical());
    }
}
