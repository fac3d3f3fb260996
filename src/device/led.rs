//! 8x8 LED frame drawing: bar graphs, sparkles and the upload progress bar.

use crate::metrics::series::{Band, Limits};
use rand::Rng;

pub const WIDTH: usize = 8;
pub const HEIGHT: usize = 8;

/// Chance that a sparkle step wipes the frame first.
const SPARKLE_CLEAR_CHANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const OFF: Rgb = Rgb(0, 0, 0);
    pub const BLUE: Rgb = Rgb(0, 0, 255);
    pub const GREEN: Rgb = Rgb(0, 255, 0);
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const PROGRESS: Rgb = Rgb(0, 64, 255);

    /// 16-bit RGB565 value as expected by the Sense HAT framebuffer.
    pub fn to_rgb565(self) -> u16 {
        let Rgb(r, g, b) = self;
        ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
    }

    pub fn is_off(self) -> bool {
        self == Rgb::OFF
    }
}

/// Bar colours by height, cool to hot.
const HEIGHT_COLORS: [Rgb; HEIGHT] = [
    Rgb(0, 0, 255),
    Rgb(0, 128, 255),
    Rgb(0, 255, 255),
    Rgb(0, 255, 128),
    Rgb(0, 255, 0),
    Rgb(255, 255, 0),
    Rgb(255, 128, 0),
    Rgb(255, 0, 0),
];

/// Row-major pixel buffer, `(0, 0)` is the top left corner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame([Rgb; WIDTH * HEIGHT]);

impl Default for Frame {
    fn default() -> Self {
        Self::blank()
    }
}

impl Frame {
    pub fn blank() -> Self {
        Frame([Rgb::OFF; WIDTH * HEIGHT])
    }

    pub fn get(&self, x: usize, y: usize) -> Rgb {
        self.0[y * WIDTH + x]
    }

    pub fn set(&mut self, x: usize, y: usize, color: Rgb) {
        self.0[y * WIDTH + x] = color;
    }

    pub fn clear(&mut self) {
        self.0 = [Rgb::OFF; WIDTH * HEIGHT];
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.0
    }

    pub fn lit_count(&self) -> usize {
        self.0.iter().filter(|px| !px.is_off()).count()
    }

    /// Number of lit pixels in column `x`.
    pub fn column_height(&self, x: usize) -> usize {
        (0..HEIGHT).filter(|y| !self.get(x, *y).is_off()).count()
    }

    /// Copy of the frame rotated clockwise by `degrees` (0, 90, 180 or 270).
    pub fn rotated(&self, degrees: u16) -> Frame {
        let mut out = Frame::blank();
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let (nx, ny) = match degrees % 360 {
                    90 => (HEIGHT - 1 - y, x),
                    180 => (WIDTH - 1 - x, HEIGHT - 1 - y),
                    270 => (y, WIDTH - 1 - x),
                    _ => (x, y),
                };
                out.set(nx, ny, self.get(x, y));
            }
        }
        out
    }
}

/// Bar height for `value` scaled into `[min, max]`, between 1 and 8.
///
/// A flat range (`max <= min`) gives a mid-height bar.
pub fn bar_height(value: f64, min: f64, max: f64) -> usize {
    if max <= min {
        return HEIGHT / 2;
    }
    let scaled = 1.0 + ((value - min) / (max - min) * (HEIGHT - 1) as f64).round();
    scaled.clamp(1.0, HEIGHT as f64) as usize
}

fn band_color(band: Band) -> Rgb {
    match band {
        Band::Low => Rgb::BLUE,
        Band::Normal => Rgb::GREEN,
        Band::High => Rgb::RED,
    }
}

/// Bar graph of the last 8 values; missing values leave the column dark.
pub fn graph(values: &[Option<f64>], min_max: Option<(f64, f64)>, limits: Option<Limits>) -> Frame {
    let mut frame = Frame::blank();
    let Some((min, max)) = min_max else {
        return frame;
    };

    let start = values.len().saturating_sub(WIDTH);
    for (x, value) in values[start..].iter().enumerate() {
        let Some(value) = value else { continue };
        let height = bar_height(*value, min, max);
        let color = match limits {
            Some(limits) => band_color(limits.classify(*value)),
            None => HEIGHT_COLORS[height - 1],
        };
        for y in (HEIGHT - height)..HEIGHT {
            frame.set(x, y, color);
        }
    }
    frame
}

/// Screen-saver step: sometimes wipe, then light one random pixel.
pub fn sparkle<R: Rng + ?Sized>(frame: &mut Frame, rng: &mut R) {
    if rng.gen_bool(SPARKLE_CLEAR_CHANCE) {
        frame.clear();
    }
    let x = rng.gen_range(0..WIDTH);
    let y = rng.gen_range(0..HEIGHT);
    let color = Rgb(rng.gen(), rng.gen(), rng.gen());
    frame.set(x, y, color);
}

/// Light the bottom row in proportion to `fraction`.
pub fn draw_progress(frame: &mut Frame, fraction: f64) {
    let lit = (fraction.clamp(0.0, 1.0) * WIDTH as f64).round() as usize;
    for x in 0..WIDTH {
        let color = if x < lit { Rgb::PROGRESS } else { Rgb::OFF };
        frame.set(x, HEIGHT - 1, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_bar_height_scaling() {
        assert_eq!(bar_height(0.0, 0.0, 7.0), 1);
        assert_eq!(bar_height(7.0, 0.0, 7.0), 8);
        assert_eq!(bar_height(3.5, 0.0, 7.0), 5);
        assert_eq!(bar_height(5.0, 5.0, 5.0), 4);
    }

    #[test]
    fn test_graph_column_heights() {
        let values: Vec<Option<f64>> = (0..8).map(|v| Some(v as f64)).collect();
        let frame = graph(&values, Some((0.0, 7.0)), None);
        for x in 0..WIDTH {
            assert_eq!(frame.column_height(x), x + 1);
        }
        // Bars grow from the bottom row
        assert!(!frame.get(0, HEIGHT - 1).is_off());
        assert!(frame.get(0, 0).is_off());
    }

    #[test]
    fn test_graph_missing_values_are_blank() {
        let values = vec![Some(1.0), None, Some(3.0)];
        let frame = graph(&values, Some((1.0, 3.0)), None);
        assert_eq!(frame.column_height(0), 1);
        assert_eq!(frame.column_height(1), 0);
        assert_eq!(frame.column_height(2), 8);
    }

    #[test]
    fn test_graph_uses_last_eight_values() {
        let values: Vec<Option<f64>> = (0..12).map(|v| Some(v as f64)).collect();
        let frame = graph(&values, Some((4.0, 11.0)), None);
        assert_eq!(frame.column_height(0), 1);
        assert_eq!(frame.column_height(7), 8);
    }

    #[test]
    fn test_graph_flat_range() {
        let values = vec![Some(2.0); 8];
        let frame = graph(&values, Some((2.0, 2.0)), None);
        assert!((0..WIDTH).all(|x| frame.column_height(x) == 4));
        assert_eq!(graph(&values, None, None).lit_count(), 0);
    }

    #[test]
    fn test_graph_band_colors() {
        let limits = Limits::new([4.0, 18.0, 28.0, 35.0]).unwrap();
        let values = vec![Some(10.0), Some(22.0), Some(30.0)];
        let frame = graph(&values, Some((10.0, 30.0)), Some(limits));
        let bottom = HEIGHT - 1;
        assert_eq!(frame.get(0, bottom), Rgb::BLUE);
        assert_eq!(frame.get(1, bottom), Rgb::GREEN);
        assert_eq!(frame.get(2, bottom), Rgb::RED);
    }

    #[test]
    fn test_rotation() {
        let mut frame = Frame::blank();
        frame.set(0, 0, Rgb::RED);

        assert_eq!(frame.rotated(0).get(0, 0), Rgb::RED);
        assert_eq!(frame.rotated(90).get(7, 0), Rgb::RED);
        assert_eq!(frame.rotated(180).get(7, 7), Rgb::RED);
        assert_eq!(frame.rotated(270).get(0, 7), Rgb::RED);
        assert_eq!(frame.rotated(90).rotated(270), frame);
    }

    #[test]
    fn test_sparkle_lights_pixels() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut frame = Frame::blank();
        for _ in 0..20 {
            sparkle(&mut frame, &mut rng);
        }
        assert!(frame.lit_count() > 0);
        assert!(frame.lit_count() <= 20);
    }

    #[test]
    fn test_progress_bar() {
        let mut frame = Frame::blank();
        draw_progress(&mut frame, 0.5);
        let lit = (0..WIDTH)
            .filter(|x| !frame.get(*x, HEIGHT - 1).is_off())
            .count();
        assert_eq!(lit, 4);

        draw_progress(&mut frame, 2.0);
        assert!((0..WIDTH).all(|x| frame.get(x, HEIGHT - 1) == Rgb::PROGRESS));
    }

    #[test]
    fn test_rgb565() {
        assert_eq!(Rgb::RED.to_rgb565(), 0xF800);
        assert_eq!(Rgb::GREEN.to_rgb565(), 0x07E0);
        assert_eq!(Rgb::BLUE.to_rgb565(), 0x001F);
        assert_eq!(Rgb(255, 255, 255).to_rgb565(), 0xFFFF);
    }
}
