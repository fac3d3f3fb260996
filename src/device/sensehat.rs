//! Sense HAT environment sensors (HTS221 humidity/temperature, LPS25H pressure).
//!
//! Register access needs the `sensehat` feature, which pulls in `rppal` for
//! I2C. Without it a stand-in is compiled that fails to open, so the crate
//! still builds and tests on any host.

use crate::error::Result;
use crate::metrics::traits::EnvironmentSensors;

/// HTS221 humidity and temperature sensor
pub const HTS221_ADDR: u16 = 0x5F;
/// LPS25H pressure sensor
pub const LPS25H_ADDR: u16 = 0x5C;

const WHO_AM_I: u8 = 0x0F;
const CTRL_REG1: u8 = 0x20;
/// Register address flag for multi-byte reads
const AUTO_INCREMENT: u8 = 0x80;

const HTS221_ID: u8 = 0xBC;
const HTS221_CALIB: u8 = 0x30;
const HTS221_HUMIDITY_OUT: u8 = 0x28;
const HTS221_TEMP_OUT: u8 = 0x2A;
/// Power on, block data update, 1 Hz
const HTS221_CTRL: u8 = 0x85;

const LPS25H_ID: u8 = 0xBD;
const LPS25H_PRESS_OUT: u8 = 0x28;
/// Power on, 1 Hz
const LPS25H_CTRL: u8 = 0x90;

/// Factory calibration of one HTS221, read from registers `0x30..=0x3F`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hts221Calibration {
    h0_rh: f64,
    h1_rh: f64,
    t0_deg: f64,
    t1_deg: f64,
    h0_out: i16,
    h1_out: i16,
    t0_out: i16,
    t1_out: i16,
}

impl Hts221Calibration {
    pub fn from_registers(regs: &[u8; 16]) -> Self {
        let word = |lo: usize| i16::from_le_bytes([regs[lo], regs[lo + 1]]);
        let t0_x8 = (((regs[5] & 0x03) as u16) << 8) | regs[2] as u16;
        let t1_x8 = (((regs[5] & 0x0C) as u16) << 6) | regs[3] as u16;

        Self {
            h0_rh: regs[0] as f64 / 2.0,
            h1_rh: regs[1] as f64 / 2.0,
            t0_deg: t0_x8 as f64 / 8.0,
            t1_deg: t1_x8 as f64 / 8.0,
            h0_out: word(6),
            h1_out: word(10),
            t0_out: word(12),
            t1_out: word(14),
        }
    }

    fn interpolate(raw: i16, out0: i16, out1: i16, v0: f64, v1: f64) -> f64 {
        if out1 == out0 {
            return v0;
        }
        v0 + (raw as f64 - out0 as f64) * (v1 - v0) / (out1 as f64 - out0 as f64)
    }

    pub fn temperature(&self, raw: i16) -> f64 {
        Self::interpolate(raw, self.t0_out, self.t1_out, self.t0_deg, self.t1_deg)
    }

    pub fn humidity(&self, raw: i16) -> f64 {
        Self::interpolate(raw, self.h0_out, self.h1_out, self.h0_rh, self.h1_rh)
    }
}

/// Convert the 24-bit LPS25H pressure output (XL, L, H) to hPa.
pub fn lps25h_pressure(bytes: [u8; 3]) -> f64 {
    // Sign-extend through the top byte of an i32
    let raw = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
    raw as f64 / 4096.0
}

#[cfg(feature = "sensehat")]
mod raspberry_pi {
    use super::*;
    use crate::error::MonitorError;
    use rppal::i2c::I2c;
    use tracing::debug;

    /// Sense HAT sensors on the Pi's I2C bus.
    pub struct SenseHatSensors {
        i2c: I2c,
        calibration: Hts221Calibration,
    }

    fn i2c_error(what: &str, e: rppal::i2c::Error) -> MonitorError {
        MonitorError::device_error(format!("{}: {}", what, e))
    }

    impl SenseHatSensors {
        pub fn new() -> Result<Self> {
            let mut i2c = I2c::new().map_err(|e| i2c_error("Failed to open I2C bus", e))?;

            Self::check_id(&mut i2c, HTS221_ADDR, HTS221_ID, "HTS221")?;
            i2c.smbus_write_byte(CTRL_REG1, HTS221_CTRL)
                .map_err(|e| i2c_error("Failed to configure HTS221", e))?;
            let mut regs = [0u8; 16];
            i2c.write_read(&[HTS221_CALIB | AUTO_INCREMENT], &mut regs)
                .map_err(|e| i2c_error("Failed to read HTS221 calibration", e))?;
            let calibration = Hts221Calibration::from_registers(&regs);

            Self::check_id(&mut i2c, LPS25H_ADDR, LPS25H_ID, "LPS25H")?;
            i2c.smbus_write_byte(CTRL_REG1, LPS25H_CTRL)
                .map_err(|e| i2c_error("Failed to configure LPS25H", e))?;

            debug!(?calibration, "Sense HAT sensors ready");
            Ok(Self { i2c, calibration })
        }

        fn check_id(i2c: &mut I2c, addr: u16, expected: u8, name: &str) -> Result<()> {
            i2c.set_slave_address(addr)
                .map_err(|e| i2c_error("Failed to select sensor", e))?;
            let id = i2c
                .smbus_read_byte(WHO_AM_I)
                .map_err(|e| i2c_error("Failed to identify sensor", e))?;
            if id != expected {
                return Err(MonitorError::device_error(format!(
                    "{} not found at {:#04x} (id {:#04x})",
                    name, addr, id
                )));
            }
            Ok(())
        }

        fn read<const N: usize>(&mut self, addr: u16, reg: u8) -> Result<[u8; N]> {
            self.i2c
                .set_slave_address(addr)
                .map_err(|e| i2c_error("Failed to select sensor", e))?;
            let mut buf = [0u8; N];
            self.i2c
                .write_read(&[reg | AUTO_INCREMENT], &mut buf)
                .map_err(|e| i2c_error("Sensor read failed", e))?;
            Ok(buf)
        }
    }

    impl EnvironmentSensors for SenseHatSensors {
        fn temperature(&mut self) -> Result<f64> {
            let raw = self.read::<2>(HTS221_ADDR, HTS221_TEMP_OUT)?;
            Ok(self.calibration.temperature(i16::from_le_bytes(raw)))
        }

        fn pressure(&mut self) -> Result<f64> {
            let raw = self.read::<3>(LPS25H_ADDR, LPS25H_PRESS_OUT)?;
            Ok(lps25h_pressure(raw))
        }

        fn humidity(&mut self) -> Result<f64> {
            let raw = self.read::<2>(HTS221_ADDR, HTS221_HUMIDITY_OUT)?;
            Ok(self.calibration.humidity(i16::from_le_bytes(raw)))
        }
    }
}

#[cfg(not(feature = "sensehat"))]
mod mock {
    use super::*;
    use crate::error::MonitorError;

    /// Placeholder for builds without Sense HAT support.
    pub struct SenseHatSensors;

    impl SenseHatSensors {
        pub fn new() -> Result<Self> {
            Err(MonitorError::device_error(
                "Sense HAT support not compiled in (enable the `sensehat` feature)",
            ))
        }
    }

    impl EnvironmentSensors for SenseHatSensors {
        fn temperature(&mut self) -> Result<f64> {
            Err(MonitorError::device_error("Sense HAT not available"))
        }

        fn pressure(&mut self) -> Result<f64> {
            Err(MonitorError::device_error("Sense HAT not available"))
        }

        fn humidity(&mut self) -> Result<f64> {
            Err(MonitorError::device_error("Sense HAT not available"))
        }
    }
}

#[cfg(feature = "sensehat")]
pub use raspberry_pi::SenseHatSensors;

#[cfg(not(feature = "sensehat"))]
pub use mock::SenseHatSensors;

#[cfg(test)]
mod tests {
    use super::*;

    fn calibration() -> Hts221Calibration {
        let mut regs = [0u8; 16];
        regs[0] = 40; // H0 = 20 %rH
        regs[1] = 160; // H1 = 80 %rH
        regs[2] = 80; // T0 = 10 C
        regs[3] = 240; // T1 = 30 C
        regs[6..8].copy_from_slice(&0i16.to_le_bytes());
        regs[10..12].copy_from_slice(&6000i16.to_le_bytes());
        regs[12..14].copy_from_slice(&(-1000i16).to_le_bytes());
        regs[14..16].copy_from_slice(&1000i16.to_le_bytes());
        Hts221Calibration::from_registers(&regs)
    }

    #[test]
    fn test_hts221_temperature() {
        let cal = calibration();
        assert_eq!(cal.temperature(-1000), 10.0);
        assert_eq!(cal.temperature(0), 20.0);
        assert_eq!(cal.temperature(1000), 30.0);
    }

    #[test]
    fn test_hts221_humidity() {
        let cal = calibration();
        assert_eq!(cal.humidity(0), 20.0);
        assert_eq!(cal.humidity(3000), 50.0);
    }

    #[test]
    fn test_hts221_humidity_out_of_range_is_reported_raw() {
        let cal = calibration();
        let high = cal.humidity(30000);
        let low = cal.humidity(-3000);
        assert_eq!(high, 320.0);
        assert_eq!(low, -10.0);

        // Only the display side filters these
        let range = crate::metrics::MetricKind::Humidity.valid_range();
        assert!(!range.contains(high));
        assert!(!range.contains(low));
    }

    #[test]
    fn test_hts221_temperature_msb_bits() {
        let mut regs = [0u8; 16];
        regs[2] = 0x00;
        regs[3] = 0x00;
        // T0 msb = 1, T1 msb = 2
        regs[5] = 0b0000_1001;
        regs[14..16].copy_from_slice(&1i16.to_le_bytes());
        let cal = Hts221Calibration::from_registers(&regs);
        assert_eq!(cal.temperature(0), 256.0 / 8.0);
        assert_eq!(cal.temperature(1), 512.0 / 8.0);
    }

    #[test]
    fn test_lps25h_pressure() {
        // 1013.25 hPa * 4096 = 4150272 = 0x3F5400
        assert_eq!(lps25h_pressure([0x00, 0x54, 0x3F]), 1013.25);
        assert!(lps25h_pressure([0x00, 0x00, 0xFF]) < 0.0);
    }

    #[cfg(not(feature = "sensehat"))]
    #[test]
    fn test_sensors_unavailable_without_feature() {
        assert!(SenseHatSensors::new().is_err());
    }
}
