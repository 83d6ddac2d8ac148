//! Device configuration blob
//!
//! The host reads and writes the configuration as an opaque, versioned,
//! packed little-endian blob (`GET_CONFIG` / `SET_CONFIG` / `CONFIG_DATA`).
//! The device persists the same bytes on its filesystem.

use heapless::Vec;

/// Current blob layout version
pub const CONFIG_VERSION: u32 = 1;

/// Maximum number of segments in one device
pub const MAX_SEGMENTS: usize = 8;

/// Fixed header: version + device fields + segment count
const HEADER_LEN: usize = 4 + 1 + 1 + 1 + 1 + 1 + 4 + 4 + 1 + 1 + 1;

/// Per-segment record length
const SEGMENT_LEN: usize = 1 + 1 + 2 + 2;

/// Largest encoded configuration
pub const MAX_CONFIG_SIZE: usize = HEADER_LEN + MAX_SEGMENTS * SEGMENT_LEN;

/// Configuration blob errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Blob ends before all declared fields
    TooShort,
    /// Unsupported layout version
    VersionMismatch { found: u32 },
    /// More segments than the device supports
    TooManySegments,
    /// Bytes left after the last segment
    Trailing,
}

/// One display + potentiometer unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SegmentConfig {
    /// Display chip-select pin
    pub tft_cs_pin: u8,
    /// Potentiometer ADC pin
    pub pot_pin: u8,
    /// Raw ADC reading mapped to 0 %
    pub pot_min_value: u16,
    /// Raw ADC reading mapped to 100 %
    pub pot_max_value: u16,
}

impl SegmentConfig {
    const fn new(tft_cs_pin: u8, pot_pin: u8) -> Self {
        Self {
            tft_cs_pin,
            pot_pin,
            pot_min_value: 0,
            pot_max_value: 4095,
        }
    }
}

/// Device-wide configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceConfig {
    /// Shared SPI clock pin (-1 = hardware default)
    pub spi_clk_pin: i8,
    /// Shared SPI data pin (-1 = hardware default)
    pub spi_data_pin: i8,
    pub tft_dc_pin: u8,
    pub tft_backlight_pin: u8,
    pub tft_backlight_value: u8,
    pub spi_speed_hz: u32,
    pub baudrate: u32,
    /// Block boot until the host opens the port
    pub wait_for_serial: bool,
    /// Enable the idle sleep policy
    pub do_sleep: bool,
    pub segments: Vec<SegmentConfig, MAX_SEGMENTS>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let mut segments = Vec::new();
        for (cs, pot) in [(8, 39), (6, 37), (4, 35), (2, 33), (1, 18)] {
            let _ = segments.push(SegmentConfig::new(cs, pot));
        }

        Self {
            spi_clk_pin: 3,
            spi_data_pin: 5,
            tft_dc_pin: 7,
            tft_backlight_pin: 39,
            tft_backlight_value: 255,
            spi_speed_hz: 1_000_000,
            baudrate: 115_200,
            wait_for_serial: true,
            do_sleep: false,
            segments,
        }
    }
}

/// Little-endian cursor over a config blob
struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], ConfigError> {
        if self.data.len() < N {
            return Err(ConfigError::TooShort);
        }
        let (head, rest) = self.data.split_at(N);
        self.data = rest;
        let mut out = [0u8; N];
        out.copy_from_slice(head);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, ConfigError> {
        Ok(self.take::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, ConfigError> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    fn u32(&mut self) -> Result<u32, ConfigError> {
        Ok(u32::from_le_bytes(self.take()?))
    }
}

impl DeviceConfig {
    /// Decode a configuration blob
    pub fn from_bytes(data: &[u8]) -> Result<Self, ConfigError> {
        let mut r = Reader { data };

        let version = r.u32()?;
        if version != CONFIG_VERSION {
            return Err(ConfigError::VersionMismatch { found: version });
        }

        let spi_clk_pin = r.u8()? as i8;
        let spi_data_pin = r.u8()? as i8;
        let tft_dc_pin = r.u8()?;
        let tft_backlight_pin = r.u8()?;
        let tft_backlight_value = r.u8()?;
        let spi_speed_hz = r.u32()?;
        let baudrate = r.u32()?;
        let wait_for_serial = r.u8()? != 0;
        let do_sleep = r.u8()? != 0;

        let count = r.u8()? as usize;
        if count > MAX_SEGMENTS {
            return Err(ConfigError::TooManySegments);
        }

        let mut segments = Vec::new();
        for _ in 0..count {
            let segment = SegmentConfig {
                tft_cs_pin: r.u8()?,
                pot_pin: r.u8()?,
                pot_min_value: r.u16()?,
                pot_max_value: r.u16()?,
            };
            segments
                .push(segment)
                .map_err(|_| ConfigError::TooManySegments)?;
        }

        if !r.data.is_empty() {
            return Err(ConfigError::Trailing);
        }

        Ok(Self {
            spi_clk_pin,
            spi_data_pin,
            tft_dc_pin,
            tft_backlight_pin,
            tft_backlight_value,
            spi_speed_hz,
            baudrate,
            wait_for_serial,
            do_sleep,
            segments,
        })
    }

    /// Encode into a configuration blob
    pub fn to_bytes(&self) -> Vec<u8, MAX_CONFIG_SIZE> {
        let mut out: Vec<u8, MAX_CONFIG_SIZE> = Vec::new();
        // Capacity covers the header plus MAX_SEGMENTS records
        let _ = out.extend_from_slice(&CONFIG_VERSION.to_le_bytes());
        let _ = out.extend_from_slice(&[
            self.spi_clk_pin as u8,
            self.spi_data_pin as u8,
            self.tft_dc_pin,
            self.tft_backlight_pin,
            self.tft_backlight_value,
        ]);
        let _ = out.extend_from_slice(&self.spi_speed_hz.to_le_bytes());
        let _ = out.extend_from_slice(&self.baudrate.to_le_bytes());
        let _ = out.extend_from_slice(&[
            self.wait_for_serial as u8,
            self.do_sleep as u8,
            self.segments.len() as u8,
        ]);
        for seg in &self.segments {
            let _ = out.extend_from_slice(&[seg.tft_cs_pin, seg.pot_pin]);
            let _ = out.extend_from_slice(&seg.pot_min_value.to_le_bytes());
            let _ = out.extend_from_slice(&seg.pot_max_value.to_le_bytes());
        }
        out
    }
}
