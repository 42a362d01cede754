//! Driver for WS2821/WS2822 DMX pixel tiles hanging off the wifi-fpga bitstream.
//!
//! The bitstream exposes a tiny register file for line control and a DMX
//! buffer that is filled with `PUT /dmx` and clocked out by writing the send
//! register. A frame is finished once the send register drops back from 1.

use crate::domain::model::DMX_CHANNEL_MAX;
use crate::domain::ports::DeviceApi;
use crate::utils::error::{DeviceError, Result};
use std::time::Duration;
use tokio::time::{sleep, Instant};

pub const POWER_REG: u16 = 0x0000;
pub const CHANNEL_COUNT_REG: u16 = 0x0001;
pub const DATA_MODE_REG: u16 = 0x0002;
pub const SEND_DMX_REG: u16 = 0x0003;

/// RGB slots in one DMX universe (3 channels each).
pub const TILE_SLOTS: usize = 170;

const ADDRESS_PROGRAM_MARKER: u8 = 0xD2;

/// Reverses the bit order of a byte. The tiles expect programming bytes LSB first.
pub fn bitflip(val: u8) -> u8 {
    val.reverse_bits()
}

/// First DMX channel of tile `number` (1-based).
pub fn channel_for_tile(number: u16) -> Result<u16> {
    if number == 0 || usize::from(number) > TILE_SLOTS {
        return Err(DeviceError::InvalidInput {
            message: format!("tile number must be between 1 and {}, got {}", TILE_SLOTS, number),
        });
    }
    Ok(1 + 3 * (number - 1))
}

/// A full universe with only the tile starting at `channel` lit.
pub fn tile_frame(channel: u16, rgb: [u8; 3]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(TILE_SLOTS * 3);
    for slot in 0..TILE_SLOTS {
        if slot * 3 + 1 == usize::from(channel) {
            frame.extend_from_slice(&rgb);
        } else {
            frame.extend_from_slice(&[0, 0, 0]);
        }
    }
    frame
}

/// The four-byte message that assigns a start address to a tile in programming mode.
pub fn address_program_message(channel: u16) -> Result<Vec<u8>> {
    if channel == 0 || usize::from(channel) > DMX_CHANNEL_MAX {
        return Err(DeviceError::InvalidInput {
            message: format!(
                "DMX channel must be between 1 and {}, got {}",
                DMX_CHANNEL_MAX, channel
            ),
        });
    }

    let low = (channel % 256) as u8;
    // channel >> 8 is at most 2 here
    let high = 240 - (channel >> 8) as u8 * 15;

    Ok(vec![
        bitflip(low),
        bitflip(high),
        bitflip(ADDRESS_PROGRAM_MARKER),
        0, // pad to 16-bit alignment
    ])
}

#[derive(Debug, Clone)]
pub struct ProgrammingTimings {
    pub power_off: Duration,
    pub address_settle: Duration,
    pub programming_entry: Duration,
    pub after_send: Duration,
    pub confirm: Duration,
    pub power_cycle: Duration,
}

impl Default for ProgrammingTimings {
    fn default() -> Self {
        Self {
            power_off: Duration::from_secs(1),
            address_settle: Duration::from_millis(200),
            programming_entry: Duration::from_secs(1),
            after_send: Duration::from_millis(100),
            confirm: Duration::from_millis(300),
            power_cycle: Duration::from_millis(300),
        }
    }
}

impl ProgrammingTimings {
    /// No waiting at all; for fake devices.
    pub fn immediate() -> Self {
        Self {
            power_off: Duration::ZERO,
            address_settle: Duration::ZERO,
            programming_entry: Duration::ZERO,
            after_send: Duration::ZERO,
            confirm: Duration::ZERO,
            power_cycle: Duration::ZERO,
        }
    }
}

pub struct Ws2822<D: DeviceApi> {
    device: D,
    poll_timeout: Duration,
    poll_interval: Duration,
    timings: ProgrammingTimings,
}

impl<D: DeviceApi> Ws2822<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            poll_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(5),
            timings: ProgrammingTimings::default(),
        }
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timings(mut self, timings: ProgrammingTimings) -> Self {
        self.timings = timings;
        self
    }

    pub async fn set_power(&self, state: bool) -> Result<()> {
        self.device
            .register_put(POWER_REG, if state { 0x0001 } else { 0x0000 })
            .await
    }

    pub async fn power(&self) -> Result<bool> {
        let value = self.device.register_get(POWER_REG).await?;
        Ok((value & 0x0001) == 1)
    }

    pub async fn set_data_mode(&self, data: bool, address: bool) -> Result<()> {
        let mut mode = 0x0000;
        if data {
            mode |= 0x0001;
        }
        if address {
            mode |= 0x0002;
        }
        self.device.register_put(DATA_MODE_REG, mode).await
    }

    pub async fn set_channel_count(&self, count: u16) -> Result<()> {
        self.device.register_put(CHANNEL_COUNT_REG, count).await
    }

    /// Loads `channels` into the DMX buffer, starts the transfer and waits for it to finish.
    pub async fn send_dmx(&self, channels: &[u8]) -> Result<()> {
        if channels.len() > DMX_CHANNEL_MAX {
            return Err(DeviceError::InvalidInput {
                message: format!(
                    "DMX frame holds at most {} channels, got {}",
                    DMX_CHANNEL_MAX,
                    channels.len()
                ),
            });
        }

        self.device.dmx_put(channels).await?;
        self.device.register_put(SEND_DMX_REG, 0x0001).await?;

        let deadline = Instant::now() + self.poll_timeout;
        let mut polls = 0u32;
        while self.device.register_get(SEND_DMX_REG).await? == 0x0001 {
            polls += 1;
            if Instant::now() >= deadline {
                return Err(DeviceError::Timeout {
                    operation: format!("DMX send after {} polls", polls),
                });
            }
            sleep(self.poll_interval).await;
        }

        tracing::debug!("DMX frame of {} channels sent after {} polls", channels.len(), polls);
        Ok(())
    }

    /// Runs the address programming handshake so the next tile on the line listens at `channel`.
    pub async fn program_address(&self, channel: u16) -> Result<()> {
        let message = address_program_message(channel)?;
        let t = &self.timings;

        tracing::info!("Programming tile to DMX channel {}", channel);

        // Address high, data low while powering up starts programming
        self.set_data_mode(false, false).await?;
        self.set_power(false).await?;
        sleep(t.power_off).await;
        self.set_power(true).await?;
        self.set_data_mode(false, true).await?;
        sleep(t.address_settle).await;

        // Address low for a second enters programming mode
        self.set_data_mode(false, false).await?;
        sleep(t.programming_entry).await;
        self.set_data_mode(false, true).await?;

        self.set_channel_count(3).await?;
        self.send_dmx(&message).await?;
        sleep(t.after_send).await;

        // Tile shows white while both lines are high
        self.set_data_mode(true, true).await?;
        sleep(t.confirm).await;

        self.set_data_mode(false, false).await?;
        self.set_power(false).await?;
        sleep(t.power_cycle).await;
        self.set_power(true).await?;
        self.set_data_mode(true, false).await?;

        Ok(())
    }
}
