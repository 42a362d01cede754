use crate::domain::model::{BITMAP_HEIGHT, BITMAP_LEN, BITMAP_WIDTH};
use crate::utils::error::{DeviceError, Result};
use rand::Rng;

/// Frame buffer for the CM-2 panel: 8-bit grayscale, row-major, top-left origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pixels: Vec<u8>,
}

impl Default for Bitmap {
    fn default() -> Self {
        Self::new()
    }
}

impl Bitmap {
    pub fn new() -> Self {
        Self {
            pixels: vec![0; BITMAP_LEN],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != BITMAP_LEN {
            return Err(DeviceError::InvalidInput {
                message: format!(
                    "bitmap must be exactly {} bytes ({}x{}), got {}",
                    BITMAP_LEN,
                    BITMAP_WIDTH,
                    BITMAP_HEIGHT,
                    bytes.len()
                ),
            });
        }
        Ok(Self {
            pixels: bytes.to_vec(),
        })
    }

    /// Every pixel drawn uniformly from `0..=max`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, max: u8) -> Self {
        let pixels = (0..BITMAP_LEN).map(|_| rng.gen_range(0..=max)).collect();
        Self { pixels }
    }

    fn index(x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= BITMAP_WIDTH || y >= BITMAP_HEIGHT {
            return None;
        }
        Some(y * BITMAP_WIDTH + x)
    }

    pub fn get(&self, x: i32, y: i32) -> Option<u8> {
        Self::index(x, y).map(|i| self.pixels[i])
    }

    /// Off-panel coordinates are ignored.
    pub fn set(&mut self, x: i32, y: i32, value: u8) {
        if let Some(i) = Self::index(x, y) {
            self.pixels[i] = value;
        }
    }

    pub fn fill(&mut self, value: u8) {
        self.pixels.iter_mut().for_each(|p| *p = value);
    }

    /// Bresenham line between two inclusive end points, clipped to the panel.
    pub fn draw_line(&mut self, from: (i32, i32), to: (i32, i32), value: u8) {
        let (mut x, mut y) = from;
        let (x1, y1) = to;
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.set(x, y, value);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }
}

/// Frame `step` of the sweeping-diagonal demo; `step` wraps every panel width.
pub fn sweep_frame(step: usize) -> Bitmap {
    let x = (step % BITMAP_WIDTH) as i32;
    let last_col = BITMAP_WIDTH as i32 - 1;
    let last_row = BITMAP_HEIGHT as i32 - 1;
    let intensity = (x as f64 / BITMAP_WIDTH as f64 * 50.0) as u8;

    let mut frame = Bitmap::new();
    frame.draw_line((x, 0), (last_col - x, last_row), intensity);
    frame
}
