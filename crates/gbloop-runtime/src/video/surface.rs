use serde::{Deserialize, Serialize};

/// Pixel layout of a display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PixelFormat {
    /// 4-bit grayscale, two pixels per byte, high nibble first.
    L4,
    /// 32-bit `0xAARRGGBB`, directly addressable.
    Xrgb8888,
    Rgb565,
}

/// Where the top of the emulated screen points on the physical display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rotation {
    #[default]
    Up,
    Left,
    Down,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceInfo {
    pub width: usize,
    pub height: usize,
    /// Pixels between the starts of two consecutive rows.
    pub stride: usize,
    pub format: PixelFormat,
    pub rotation: Rotation,
}

/// A packed 4-bit grayscale image used as an intermediate buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L4Bitmap {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl L4Bitmap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width.div_ceil(2) * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn row_bytes(&self) -> usize {
        self.width.div_ceil(2)
    }

    pub fn row(&self, y: usize) -> &[u8] {
        let len = self.row_bytes();
        &self.data[y * len..(y + 1) * len]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let len = self.row_bytes();
        &mut self.data[y * len..(y + 1) * len]
    }

    /// Gray level (0..=15) of one pixel.
    pub fn get(&self, x: usize, y: usize) -> u8 {
        let byte = self.row(y)[x / 2];
        if x % 2 == 0 { byte >> 4 } else { byte & 0x0f }
    }
}

/// The physical display the compositor draws into.
pub trait DisplaySurface {
    fn info(&self) -> SurfaceInfo;

    /// Direct access to the pixel storage of an `Xrgb8888` surface.
    ///
    /// Surfaces that can only be drawn through blits return `None`.
    fn xrgb_pixels_mut(&mut self) -> Option<&mut [u32]>;

    /// Copies the top-left `width`x`height` area of `src` to (`x`, `y`).
    fn blit_l4(&mut self, src: &L4Bitmap, x: usize, y: usize, width: usize, height: usize);

    /// Draws a short status text at the surface origin.
    fn draw_overlay(&mut self, _text: &str) {}
}

/// Display surface backed by host memory.
///
/// Every pixel is stored as its native value: a gray nibble for `L4`, a
/// 32-bit color for `Xrgb8888`, a 16-bit color for `Rgb565`.
#[derive(Debug, Clone)]
pub struct MemorySurface {
    info: SurfaceInfo,
    pixels: Vec<u32>,
    blits: u64,
    overlay: Option<String>,
}

impl MemorySurface {
    pub fn new(width: usize, height: usize, format: PixelFormat, rotation: Rotation) -> Self {
        Self {
            info: SurfaceInfo {
                width,
                height,
                stride: width,
                format,
                rotation,
            },
            pixels: vec![0; width * height],
            blits: 0,
            overlay: None,
        }
    }

    /// Native value at physical coordinates, `None` outside the surface.
    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x >= self.info.width || y >= self.info.height {
            return None;
        }
        self.pixels.get(y * self.info.stride + x).copied()
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn blit_count(&self) -> u64 {
        self.blits
    }

    pub fn overlay(&self) -> Option<&str> {
        self.overlay.as_deref()
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.info.rotation = rotation;
    }
}

fn l4_to_native(level: u8, format: PixelFormat) -> u32 {
    let level = u32::from(level & 0x0f);
    match format {
        PixelFormat::L4 => level,
        PixelFormat::Xrgb8888 => {
            let gray = level * 0x11;
            0xff00_0000 | (gray << 16) | (gray << 8) | gray
        }
        PixelFormat::Rgb565 => {
            let gray = level * 0x11;
            ((gray >> 3) << 11) | ((gray >> 2) << 5) | (gray >> 3)
        }
    }
}

impl DisplaySurface for MemorySurface {
    fn info(&self) -> SurfaceInfo {
        self.info
    }

    fn xrgb_pixels_mut(&mut self) -> Option<&mut [u32]> {
        (self.info.format == PixelFormat::Xrgb8888).then_some(self.pixels.as_mut_slice())
    }

    fn blit_l4(&mut self, src: &L4Bitmap, x: usize, y: usize, width: usize, height: usize) {
        self.blits += 1;
        let format = self.info.format;
        for sy in 0..height.min(src.height()) {
            let dy = y + sy;
            if dy >= self.info.height {
                break;
            }
            for sx in 0..width.min(src.width()) {
                let dx = x + sx;
                if dx >= self.info.width {
                    break;
                }
                self.pixels[dy * self.info.stride + dx] = l4_to_native(src.get(sx, sy), format);
            }
        }
    }

    fn draw_overlay(&mut self, text: &str) {
        self.overlay = Some(text.to_string());
    }
}
