use super::{
    DisplaySurface, L4Bitmap, LCD_HEIGHT, LCD_WIDTH, PixelFormat, PresentationGeometry, Rotation,
    SurfaceInfo,
};

/// Shade index → 4-bit gray level.
pub const L4_COLORS: [u8; 4] = [0xf, 0xa, 0x5, 0x0];
/// Shade index → 32-bit color.
pub const XRGB_COLORS: [u32; 4] = [0xffff_ffff, 0xffaa_aaaa, 0xff55_5555, 0xff00_0000];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterKind {
    /// Writes straight into 32-bit surface memory.
    Xrgb,
    /// Same, with coordinates remapped for a turned display.
    XrgbRotated,
    /// Packs each line into a 160x1 gray buffer and blits it immediately.
    L4Line,
    /// Packs the whole frame into a gray buffer and blits it once per frame.
    SafeFrame,
}

/// Scanline writer picked once per surface configuration.
#[derive(Debug, Clone)]
pub(crate) enum Presenter {
    Xrgb,
    XrgbRotated(Rotation),
    L4Line(L4Bitmap),
    SafeFrame(L4Bitmap),
}

impl Presenter {
    pub(crate) fn select(info: &SurfaceInfo, has_direct_pixels: bool, force_safe: bool) -> Self {
        match info.format {
            PixelFormat::Xrgb8888 if has_direct_pixels && !force_safe => {
                if info.rotation == Rotation::Up {
                    Self::Xrgb
                } else {
                    Self::XrgbRotated(info.rotation)
                }
            }
            PixelFormat::L4 if !force_safe => Self::L4Line(L4Bitmap::new(LCD_WIDTH, 1)),
            _ => Self::SafeFrame(L4Bitmap::new(LCD_WIDTH, LCD_HEIGHT)),
        }
    }

    pub(crate) fn kind(&self) -> PresenterKind {
        match self {
            Self::Xrgb => PresenterKind::Xrgb,
            Self::XrgbRotated(_) => PresenterKind::XrgbRotated,
            Self::L4Line(_) => PresenterKind::L4Line,
            Self::SafeFrame(_) => PresenterKind::SafeFrame,
        }
    }

    pub(crate) fn uses_intermediate(&self) -> bool {
        matches!(self, Self::L4Line(_) | Self::SafeFrame(_))
    }

    /// Writes emulated line `line`, already known to be inside the scroll
    /// window, as visible row `row`.
    pub(crate) fn draw<S: DisplaySurface>(
        &mut self,
        surface: &mut S,
        geometry: &PresentationGeometry,
        pixels: &[u8; LCD_WIDTH],
        row: usize,
    ) {
        match self {
            Self::Xrgb => {
                let Some(base) = geometry.offset(row) else {
                    return;
                };
                let Some(buf) = surface.xrgb_pixels_mut() else {
                    return;
                };
                for (x, &shade) in pixels.iter().take(geometry.width).enumerate() {
                    if let Some(px) = buf.get_mut(base + x) {
                        *px = XRGB_COLORS[usize::from(shade & 3)];
                    }
                }
            }
            Self::XrgbRotated(rotation) => {
                let Some(buf) = surface.xrgb_pixels_mut() else {
                    return;
                };
                let (w, h) = (geometry.width, geometry.height);
                for (x, &shade) in pixels.iter().take(w).enumerate() {
                    let index = match rotation {
                        Rotation::Up => geometry.offset(row).map(|o| o + x),
                        Rotation::Left => geometry.offset(w - 1 - x).map(|o| o + row),
                        Rotation::Down => geometry.offset(h - 1 - row).map(|o| o + (w - 1 - x)),
                        Rotation::Right => geometry.offset(x).map(|o| o + (h - 1 - row)),
                    };
                    if let Some(px) = index.and_then(|i| buf.get_mut(i)) {
                        *px = XRGB_COLORS[usize::from(shade & 3)];
                    }
                }
            }
            Self::L4Line(line_buf) => {
                pack_l4(line_buf.row_mut(0), pixels, geometry.width);
                surface.blit_l4(
                    line_buf,
                    geometry.canvas_x & !1,
                    geometry.canvas_y + row,
                    LCD_WIDTH,
                    1,
                );
            }
            Self::SafeFrame(frame) => {
                pack_l4(frame.row_mut(row), pixels, LCD_WIDTH);
            }
        }
    }

    /// Pushes buffered pixels to the surface at the end of a frame.
    pub(crate) fn flush<S: DisplaySurface>(
        &mut self,
        surface: &mut S,
        geometry: &PresentationGeometry,
    ) {
        if let Self::SafeFrame(frame) = self {
            surface.blit_l4(
                frame,
                geometry.canvas_x,
                geometry.canvas_y,
                geometry.width,
                geometry.height,
            );
        }
    }
}

/// Packs shades two per byte, high nibble first, up to `width` pixels.
fn pack_l4(out: &mut [u8], pixels: &[u8; LCD_WIDTH], width: usize) {
    for (byte, pair) in out.iter_mut().zip(pixels.chunks_exact(2)).take(width.div_ceil(2)) {
        *byte = (L4_COLORS[usize::from(pair[0] & 3)] << 4) | L4_COLORS[usize::from(pair[1] & 3)];
    }
}
