//! Frame presentation.
//!
//! The engine hands over one line of shade indices (0..=3) at a time. The
//! compositor converts it for the display surface, honoring rotation,
//! cropping and the vertical scroll window of short displays.

mod geometry;
mod presenter;
mod surface;

pub use geometry::{PresentationGeometry, ScrollCommand};
pub use presenter::{L4_COLORS, PresenterKind, XRGB_COLORS};
pub use surface::{DisplaySurface, L4Bitmap, MemorySurface, PixelFormat, Rotation, SurfaceInfo};

use presenter::Presenter;
use tracing::debug;

use crate::{engine::LineSink, runtime::RuntimeError};

pub const LCD_WIDTH: usize = 160;
pub const LCD_HEIGHT: usize = 144;

pub struct Compositor<S> {
    surface: S,
    presenter: Presenter,
    geometry: PresentationGeometry,
    force_safe: bool,
    yskip: usize,
}

fn configure<S: DisplaySurface>(
    surface: &mut S,
    force_safe: bool,
) -> Result<(Presenter, PresentationGeometry), RuntimeError> {
    let info = surface.info();
    if info.width == 0 || info.height == 0 || info.stride < info.width {
        return Err(RuntimeError::UnsupportedSurface {
            width: info.width,
            height: info.height,
        });
    }

    let has_direct_pixels = surface.xrgb_pixels_mut().is_some();
    let presenter = Presenter::select(&info, has_direct_pixels, force_safe);
    let geometry = PresentationGeometry::compute(&info, presenter.uses_intermediate());
    debug!(
        presenter = ?presenter.kind(),
        width = geometry.width,
        height = geometry.height,
        canvas_x = geometry.canvas_x,
        canvas_y = geometry.canvas_y,
        "compositor configured"
    );
    Ok((presenter, geometry))
}

impl<S: DisplaySurface> Compositor<S> {
    /// Picks the presenter for `surface`. `force_safe` always selects the
    /// full-frame gray buffer.
    pub fn new(mut surface: S, force_safe: bool) -> Result<Self, RuntimeError> {
        let (presenter, geometry) = configure(&mut surface, force_safe)?;
        Ok(Self {
            surface,
            presenter,
            geometry,
            force_safe,
            yskip: 0,
        })
    }

    /// Re-reads the surface after its size, format or rotation changed.
    pub fn reconfigure(&mut self) -> Result<(), RuntimeError> {
        let (presenter, geometry) = configure(&mut self.surface, self.force_safe)?;
        self.presenter = presenter;
        self.geometry = geometry;
        self.yskip = self.yskip.min(self.geometry.max_scroll());
        Ok(())
    }

    pub fn present_scanline(&mut self, pixels: &[u8; LCD_WIDTH], line: usize) {
        let Some(row) = line.checked_sub(self.yskip) else {
            return;
        };
        if row >= self.geometry.height {
            return;
        }
        self.presenter
            .draw(&mut self.surface, &self.geometry, pixels, row);
    }

    /// Ends a frame. Only buffered presenters have anything to push.
    pub fn flush(&mut self) {
        self.presenter.flush(&mut self.surface, &self.geometry);
    }

    pub fn scroll(&mut self, command: ScrollCommand) {
        if self.geometry.can_scroll() {
            self.yskip = self.geometry.scroll(self.yskip, command);
        }
    }

    pub fn can_scroll(&self) -> bool {
        self.geometry.can_scroll()
    }

    pub fn yskip(&self) -> usize {
        self.yskip
    }

    pub fn overlay(&mut self, text: &str) {
        self.surface.draw_overlay(text);
    }

    pub fn presenter_kind(&self) -> PresenterKind {
        self.presenter.kind()
    }

    pub fn geometry(&self) -> &PresentationGeometry {
        &self.geometry
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

impl<S: DisplaySurface> LineSink for Compositor<S> {
    fn draw_line(&mut self, pixels: &[u8; LCD_WIDTH], line: usize) {
        self.present_scanline(pixels, line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripe(shade: u8) -> [u8; LCD_WIDTH] {
        [shade; LCD_WIDTH]
    }

    fn draw_frame<S: DisplaySurface>(compositor: &mut Compositor<S>) {
        for line in 0..LCD_HEIGHT {
            compositor.present_scanline(&stripe((line % 4) as u8), line);
        }
        compositor.flush();
    }

    #[test]
    fn xrgb_frame_is_centered() {
        let surface = MemorySurface::new(320, 240, PixelFormat::Xrgb8888, Rotation::Up);
        let mut compositor = Compositor::new(surface, false).unwrap();
        assert_eq!(compositor.presenter_kind(), PresenterKind::Xrgb);

        draw_frame(&mut compositor);

        let surface = compositor.surface();
        assert_eq!(surface.pixel(79, 48), Some(0));
        assert_eq!(surface.pixel(80, 48), Some(XRGB_COLORS[0]));
        assert_eq!(surface.pixel(80, 49), Some(XRGB_COLORS[1]));
        assert_eq!(surface.pixel(239, 191), Some(XRGB_COLORS[3]));
        assert_eq!(surface.pixel(240, 191), Some(0));
    }

    #[test]
    fn short_l4_display_blits_only_the_scroll_window() {
        let surface = MemorySurface::new(240, 96, PixelFormat::L4, Rotation::Up);
        let mut compositor = Compositor::new(surface, false).unwrap();
        assert_eq!(compositor.presenter_kind(), PresenterKind::L4Line);

        compositor.scroll(ScrollCommand::Bottom);
        assert_eq!(compositor.yskip(), 48);
        draw_frame(&mut compositor);

        let surface = compositor.surface();
        assert_eq!(surface.blit_count(), 96);
        // Line 48 (shade 0) lands on the first row.
        assert_eq!(surface.pixel(40, 0), Some(u32::from(L4_COLORS[0])));
        assert_eq!(surface.pixel(40, 1), Some(u32::from(L4_COLORS[1])));
    }

    #[test]
    fn safe_frame_blits_once_per_frame() {
        let surface = MemorySurface::new(320, 240, PixelFormat::Xrgb8888, Rotation::Up);
        let mut compositor = Compositor::new(surface, true).unwrap();
        assert_eq!(compositor.presenter_kind(), PresenterKind::SafeFrame);

        draw_frame(&mut compositor);

        let surface = compositor.surface();
        assert_eq!(surface.blit_count(), 1);
        assert_eq!(surface.pixel(80, 48), Some(0xffff_ffff));
        assert_eq!(surface.pixel(80, 51), Some(0xff00_0000));
    }

    #[test]
    fn scroll_is_ignored_on_tall_displays() {
        let surface = MemorySurface::new(160, 144, PixelFormat::Xrgb8888, Rotation::Up);
        let mut compositor = Compositor::new(surface, false).unwrap();
        compositor.scroll(ScrollCommand::Down);
        assert_eq!(compositor.yskip(), 0);
    }

    #[test]
    fn rotation_change_picks_new_presenter() {
        let surface = MemorySurface::new(240, 320, PixelFormat::Xrgb8888, Rotation::Up);
        let mut compositor = Compositor::new(surface, false).unwrap();
        assert_eq!(compositor.presenter_kind(), PresenterKind::Xrgb);

        compositor.surface_mut().set_rotation(Rotation::Left);
        compositor.reconfigure().unwrap();
        assert_eq!(compositor.presenter_kind(), PresenterKind::XrgbRotated);
        assert!(compositor.geometry().sideways);
    }

    #[test]
    fn empty_surface_is_rejected() {
        let surface = MemorySurface::new(0, 0, PixelFormat::L4, Rotation::Up);
        assert!(matches!(
            Compositor::new(surface, false),
            Err(RuntimeError::UnsupportedSurface { .. })
        ));
    }
}
