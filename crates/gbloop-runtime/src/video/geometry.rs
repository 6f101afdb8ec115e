use super::{LCD_HEIGHT, LCD_WIDTH, Rotation, SurfaceInfo};

/// Runtime scroll requests for surfaces shorter than the emulated screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollCommand {
    Up,
    Down,
    Top,
    Center,
    Bottom,
}

/// Placement of the emulated screen on a surface.
///
/// `width`/`height` are in emulated orientation; when the surface is turned
/// sideways they come from the surface height/width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationGeometry {
    pub canvas_x: usize,
    pub canvas_y: usize,
    pub width: usize,
    pub height: usize,
    /// Emulated rows run along surface columns.
    pub sideways: bool,
    /// Pixel index of the first visible pixel of each destination line.
    offsets: Vec<usize>,
}

impl PresentationGeometry {
    /// Centers the screen on `info`, cropping when the surface is smaller.
    ///
    /// With `intermediate` set the pixels go through a blit buffer instead of
    /// the surface memory, so no offset table is built and rotation is left
    /// to the surface.
    pub fn compute(info: &SurfaceInfo, intermediate: bool) -> Self {
        let sideways =
            !intermediate && matches!(info.rotation, Rotation::Left | Rotation::Right);
        let (ww, hh) = if sideways {
            (info.height, info.width)
        } else {
            (info.width, info.height)
        };

        let (canvas_x, width) = place(ww, LCD_WIDTH);
        let (canvas_y, height) = place(hh, LCD_HEIGHT);

        let offsets = if intermediate {
            Vec::new()
        } else if sideways {
            (0..width)
                .map(|i| (canvas_x + i) * info.stride + canvas_y)
                .collect()
        } else {
            (0..height)
                .map(|i| (canvas_y + i) * info.stride + canvas_x)
                .collect()
        };

        Self {
            canvas_x,
            canvas_y,
            width,
            height,
            sideways,
            offsets,
        }
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn offset(&self, index: usize) -> Option<usize> {
        self.offsets.get(index).copied()
    }

    /// Largest vertical scroll offset.
    pub fn max_scroll(&self) -> usize {
        LCD_HEIGHT.saturating_sub(self.height)
    }

    pub fn can_scroll(&self) -> bool {
        self.height < LCD_HEIGHT
    }

    /// Applies `command` to the current scroll offset.
    pub fn scroll(&self, current: usize, command: ScrollCommand) -> usize {
        let max = self.max_scroll();
        let next = match command {
            ScrollCommand::Up => current.saturating_sub(1),
            ScrollCommand::Down => current + 1,
            ScrollCommand::Top => 0,
            ScrollCommand::Center => max / 2,
            ScrollCommand::Bottom => max,
        };
        next.min(max)
    }
}

fn place(available: usize, needed: usize) -> (usize, usize) {
    if available > needed + 1 {
        ((available - needed) / 2, needed)
    } else {
        (0, available.min(needed))
    }
}
