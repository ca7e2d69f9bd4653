/// Default tile edge in level pixels.
pub const TILE_SIZE: u32 = 32;

/// Level pixel sizes from coarsest to finest.
pub const DEFAULT_LEVEL_PIXEL_SIZES: [u32; 5] = [16, 8, 4, 2, 1];

/// A rectangular tile within a level raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Level-pixel x of the top-left corner.
    pub x: u32,
    /// Level-pixel y of the top-left corner.
    pub y: u32,
    /// Tile width (may be smaller at the right edge).
    pub width: u32,
    /// Tile height (may be smaller at the bottom edge).
    pub height: u32,
}

impl Tile {
    /// Number of pixels in this tile.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// One refinement pass of a job: the canvas sampled every `pixel_size`
/// canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub index: usize,
    pub pixel_size: u32,
    /// `ceil(canvas_width / pixel_size)`.
    pub width: u32,
    /// `ceil(canvas_height / pixel_size)`.
    pub height: u32,
}

impl Level {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the even/even pixels of this level coincide with the pixels
    /// of `previous`, so they can be copied instead of computed.
    pub fn refines(&self, previous: &Level) -> bool {
        previous.pixel_size == self.pixel_size * 2
    }
}

/// Levels for a `canvas_width × canvas_height` canvas, in the given order.
pub fn plan_levels(canvas_width: u32, canvas_height: u32, pixel_sizes: &[u32]) -> Vec<Level> {
    pixel_sizes
        .iter()
        .enumerate()
        .map(|(index, &pixel_size)| Level {
            index,
            pixel_size,
            width: canvas_width.div_ceil(pixel_size),
            height: canvas_height.div_ceil(pixel_size),
        })
        .collect()
}

/// Build a grid of `tile_size` tiles covering a `width × height` raster.
pub fn build_tile_grid(width: u32, height: u32, tile_size: u32) -> Vec<Tile> {
    let tile_size = tile_size.max(1);
    let mut tiles = Vec::new();
    let mut y = 0;
    while y < height {
        let th = tile_size.min(height - y);
        let mut x = 0;
        while x < width {
            let tw = tile_size.min(width - x);
            tiles.push(Tile {
                x,
                y,
                width: tw,
                height: th,
            });
            x += tw;
        }
        y += th;
    }
    tiles
}
