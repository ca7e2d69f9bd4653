use crate::complex_point::ComplexPoint;
use crate::error::CoreError;
use crate::fixed_point::{FixedPoint, DEFAULT_SCALE};
use crate::precision::{Backend, PrecisionState, Strategy};

/// Zoom never drops below this (the whole set fits the view at zoom 1).
pub const MIN_ZOOM: i64 = 1;

pub const DEFAULT_ITERATIONS: u32 = 1000;
pub const MIN_ITERATIONS: u32 = 100;
pub const MAX_ITERATIONS: u32 = 100_000;

/// Clamp a user-supplied iteration count to the supported range.
#[inline]
pub fn clamp_iterations(value: u32) -> u32 {
    value.clamp(MIN_ITERATIONS, MAX_ITERATIONS)
}

/// Defines the visible region of the complex plane at arbitrary depth.
///
/// The viewport is centred on `center`; `zoom` is the magnification
/// relative to a view four units wide. Centre and zoom are always carried
/// at the current working precision, which is recomputed whenever zoom,
/// size or backend change.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    center: ComplexPoint,
    zoom: FixedPoint,
    width: u32,
    height: u32,
    backend: Backend,
    state: PrecisionState,
}

impl Viewport {
    /// Default view: centred at `-0.5 + 0i` with the full set visible.
    pub fn default_mandelbrot(width: u32, height: u32) -> Self {
        let mut vp = Self {
            center: ComplexPoint::from_f64(-0.5, 0.0, DEFAULT_SCALE),
            zoom: FixedPoint::from_int(MIN_ZOOM, DEFAULT_SCALE),
            width: width.max(1),
            height: height.max(1),
            backend: Backend::Cpu,
            state: PrecisionState {
                precision: DEFAULT_SCALE,
                required_precision_bits: 0,
            },
        };
        vp.update_precision();
        vp
    }

    /// Create a viewport with explicit parameters. Zoom is clamped to
    /// [`MIN_ZOOM`].
    pub fn new(
        center: ComplexPoint,
        zoom: FixedPoint,
        width: u32,
        height: u32,
        backend: Backend,
    ) -> crate::Result<Self> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidViewport {
                reason: format!("dimensions must be > 0, got {width}×{height}"),
            });
        }
        let scale = zoom.scale().max(center.scale());
        let mut vp = Self {
            center: center.with_scale(scale),
            zoom: zoom.with_scale(scale).max(&FixedPoint::from_int(MIN_ZOOM, scale)),
            width,
            height,
            backend,
            state: PrecisionState {
                precision: scale,
                required_precision_bits: 0,
            },
        };
        vp.update_precision();
        Ok(vp)
    }

    /// Build a viewport from decimal strings, e.g. a bookmarked location.
    ///
    /// The zoom is parsed first so that the centre can be parsed directly
    /// at the precision the zoom requires.
    pub fn from_decimal(
        center_re: &str,
        center_im: &str,
        zoom: &str,
        width: u32,
        height: u32,
        backend: Backend,
    ) -> crate::Result<Self> {
        let zoom = FixedPoint::from_decimal_str(zoom, DEFAULT_SCALE)?;
        if zoom.is_negative() || zoom.is_zero() {
            return Err(CoreError::InvalidViewport {
                reason: format!("zoom must be positive, got {zoom}"),
            });
        }
        let precision = PrecisionState::compute(&zoom, width.max(1), backend).precision;
        let center = ComplexPoint::new(
            FixedPoint::from_decimal_str(center_re, precision)?,
            FixedPoint::from_decimal_str(center_im, precision)?,
        );
        Self::new(center, zoom.with_scale(precision), width, height, backend)
    }

    /// Recompute the precision and carry centre and zoom at it.
    fn update_precision(&mut self) {
        self.state = PrecisionState::compute(&self.zoom, self.width, self.backend);
        let precision = self.state.precision;
        self.zoom = self.zoom.with_scale(precision);
        self.center = self.center.with_scale(precision);
    }

    #[inline]
    pub fn center(&self) -> &ComplexPoint {
        &self.center
    }

    #[inline]
    pub fn zoom(&self) -> &FixedPoint {
        &self.zoom
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    #[inline]
    pub fn precision_state(&self) -> PrecisionState {
        self.state
    }

    #[inline]
    pub fn precision(&self) -> u32 {
        self.state.precision
    }

    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.state.strategy()
    }

    pub fn set_center(&mut self, center: ComplexPoint) {
        self.center = center;
        self.update_precision();
    }

    pub fn set_zoom(&mut self, zoom: FixedPoint) {
        let min = FixedPoint::from_int(MIN_ZOOM, zoom.scale());
        self.zoom = zoom.max(&min);
        self.update_precision();
    }

    pub fn set_backend(&mut self, backend: Backend) {
        self.backend = backend;
        self.update_precision();
    }

    pub fn resize(&mut self, width: u32, height: u32) -> crate::Result<()> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidViewport {
                reason: format!("dimensions must be > 0, got {width}×{height}"),
            });
        }
        self.width = width;
        self.height = height;
        self.update_precision();
        Ok(())
    }

    /// Map a canvas coordinate to the complex plane.
    ///
    /// `(0, 0)` is the top-left corner; pixel-y grows downward together
    /// with the imaginary part. Coordinates outside the canvas are valid.
    pub fn canvas_to_complex(&self, x: i64, y: i64) -> ComplexPoint {
        let p = self.state.precision;
        let w = FixedPoint::from_int(self.width as i64, p);
        let h = FixedPoint::from_int(self.height as i64, p);
        let two = FixedPoint::from_int(2, p);
        let scale = self.zoom.multiply(&w).divide(&FixedPoint::from_int(4, p));

        let re = FixedPoint::from_int(x, p)
            .subtract(&w.divide(&two))
            .divide(&scale);
        let im = FixedPoint::from_int(y, p)
            .subtract(&h.divide(&two))
            .divide(&scale);
        ComplexPoint::new(re.add(&self.center.re), im.add(&self.center.im))
    }

    /// Frame corners for a level whose pixels are `pixel_size` canvas
    /// pixels wide: the canvas origin and the canvas size rounded up to a
    /// whole number of level pixels.
    pub fn frame_corners(&self, pixel_size: u32) -> (ComplexPoint, ComplexPoint) {
        let ps = pixel_size.max(1);
        let right = self.width.div_ceil(ps) * ps;
        let bottom = self.height.div_ceil(ps) * ps;
        (
            self.canvas_to_complex(0, 0),
            self.canvas_to_complex(right as i64, bottom as i64),
        )
    }

    /// Multiply the zoom by `factor`, keeping the point under canvas
    /// position `(x, y)` fixed. Returns `false` when already at
    /// [`MIN_ZOOM`] and asked to zoom out.
    pub fn zoom_at(&mut self, x: i64, y: i64, factor: f64) -> bool {
        let p = self.state.precision;
        let lower = FixedPoint::from_int(MIN_ZOOM, p);
        if self.zoom.leq(&lower) && factor < 1.0 {
            return false;
        }

        let anchor = self.canvas_to_complex(x, y);
        let zoomed = self.zoom.multiply(&FixedPoint::from_f64(factor, p));
        self.zoom = zoomed.max(&lower);
        self.update_precision();

        let p = self.state.precision;
        let anchor = anchor.with_scale(p);
        let drifted = self.canvas_to_complex(x, y);
        self.center = self.center.add(&anchor.subtract(&drifted));
        true
    }

    /// Move the view so that the image shifts by `(dx, dy)` canvas pixels,
    /// as when dragging.
    pub fn pan_pixels(&mut self, dx: i64, dy: i64) {
        let origin = self.canvas_to_complex(0, 0);
        let moved = self.canvas_to_complex(dx, dy);
        self.center = self.center.add(&origin.subtract(&moved));
    }

    /// Human-readable zoom such as `3.14e15`.
    pub fn zoom_label(&self) -> String {
        let integer = (self.zoom.mantissa() >> self.zoom.scale() as usize).to_string();
        if integer.len() <= 3 {
            return integer;
        }
        format!("{}.{}e{}", &integer[..1], &integer[1..3], integer.len() - 1)
    }
}
