pub mod cancel;
pub mod complex_point;
pub mod engine;
pub mod error;
pub mod ext_float;
pub mod fixed_point;
pub mod iteration;
pub mod mandelbrot;
pub mod orbit;
pub mod perturbation;
pub mod precision;
pub mod reference_cache;
pub mod smoothing;
pub mod task;
pub mod viewport;

// Re-export primary types for convenience.
pub use cancel::{JobToken, RenderCancel, StopCheck};
pub use complex_point::ComplexPoint;
pub use engine::TileEngine;
pub use error::CoreError;
pub use ext_float::{ExtComplex, ExtFloat};
pub use fixed_point::FixedPoint;
pub use iteration::{IterationParams, IterationResult};
pub use mandelbrot::Mandelbrot;
pub use orbit::{compute_orbit, HighPrecisionOrbit, OrbitSample};
pub use perturbation::{GlitchKind, PerturbationResult};
pub use precision::{Backend, PrecisionState, Strategy};
pub use reference_cache::{ReferenceCache, ReferencePoint};
pub use task::{Answer, Task, TaskStats};
pub use viewport::Viewport;

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
