pub mod history;
pub mod mask;
pub mod model;
pub mod surface;

pub use history::SnapshotHistory;
pub use model::{CanvasState, MarkKind, PixelBuffer, Rgba, Shape};
pub use surface::{AnnotationSurface, DrawMode, SurfaceOptions, SurfaceSignal};
