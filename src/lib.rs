pub mod annotate;
pub mod batch;
pub mod editor;
pub mod error;
pub mod logging;
pub mod service;
pub mod settings;

pub use annotate::{
    AnnotationSurface, CanvasState, DrawMode, MarkKind, PixelBuffer, Rgba, Shape, SnapshotHistory,
    SurfaceOptions, SurfaceSignal,
};
pub use batch::{BatchEvent, BatchScheduler, Progress, SlidePage, WorkItem, WorkStatus};
pub use editor::{ImageVersion, RegionEditor};
pub use error::{Result, RetouchError};
pub use service::{EditRequest, EditService, HttpEditService};
pub use settings::RetouchSettings;
