pub mod error;
pub mod geo;
pub mod geometry;
pub mod gpx_io;
pub mod path_id;
pub mod planning;
pub mod playback;
pub mod presenter;
pub mod registry;
pub mod render;
pub mod selection;
pub mod surface;
pub mod viewer;

pub use error::{Result, ViewerError};
pub use geometry::{Coordinate, RouteGeometry, RoutePayload, normalize};
pub use path_id::PathId;
pub use playback::{
    CameraMode, PlaybackConfig, PlaybackState, PlaybackStatus, TickHandle, TickScheduler,
    TickToken,
};
pub use registry::PathEntry;
pub use selection::Statistics;
pub use surface::MapSurface;
pub use viewer::{PlaybackControl, PointInfo, RouteViewer};
