pub mod error;
pub mod model;
pub mod quality;

pub use error::AppError;
pub use model::{
    DisplayCount, DownloadRequest, ProgressState, SavePlan, StreamPhase, VideoInfo, VideoPreview,
};
pub use quality::{Quality, QualityOption, QualityPolicy};
