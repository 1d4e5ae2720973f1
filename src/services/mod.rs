pub mod capture;
pub mod geometry;
pub mod markdown;
pub mod readiness;
pub mod request;
pub mod source;

pub use capture::{CaptureGuard, CaptureService, FileSuffix};
pub use markdown::MarkdownConverter;
pub use readiness::{Readiness, ReadinessCoordinator, ReadyObserver};
pub use source::SourceResolver;
