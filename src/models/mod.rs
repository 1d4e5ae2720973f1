pub mod loaders;
pub mod manifest;
pub mod output;
pub mod page_size;
pub mod render_config;

pub use loaders::{load_all_manifests, load_manifest, load_render_config};
pub use manifest::JobManifest;
pub use output::{CaptureResult, JobReport, OutputKind};
pub use page_size::{Dimensions, Orientation, PageSize};
pub use render_config::RenderConfig;
