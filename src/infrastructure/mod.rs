//! 基础设施层：持有渲染引擎等稀缺资源，只暴露能力

pub mod chromium;
pub mod engine;
pub mod js_executor;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod session;
pub mod signal_bus;

pub use chromium::{ChromiumEngine, ChromiumWindow};
pub use engine::{CaptureRequest, CookieSpec, PdfOptions, RenderEngine, RenderWindow, WindowConfig};
pub use js_executor::JsExecutor;
pub use session::RendererSession;
pub use signal_bus::{ReadySignal, SignalBus, SignalSubscription, SIGNAL_BINDING};
