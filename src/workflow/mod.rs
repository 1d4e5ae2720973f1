pub mod resource_ctx;
pub mod resource_flow;

pub use resource_ctx::ResourceCtx;
pub use resource_flow::ResourceFlow;
