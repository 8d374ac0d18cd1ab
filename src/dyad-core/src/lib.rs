pub mod barrier;
pub mod context;
pub mod lifecycle;
pub mod publish;
pub mod subscribe;

pub use context::{is_reentrant, shared_state, ReentryGuard, SharedState};
pub use publish::publish;
pub use subscribe::subscribe;
