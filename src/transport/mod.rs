//! HTTP + SSE transport
//!
//! Session registry, request routing, the access gate, and the axum front.

pub mod app;
pub mod gate;
pub mod registry;
pub mod router;
pub mod sse;

pub use app::{build_router, serve, Application};
pub use gate::AccessGate;
pub use registry::{SessionId, SessionRegistry, SharedSessionRegistry};
pub use router::RequestRouter;
pub use sse::AppState;
