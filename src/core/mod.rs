//! Core application primitives (sessions, supervision, dispatch, HTTP)

pub mod dispatcher;
pub mod http;
pub mod runtime;
pub mod session;
pub mod supervisor;

pub use dispatcher::{DispatchHandle, DispatchItem, DispatchStats, SinkDispatcher};
pub use http::{create_router, start_server, AppState, HealthStatus};
pub use runtime::{ScannerRuntime, ShutdownReport};
pub use session::{SessionState, StreamSession};
pub use supervisor::{
    SessionRegistry, SessionStatus, SessionSupervisor, SupervisorHandle, SupervisorStatus,
};
