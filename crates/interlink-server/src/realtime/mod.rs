//! Realtime chat over WebSocket.

pub mod dispatcher;
pub mod reconciler;
pub mod registry;
pub mod session;

pub use dispatcher::MessageDispatcher;
pub use reconciler::ReadStateReconciler;
pub use registry::ConnectionRegistry;
