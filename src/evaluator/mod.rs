pub mod tracing;
pub mod unix_socket;

pub use self::tracing::TracingEvaluator;
pub use unix_socket::UnixSocketEvaluator;
