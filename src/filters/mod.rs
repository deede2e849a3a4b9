pub mod error;
pub mod manager;
pub mod memory;
pub mod ports;
pub mod types;

pub use error::{FilterError, FilterErrorKind};
pub use manager::FilterManager;
pub use memory::InMemoryFilterServices;
pub use ports::FilterServicePort;
pub use types::{FilterCall, FilterDescriptor, FilterKind, FilterProxies, service_path};
