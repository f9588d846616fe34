pub mod endpoint;
pub mod logging;
pub mod service;
pub mod signals;
pub mod telemetry;

pub use endpoint::*;
pub use logging::*;
pub use service::*;
pub use signals::*;
pub use telemetry::*;
