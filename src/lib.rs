pub mod config;
pub mod metrics;
pub mod monitor;
pub mod proxy;
pub mod shield;

pub use config::*;
pub use metrics::*;
pub use monitor::*;
pub use proxy::*;
pub use shield::*;
