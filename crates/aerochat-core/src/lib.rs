pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AeroConfig;
pub use error::{AeroError, Result};
pub use types::*;
