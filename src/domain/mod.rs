//! Domain models for ect
//!
//! Values, datasets, time periods and progress reporting, without any I/O.

mod monitor;
mod period;
mod value;

pub use monitor::{ConsoleMonitor, Monitor, NullMonitor};
pub use period::{parse_time_period, DateRange, Granularity};
pub use value::{Dataset, Value, Variable};
