//! Time ports: wall clock and lead-local business windows.

mod business_hours;
mod clock;

pub use business_hours::{BusinessHoursService, TimezoneService};
pub use clock::{Clock, FixedClock, SystemClock};
