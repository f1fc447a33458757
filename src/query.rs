pub mod dates;
pub mod filter;
pub mod metrics;
pub mod recurrence;
