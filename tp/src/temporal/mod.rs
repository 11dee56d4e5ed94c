//! Temporal Resolver
//!
//! Turns free-text dates and trip lengths into a consistent, future date range
//! and infers the climate season from the start date.

mod date;
mod duration;
mod resolver;

pub use date::{DateOrder, format_long, parse_date};
pub use duration::{find_duration, parse_duration};
pub use resolver::{Resolution, TemporalInput, TemporalLimits, TemporalResolver};
