//! Field Validator
//!
//! Accepts or rejects each candidate value independently, reconciles the
//! temporal fields, and merges the result into the trip through
//! [`TripRequest::merge`]. Rejections become messages, never errors.

pub mod fuzzy;
pub mod gazetteer;
mod validator;

pub use validator::{FieldValidator, ValidationContext};
