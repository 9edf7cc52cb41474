//! # Recipient Validation
//!
//! Turns user-entered phone numbers into the canonical recipient address used
//! as rate-limit key and log identity. Equivalent spellings of one number
//! always normalize to the same address.

mod regions;
mod validator;

pub use regions::{
    region_by_tag, LineType, NumberPattern, Region, INDONESIA, REGIONS, TURKEY, UNITED_STATES,
};
pub use validator::{PhoneValidation, PhoneValidator};
