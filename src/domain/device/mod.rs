//! Device negotiation domain module

mod constraints;
mod form_factor;

pub use constraints::{ConstraintProfile, InputDeviceOption};
pub use form_factor::{ClientHints, FormFactor, MOBILE_MAX_VIEWPORT_WIDTH};
