//! Foundation utilities shared by every other layer.
//!
//! Nothing in here may depend on the rendering or asset layers.

pub mod logging;
pub mod math;
