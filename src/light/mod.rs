//! Auxiliary output (the capture light).
//!
//! The light is optional. When enabled it is configured once per run,
//! switched on just before capture and switched off as soon as capture
//! ends, successfully or not. [`LightGuard`] enforces the pairing.

mod output;
mod sysfs;

pub use output::{AuxOutput, LightGuard, MockOutput, MockOutputState, OutputError};
pub use sysfs::SysfsOutput;
