//! Output path handling
//!
//! Macro-driven path templates and directory provisioning.

pub mod provision;
pub mod template;

pub use provision::{ensure_directory, parent_dir};
pub use template::{resolve, MacroContext};
