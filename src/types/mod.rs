// ABOUTME: Validated domain types shared by config, cluster, and deploy modules.
// ABOUTME: Invalid app names, versions, and image references are rejected at parse time.

mod app_name;
mod color;
mod image_ref;
mod version;

pub use app_name::{AppName, AppNameError};
pub use color::{Color, ParseColorError};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use version::{Version, VersionError};
