pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{AuthMode, Config, FrameworkMapping};
pub use error::{Error, Result};
pub use paths::{OutputLayout, Paths};
pub use types::{slugify, CategoryInfo, CodeVariants, ComponentRecord, Framework};
