pub mod config;
pub mod error;
pub mod managed_path;
pub mod owner;

pub use config::Config;
pub use error::{DyadError, DyadResult};
pub use managed_path::ManagedPath;
pub use owner::OwnerRecord;
