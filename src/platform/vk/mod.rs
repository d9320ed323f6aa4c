mod client;
mod config;
mod error;
mod models;

pub use client::VkPlatformClient;
pub use config::VkConfig;
pub use error::{VkApiError, VkResult};
