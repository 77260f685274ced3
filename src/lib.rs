pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::adapters::{http::HttpFetcher, storage::LocalStorage};
pub use crate::app::pipelines::iana_pipeline::IanaPipeline;
pub use crate::config::{toml_config::TomlConfig, Settings};
pub use crate::core::{etl::EtlEngine, transform::Transformer};
pub use crate::utils::error::{IanaError, Result};
