// src/config/mod.rs

//! Configuration loading and validation for watchtest.
//!
//! - `model.rs`: the TOML-backed data model and the validated [`EngineConfig`].
//! - `loader.rs`: read a config file and resolve paths against the watch root.
//! - `validate.rs`: semantic checks (unique names, references, cycles).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_path, default_config, load_and_validate, load_from_path};
pub use model::{
    BuildSection, EngineConfig, EngineSection, ExtensionConfig, ProjectConfig, RawConfigFile,
    RunnerConfig, RunnersSection,
};
