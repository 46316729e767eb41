#![doc = "sceneformat-builder: HTTP build trigger for generated scene-format sources."]

//! A `POST <prefix>/cpp?branch=<name>&version=<label>` request clones the schema
//! repository at `branch`, runs the schema compiler, zips the generated sources and
//! publishes the zip twice: under a versioned key and under a fixed "latest" key.
//!
//! # Layout
//! - [`server`] / [`request`]: HTTP routing, validation and status mapping
//! - [`pipeline`]: step sequencing, per-build workspaces, concurrency bound
//! - [`fetch`], [`generate`], [`archive`], [`upload`]: the individual steps
//! - [`contract`]: traits the steps sit behind, with `mockall` mocks
//! - [`config`], [`load_config`], [`cli`]: startup configuration

pub mod archive;
pub mod cli;
pub mod command;
pub mod config;
pub mod contract;
pub mod fetch;
pub mod generate;
pub mod load_config;
pub mod pipeline;
pub mod request;
pub mod server;
pub mod upload;
