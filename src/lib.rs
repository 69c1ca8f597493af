//! Client adaptor for the Virtual Watershed data repository.
//!
//! Builds the watershed JSON and FGDC XML metadata that describe a model-run
//! file, and moves files and metadata to and from the repository over its
//! HTTP API with [`client::VwHttpClient`].

pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod metadata;
pub mod push;
pub mod search;

pub use client::{TransferClient, VwHttpClient, default_vw_client};
pub use config::{ClientOptions, ConfigLoader, Credentials, VwConfig};
pub use domain::{ModelRunUuid, ModelSet};
pub use error::{ErrorKind, VwError};
pub use search::{Record, SearchQuery, SearchResult};
