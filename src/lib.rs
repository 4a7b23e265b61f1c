//! RIPE Atlas provider plugin.
//!
//! Exposes the [RIPE Atlas](https://atlas.ripe.net) measurement network to an
//! infrastructure-as-code host:
//!
//! - **`ripe-atlas_measurement` resource**: schedules a ping measurement and
//!   stops it on destroy
//! - **`ripe-atlas_credits` data source**: the account's credit balance
//! - **`ripe-atlas_measurement` data source**: the caller's own measurements
//!
//! # Running
//!
//! The host launches the binary with its magic cookie set in the environment.
//! [`serve`] binds a loopback port and writes the handshake line to stdout:
//!
//! ```text
//! 1|1|tcp|127.0.0.1:50051|grpc
//! ```
//!
//! Format: `<core_version>|<protocol_version>|tcp|<address>|grpc`
//!
//! Every later call arrives over gRPC (`plugin.provider.v1.Provider`) with
//! configuration and state carried as JSON documents.
//!
//! # Protocol
//!
//! - **GetMetadata** / **GetSchema**: type names and schemas
//! - **ValidateProviderConfig** / **Configure**: API key handling and client setup
//! - **Stop**: releases the client
//! - **ValidateResourceConfig** / **Plan**: schema checks, defaults and replacement rules
//! - **Create/Read/Update/Delete**: measurement lifecycle
//! - **ImportResourceState**: adopt a measurement by numeric id
//! - **ValidateDataSourceConfig** / **ReadDataSource**: credits and measurement listing
//!
//! # Testing
//!
//! ```ignore
//! use terraform_provider_ripe_atlas::testing::{FakeAtlas, ProviderTester};
//!
//! let fake = FakeAtlas::new();
//! let tester = ProviderTester::new(fake.provider());
//! tester.configure(json!({"api_key": "X"})).await.unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod atlas;
pub mod data_sources;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use error::ProviderError;
pub use logging::init_logging;
pub use provider::RipeAtlasProvider;
pub use schema::ProviderSchema;
pub use server::{serve, serve_with_options, ProviderService, ServeOptions};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    PROTOCOL_VERSION,
};
pub use validation::validate;

pub use async_trait::async_trait;

pub use serde_json;
pub use tonic;
pub use tracing;
