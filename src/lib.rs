//! restkit — declarative building blocks for REST API client SDKs.
//!
//! An SDK built on this crate describes its API as data: endpoint
//! definitions (URL template, verb, auth requirement, payload rules) live in
//! a versioned provider, model and collection definitions layer CRUD and
//! list semantics on top, and an auth controller owns the credential/token
//! lifecycle and decorates outgoing requests. The client ties it together
//! over a shared reqwest transport.
//!
//! # Quick start
//!
//! ```no_run
//! use restkit::client::Client;
//! use restkit::endpoint::EndpointDef;
//! use restkit::model::ModelDef;
//!
//! # async fn example() -> Result<(), restkit::error::RestError> {
//! let mut client = Client::new("https://api.example.com/rest");
//! client.provider_mut().register("ping", EndpointDef::new("ping"));
//!
//! let mut ping = client.endpoint("ping")?;
//! client.execute(&mut ping, false).await?;
//!
//! let accounts = ModelDef::new(EndpointDef::new("account/$:id"));
//! let mut account = client.model(&accounts);
//! account.retrieve(&client, Some("1234")).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cache;
pub mod client;
pub mod collection;
pub mod config;
pub mod data;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod model;
pub mod properties;
pub mod provider;
#[cfg(test)]
pub mod testsupport;
pub mod transport;
pub mod url;

pub use client::Client;
pub use endpoint::{AuthRequirement, Endpoint, EndpointDef};
pub use error::RestError;
