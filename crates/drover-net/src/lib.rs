//! HTTP boundary for Drover.
//!
//! This crate implements the form engine's three boundary traits -
//! reference-data lookups, uniqueness checks and record submission -
//! against a REST backend, so a console screen can wire a wizard to its
//! API with one client:
//!
//! ```no_run
//! use std::time::Duration;
//! use drover::prelude::*;
//! use drover_net::BackendClient;
//!
//! # async fn demo(schema: Schema) -> Result<(), Box<dyn std::error::Error>> {
//! let client = BackendClient::builder("https://farm.example.com/api")
//!     .bearer_auth("session-token")
//!     .timeout(Duration::from_secs(10))
//!     .submit_path("/animals")
//!     .build()?;
//!
//! let wizard = WizardBuilder::new()
//!     .with_schema(schema)
//!     .with_step(StepDef::new("Identity").with_fields(["code"]))
//!     .with_gateway(client.as_submit_gateway())
//!     .with_probe(client.as_uniqueness_probe())
//!     .with_options_provider(client.as_options_provider())
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod payload;

pub use client::{BackendClient, BackendClientBuilder};
pub use error::{NetworkError, Result};
pub use payload::{DetailPayload, EntityPayload, OptionPayload, SubmitEnvelope, UniquePayload};
