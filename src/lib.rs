#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # KG Integration
//!
//! Integration gateway that keeps spaces, memberships and metadata of the
//! data platform in sync with the EBRAINS Knowledge Graph, Keycloak and the
//! Collaboratory.
//!
//! ## Overview
//!
//! The gateway owns two small record types (spaces and metadata links) and
//! drives every other change through remote APIs. Slow multi-call flows such
//! as space provisioning and membership changes run on a background
//! dispatcher after the request has been answered; metadata flows run inline.
//!
//! ## Module Organization
//!
//! - [`config`] - Layered settings (defaults, TOML file, environment)
//! - [`logging`] - Structured `tracing` initialisation and workflow step logs
//! - [`error`] - `GatewayError` taxonomy and its HTTP status table
//! - [`resilience`] - Fibonacci backoff retry wrapper
//! - [`clients`] - Remote service clients behind `async_trait` seams
//! - [`namespace`] - Logical space name translation
//! - [`models`] - Space, metadata and graph payload types
//! - [`store`] - Local record store (in-memory and PostgreSQL)
//! - [`orchestration`] - Space provisioning, membership and metadata workflows
//! - [`execution`] - Background task dispatcher
//! - [`events`] - Activity event emitter
//! - [`web`] - axum HTTP surface
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kg_integration::config::Settings;
//! use kg_integration::events::{ActivityLog, ActivityPublisher};
//! use kg_integration::execution::BackgroundDispatcher;
//! use kg_integration::orchestration::RemoteServices;
//! use kg_integration::store::RecordStores;
//! use kg_integration::web::{build_router, AppState};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load()?;
//! let stores = RecordStores::connect(&settings.database).await?;
//! let services = RemoteServices::from_settings(&settings)?;
//! let activity = ActivityLog::new(Arc::new(ActivityPublisher::from_config(&settings.events)));
//!
//! let state = AppState::new(&settings, services, stores, BackgroundDispatcher::new(), activity);
//! let _router = build_router(state, std::time::Duration::from_secs(30));
//! # Ok(())
//! # }
//! ```

pub mod clients;
pub mod config;
pub mod error;
pub mod events;
pub mod execution;
pub mod logging;
pub mod models;
pub mod namespace;
pub mod orchestration;
pub mod resilience;
pub mod store;
pub mod web;

pub use config::Settings;
pub use error::{GatewayError, GatewayResult};
pub use logging::init_structured_logging;
