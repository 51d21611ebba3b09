//! # Web API Handlers
//!
//! One module per resource group. Handlers stay thin: extract, call the
//! workflow, shape the response.

pub mod health;
pub mod metadata;
pub mod spaces;
pub mod users;
