//! Execution of work outside the request path.

pub mod background;

pub use background::BackgroundDispatcher;
