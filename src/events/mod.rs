//! # Activity Events
//!
//! Best-effort publication of workflow outcomes. Publishing never fails back
//! into a workflow; a missing subscriber is not an error.

pub mod activity;
pub mod publisher;

pub use activity::{ActivityLog, ActivityRecord, ActivitySink, ActivityType};
pub use publisher::{log_activity, ActivityPublisher, PublishedActivity};
