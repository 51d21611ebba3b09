pub mod graph;
pub mod metadata;
pub mod space;

// Re-export core models for easy access
pub use graph::{GraphSpace, KgInstance, Stage};
pub use metadata::{MetadataRecord, NewMetadataRecord, SyncDirection};
pub use space::{NewSpaceRecord, SpaceRecord, SpaceScope, SpaceStatus};
