// Build Artifact Caching
//
// - Framed binary codec (magic + version header)
// - Timestamp-based staleness for expensive derived artifacts

pub mod artifact;
pub mod codec;

pub use artifact::{ArtifactCache, CacheStatus, StaleReason, ARTIFACT_FORMAT_VERSION};
pub use codec::{BinaryReader, BinaryRecord, BinaryWriter, BINARY_MAGIC};
