//! Per-type artifact cache
//!
//! An artifact record is `[u64 source mtime][identity string][artifact fields]`
//! behind the codec header. A record is fresh only when the stored mtime equals
//! the source file's current mtime, the identity matches and the header version
//! matches; everything else is stale and forces a rebuild.

use crate::cache::codec::{BinaryReader, BinaryRecord, BinaryWriter};
use crate::error::Result;
use crate::utils::modified_time;
use std::marker::PhantomData;
use std::path::Path;

/// Codec version of artifact cache files
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Why a cached artifact could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// No cache file exists
    Missing,
    /// Cache file exists but could not be decoded (bad magic, version, truncation)
    Unreadable(String),
    /// Source was modified since the artifact was written
    SourceModified { stored: u64, current: u64 },
    /// Artifact was produced by a different toolchain
    IdentityMismatch { stored: String },
}

/// Result of consulting the cache
#[derive(Debug, Clone, PartialEq)]
pub enum CacheStatus<T> {
    Fresh(T),
    Stale(StaleReason),
}

impl<T> CacheStatus<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self, CacheStatus::Stale(_))
    }

    /// The artifact when fresh
    pub fn into_artifact(self) -> Option<T> {
        match self {
            CacheStatus::Fresh(artifact) => Some(artifact),
            CacheStatus::Stale(_) => None,
        }
    }
}

/// Staleness check and persistence for one kind of derived artifact
#[derive(Debug, Clone)]
pub struct ArtifactCache<T> {
    identity: String,
    version: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T: BinaryRecord> ArtifactCache<T> {
    /// Cache whose records are tagged with `identity`
    pub fn new(identity: impl Into<String>) -> Self {
        Self::with_version(identity, ARTIFACT_FORMAT_VERSION)
    }

    /// Cache with an explicit codec version
    pub fn with_version(identity: impl Into<String>, version: u32) -> Self {
        Self {
            identity: identity.into(),
            version,
            _marker: PhantomData,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Look up the artifact for `source` stored at `cache`.
    ///
    /// Only an unreadable *source* file is an error; any problem with the
    /// cache file itself reports [`CacheStatus::Stale`].
    pub fn load(&self, source: &Path, cache: &Path) -> Result<CacheStatus<T>> {
        let current = modified_time(source)?;
        Ok(self.load_against(current, cache))
    }

    fn load_against(&self, current: u64, cache: &Path) -> CacheStatus<T> {
        if !cache.is_file() {
            return CacheStatus::Stale(StaleReason::Missing);
        }

        let mut reader = match BinaryReader::from_file(cache, self.version) {
            Ok(reader) => reader,
            Err(e) => {
                tracing::warn!(cache = %cache.display(), error = %e, "discarding unusable artifact cache");
                return CacheStatus::Stale(StaleReason::Unreadable(e.to_string()));
            }
        };

        match self.read_payload(&mut reader, current) {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(cache = %cache.display(), error = %e, "artifact record is corrupt");
                CacheStatus::Stale(StaleReason::Unreadable(e.to_string()))
            }
        }
    }

    fn read_payload(&self, reader: &mut BinaryReader, current: u64) -> Result<CacheStatus<T>> {
        let stored: u64 = reader.read()?;
        if stored != current {
            return Ok(CacheStatus::Stale(StaleReason::SourceModified { stored, current }));
        }

        let identity: String = reader.read()?;
        if identity != self.identity {
            return Ok(CacheStatus::Stale(StaleReason::IdentityMismatch { stored: identity }));
        }

        Ok(CacheStatus::Fresh(reader.read_record()?))
    }

    /// Persist `artifact` tagged with the source file's current mtime
    pub fn save(&self, source: &Path, cache: &Path, artifact: &T) -> Result<()> {
        let current = modified_time(source)?;
        self.save_with_timestamp(current, cache, artifact)
    }

    fn save_with_timestamp(&self, timestamp: u64, cache: &Path, artifact: &T) -> Result<()> {
        let mut writer = BinaryWriter::new(self.version);
        writer.write(&timestamp)?;
        writer.write(&self.identity)?;
        writer.write_record(artifact)?;
        writer.write_to_file(cache)
    }

    /// Return the cached artifact, or run `build` and cache its output.
    ///
    /// The boolean is `true` when `build` ran. The record is stamped with the
    /// mtime observed before building, so an edit made during a long build
    /// leaves the new record stale. A failed save is logged and the built
    /// artifact is still returned.
    pub fn load_or_build<F>(&self, source: &Path, cache: &Path, build: F) -> Result<(T, bool)>
    where
        F: FnOnce() -> Result<T>,
    {
        let current = modified_time(source)?;
        match self.load_against(current, cache) {
            CacheStatus::Fresh(artifact) => {
                tracing::debug!(source = %source.display(), "artifact cache hit");
                Ok((artifact, false))
            }
            CacheStatus::Stale(reason) => {
                tracing::debug!(source = %source.display(), ?reason, "artifact cache stale, rebuilding");
                let artifact = build()?;
                if let Err(e) = self.save_with_timestamp(current, cache, &artifact) {
                    tracing::error!(cache = %cache.display(), error = %e, "failed to write artifact cache");
                }
                Ok((artifact, true))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    #[derive(Debug, Clone, PartialEq)]
    struct Blob {
        words: Vec<u32>,
    }

    impl BinaryRecord for Blob {
        fn write_record(&self, writer: &mut BinaryWriter) -> Result<()> {
            writer.write(&self.words)
        }

        fn read_record(reader: &mut BinaryReader) -> Result<Self> {
            Ok(Self {
                words: reader.read()?,
            })
        }
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }

    #[test]
    fn test_fresh_when_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("lit.slang");
        let cache_file = dir.path().join("cache/lit.slang.cache");
        std::fs::write(&source, "float4 main() {}").unwrap();

        let cache = ArtifactCache::<Blob>::new("test-compiler");
        assert_eq!(
            cache.load(&source, &cache_file).unwrap(),
            CacheStatus::Stale(StaleReason::Missing)
        );

        let blob = Blob { words: vec![0x0723_0203, 1, 2] };
        cache.save(&source, &cache_file, &blob).unwrap();
        assert_eq!(cache.load(&source, &cache_file).unwrap(), CacheStatus::Fresh(blob));
    }

    #[test]
    fn test_stale_after_touch() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("lit.slang");
        let cache_file = dir.path().join("lit.cache");
        std::fs::write(&source, "v1").unwrap();
        let t0 = SystemTime::now() - Duration::from_secs(60);
        set_mtime(&source, t0);

        let cache = ArtifactCache::<Blob>::new("test-compiler");
        cache.save(&source, &cache_file, &Blob { words: vec![1] }).unwrap();

        set_mtime(&source, t0 + Duration::from_secs(5));
        let status = cache.load(&source, &cache_file).unwrap();
        assert!(status.is_stale());
        assert!(matches!(status, CacheStatus::Stale(StaleReason::SourceModified { .. })));
    }

    #[test]
    fn test_identity_and_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("lit.slang");
        let cache_file = dir.path().join("lit.cache");
        std::fs::write(&source, "v1").unwrap();

        ArtifactCache::<Blob>::new("driver-a")
            .save(&source, &cache_file, &Blob { words: vec![1] })
            .unwrap();

        let other = ArtifactCache::<Blob>::new("driver-b");
        assert!(matches!(
            other.load(&source, &cache_file).unwrap(),
            CacheStatus::Stale(StaleReason::IdentityMismatch { .. })
        ));

        let newer = ArtifactCache::<Blob>::with_version("driver-a", ARTIFACT_FORMAT_VERSION + 1);
        assert!(matches!(
            newer.load(&source, &cache_file).unwrap(),
            CacheStatus::Stale(StaleReason::Unreadable(_))
        ));
    }

    #[test]
    fn test_corrupt_cache_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("lit.slang");
        let cache_file = dir.path().join("lit.cache");
        std::fs::write(&source, "v1").unwrap();
        std::fs::write(&cache_file, b"definitely not a cache").unwrap();

        let cache = ArtifactCache::<Blob>::new("x");
        assert!(cache.load(&source, &cache_file).unwrap().is_stale());
    }

    #[test]
    fn test_load_or_build_skips_build_when_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("lit.slang");
        let cache_file = dir.path().join("lit.cache");
        std::fs::write(&source, "v1").unwrap();

        let cache = ArtifactCache::<Blob>::new("x");
        let builds = Cell::new(0);
        let build = || {
            builds.set(builds.get() + 1);
            Ok(Blob { words: vec![7] })
        };

        let (first, rebuilt) = cache.load_or_build(&source, &cache_file, build).unwrap();
        assert!(rebuilt);
        let (second, rebuilt) = cache
            .load_or_build(&source, &cache_file, || {
                builds.set(builds.get() + 1);
                Ok(Blob { words: vec![8] })
            })
            .unwrap();
        assert!(!rebuilt);
        assert_eq!(first, second);
        assert_eq!(builds.get(), 1);
    }

    #[test]
    fn test_missing_source_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::<Blob>::new("x");
        assert!(cache
            .load(&dir.path().join("gone.slang"), &dir.path().join("gone.cache"))
            .is_err());
    }
}
