//! Directory-backed archive store.
//!
//! Each segment is written as `<segment-id>.json` inside one directory. A
//! segment is first written to a temporary name and then renamed, so a
//! reader never sees a half-written segment.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::io;
use std::sync::Arc;
use tracing::warn;

use crate::lifecycle::{
    domain::ArchiveSegmentId,
    ports::{ArchiveError, ArchiveResult, ArchiveSegment, ArchiveStore},
};

/// Archive store rooted at a directory, accessed through a capability
/// handle.
#[derive(Debug, Clone)]
pub struct DirArchiveStore {
    dir: Arc<Dir>,
    root: Utf8PathBuf,
}

fn segment_file(id: ArchiveSegmentId) -> String {
    format!("{id}.json")
}

/// Writes `bytes` to `staging` and renames it to `name`; the staging file
/// is removed when either step fails.
pub(crate) fn publish(dir: &Dir, staging: &str, name: &str, bytes: &[u8]) -> io::Result<()> {
    dir.write(staging, bytes)
        .and_then(|()| dir.rename(staging, dir, name))
        .inspect_err(|_| match dir.remove_file(staging) {
            Err(cleanup) if cleanup.kind() != io::ErrorKind::NotFound => {
                warn!(error = %cleanup, file = staging, "staging file left behind");
            }
            _ => {}
        })
}

impl DirArchiveStore {
    /// Opens (creating if needed) the archive directory at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Storage`] when the directory cannot be
    /// created or opened.
    pub fn open(root: &Utf8Path) -> ArchiveResult<Self> {
        Dir::create_ambient_dir_all(root, ambient_authority()).map_err(ArchiveError::storage)?;
        let dir = Dir::open_ambient_dir(root, ambient_authority()).map_err(ArchiveError::storage)?;
        Ok(Self {
            dir: Arc::new(dir),
            root: root.to_owned(),
        })
    }

    /// Returns the archive directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    async fn blocking<T, F>(&self, operation: F) -> ArchiveResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Dir) -> ArchiveResult<T> + Send + 'static,
    {
        let dir = Arc::clone(&self.dir);
        tokio::task::spawn_blocking(move || operation(dir.as_ref()))
            .await
            .map_err(ArchiveError::storage)?
    }
}

#[async_trait]
impl ArchiveStore for DirArchiveStore {
    async fn write_segment(&self, segment: &ArchiveSegment) -> ArchiveResult<()> {
        let id = segment.id;
        let encoded = serde_json::to_vec_pretty(segment)
            .map_err(|err| ArchiveError::Serialization(err.to_string()))?;
        self.blocking(move |dir| {
            let name = segment_file(id);
            if dir.exists(&name) {
                return Err(ArchiveError::DuplicateSegment(id));
            }
            let staging = format!("{name}.tmp");
            publish(dir, &staging, &name, &encoded).map_err(ArchiveError::storage)
        })
        .await
    }

    async fn read_segment(&self, id: ArchiveSegmentId) -> ArchiveResult<Option<ArchiveSegment>> {
        self.blocking(move |dir| {
            let contents = match dir.read_to_string(segment_file(id)) {
                Ok(contents) => contents,
                Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(err) => return Err(ArchiveError::storage(err)),
            };
            serde_json::from_str(&contents)
                .map(Some)
                .map_err(|err| ArchiveError::Serialization(err.to_string()))
        })
        .await
    }

    async fn discard_segment(&self, id: ArchiveSegmentId) -> ArchiveResult<()> {
        self.blocking(move |dir| match dir.remove_file(segment_file(id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ArchiveError::storage(err)),
        })
        .await
    }
}
