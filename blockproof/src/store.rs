//! Stores the auditor reads from.
//!
//! Block content and commitments live outside the engine. The auditor is handed a store
//! explicitly; there is no global registry.

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;

use crate::{commitment::Commitment, error::BlockUnavailable};

/// A source of block content.
pub trait BlockStore: Send + Sync {
    /// Fetch the content of the block at `index`, named `block_id` in its commitment.
    fn fetch(&self, index: u64, block_id: &str) -> Result<Vec<u8>, BlockUnavailable>;
}

impl<T: BlockStore + ?Sized> BlockStore for Arc<T> {
    fn fetch(&self, index: u64, block_id: &str) -> Result<Vec<u8>, BlockUnavailable> {
        (**self).fetch(index, block_id)
    }
}

/// An in-memory block store keyed by block index.
#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<HashMap<u64, Vec<u8>>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `contents`, the first at index 0.
    pub fn from_contents<I, B>(contents: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        let blocks = contents
            .into_iter()
            .enumerate()
            .map(|(i, content)| (i as u64, content.into()))
            .collect();
        MemoryBlockStore {
            blocks: RwLock::new(blocks),
        }
    }

    /// Insert or replace the content of a block.
    pub fn insert(&self, index: u64, content: impl Into<Vec<u8>>) {
        self.blocks.write().insert(index, content.into());
    }

    /// Modify the content of a block in place. Returns false if the block is absent.
    pub fn tamper(&self, index: u64, f: impl FnOnce(&mut Vec<u8>)) -> bool {
        match self.blocks.write().get_mut(&index) {
            Some(content) => {
                f(content);
                true
            }
            None => false,
        }
    }

    /// Remove a block, returning its content.
    pub fn remove(&self, index: u64) -> Option<Vec<u8>> {
        self.blocks.write().remove(&index)
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }
}

impl BlockStore for MemoryBlockStore {
    fn fetch(&self, index: u64, block_id: &str) -> Result<Vec<u8>, BlockUnavailable> {
        self.blocks
            .read()
            .get(&index)
            .cloned()
            .ok_or_else(|| BlockUnavailable::NotFound {
                block_id: block_id.to_owned(),
            })
    }
}

/// A block store with one file per block, named by block id.
pub struct DirBlockStore {
    dir: PathBuf,
    extension: Option<String>,
}

impl DirBlockStore {
    /// Blocks are read from `dir/<block_id>`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirBlockStore {
            dir: dir.into(),
            extension: None,
        }
    }

    /// Blocks are read from `dir/<block_id>.<extension>`, e.g. `block_0001.csv`.
    pub fn with_extension(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        DirBlockStore {
            dir: dir.into(),
            extension: Some(extension.into()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The path a block is read from, or `None` if the id could name a file outside the
    /// directory.
    ///
    /// The extension is appended, so `block.v2` with extension `csv` reads `block.v2.csv`.
    pub fn block_path(&self, block_id: &str) -> Option<PathBuf> {
        if !is_plain_file_name(block_id) {
            return None;
        }
        Some(match &self.extension {
            Some(ext) => self.dir.join(format!("{}.{}", block_id, ext)),
            None => self.dir.join(block_id),
        })
    }
}

/// Block ids come from commitment documents and must stay a single path component.
fn is_plain_file_name(block_id: &str) -> bool {
    !block_id.is_empty()
        && block_id != "."
        && !block_id.contains("..")
        && !block_id.contains(['/', '\\', '\0'])
}

impl BlockStore for DirBlockStore {
    fn fetch(&self, _index: u64, block_id: &str) -> Result<Vec<u8>, BlockUnavailable> {
        let path = self
            .block_path(block_id)
            .ok_or_else(|| BlockUnavailable::InvalidId {
                block_id: block_id.to_owned(),
            })?;
        std::fs::read(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => BlockUnavailable::NotFound {
                block_id: block_id.to_owned(),
            },
            _ => BlockUnavailable::Io {
                block_id: block_id.to_owned(),
                source: err,
            },
        })
    }
}

/// A source of commitments, keyed by user and upload.
pub trait CommitmentStore: Send + Sync {
    fn get(&self, user_id: &str, upload_id: &str) -> Option<Arc<Commitment>>;

    /// Store a commitment, replacing any previous one for the same upload.
    fn put(&self, user_id: &str, upload_id: &str, commitment: Commitment);
}

/// An in-memory commitment store.
#[derive(Default)]
pub struct MemoryCommitmentStore {
    commitments: RwLock<HashMap<(String, String), Arc<Commitment>>>,
}

impl MemoryCommitmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommitmentStore for MemoryCommitmentStore {
    fn get(&self, user_id: &str, upload_id: &str) -> Option<Arc<Commitment>> {
        self.commitments
            .read()
            .get(&(user_id.to_owned(), upload_id.to_owned()))
            .cloned()
    }

    fn put(&self, user_id: &str, upload_id: &str, commitment: Commitment) {
        self.commitments.write().insert(
            (user_id.to_owned(), upload_id.to_owned()),
            Arc::new(commitment),
        );
    }
}
