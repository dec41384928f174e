//! The persisted commitment to a dataset: the block tree root plus every block's hash and
//! authentication path.
//!
//! The JSON layout is compatible with commitment files produced by the dataset tooling:
//! `root_hash` is written as a one-element array and read from either an array or a bare string,
//! and fields the tooling does not write are optional on input.

use std::path::Path;

use anyhow::Context as _;
use blockproof_core::{tree::compute_root, AuthPath, Digest, MerkleTree, NodeHasher};
use serde::{Deserialize, Serialize};

use crate::error::{CommitmentError, InputError};

/// The commitment type recorded in every commitment.
pub const COMMITMENT_TYPE: &str = "merkle_tree";

/// The default id of the block at `index`: `block_0001` for index 0.
pub fn block_id(index: u64) -> String {
    format!("block_{:04}", index + 1)
}

/// Per-block entry of a [`Commitment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetadata {
    pub block_id: String,
    /// The leaf hash of the block content.
    pub hash: Digest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub is_empty: bool,
    pub authentication_path: AuthPath,
}

/// The shape of the committed tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStructure {
    /// Levels including the leaf level and the root.
    pub height: usize,
    /// Leaves supplied, before padding.
    pub leaf_count: u64,
    /// Leaves after padding. Zero when read from a file which does not record it.
    #[serde(default)]
    pub padded_leaf_count: u64,
    pub is_complete_binary_tree: bool,
}

/// Byte size statistics, recorded when a commitment is built from block contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeStatistics {
    pub total_size_bytes: u64,
    pub data_size_bytes: u64,
    pub average_block_size_bytes: f64,
    pub min_block_size_bytes: u64,
    pub max_block_size_bytes: u64,
}

/// A commitment to an ordered sequence of blocks. Immutable once built; a new dataset version
/// needs a new commitment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commitment {
    pub commitment_type: String,
    pub hash_algorithm: String,
    #[serde(with = "root_hash")]
    pub root_hash: Digest,
    pub total_blocks: u64,
    #[serde(default)]
    pub data_blocks: u64,
    #[serde(default)]
    pub empty_blocks: u64,
    #[serde(default)]
    pub timestamp: String,
    pub block_metadata: Vec<BlockMetadata>,
    pub merkle_tree_structure: TreeStructure,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_statistics: Option<SizeStatistics>,
}

struct Entry {
    block_id: String,
    hash: Digest,
    size_bytes: Option<u64>,
    is_empty: bool,
}

impl Commitment {
    /// Build a commitment from `(block_id, content)` pairs in block order.
    pub fn from_blocks<H, I, B>(blocks: I) -> Result<Self, InputError>
    where
        H: NodeHasher,
        I: IntoIterator<Item = (String, B)>,
        B: AsRef<[u8]>,
    {
        let entries = blocks
            .into_iter()
            .map(|(block_id, content)| {
                let content = content.as_ref();
                Entry {
                    block_id,
                    hash: H::hash_leaf(content),
                    size_bytes: Some(content.len() as u64),
                    is_empty: content.is_empty(),
                }
            })
            .collect();
        Self::assemble::<H>(entries)
    }

    /// Build a commitment from block contents in block order, naming blocks with [`block_id`].
    pub fn from_contents<H, I, B>(contents: I) -> Result<Self, InputError>
    where
        H: NodeHasher,
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        Self::from_blocks::<H, _, _>(
            contents
                .into_iter()
                .enumerate()
                .map(|(i, content)| (block_id(i as u64), content)),
        )
    }

    /// Build a commitment from leaf hashes computed elsewhere.
    pub fn from_leaf_hashes<H: NodeHasher>(
        block_ids: Vec<String>,
        hashes: Vec<Digest>,
    ) -> Result<Self, InputError> {
        if block_ids.len() != hashes.len() {
            return Err(InputError::LengthMismatch {
                ids: block_ids.len(),
                hashes: hashes.len(),
            });
        }
        let entries = block_ids
            .into_iter()
            .zip(hashes)
            .map(|(block_id, hash)| Entry {
                block_id,
                hash,
                size_bytes: None,
                is_empty: false,
            })
            .collect();
        Self::assemble::<H>(entries)
    }

    fn assemble<H: NodeHasher>(entries: Vec<Entry>) -> Result<Self, InputError> {
        let tree = MerkleTree::build::<H>(entries.iter().map(|e| e.hash).collect())?;

        let block_metadata = entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| -> Result<_, InputError> {
                Ok(BlockMetadata {
                    authentication_path: tree.authentication_path(i)?,
                    block_id: e.block_id,
                    hash: e.hash,
                    size_bytes: e.size_bytes,
                    is_empty: e.is_empty,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let total_blocks = block_metadata.len() as u64;
        let empty_blocks = block_metadata.iter().filter(|b| b.is_empty).count() as u64;

        Ok(Commitment {
            commitment_type: COMMITMENT_TYPE.to_owned(),
            hash_algorithm: H::ALGORITHM.to_owned(),
            root_hash: tree.root(),
            total_blocks,
            data_blocks: total_blocks - empty_blocks,
            empty_blocks,
            timestamp: chrono::Utc::now().to_rfc3339(),
            size_statistics: size_statistics(&block_metadata),
            merkle_tree_structure: TreeStructure {
                height: tree.height(),
                leaf_count: total_blocks,
                padded_leaf_count: tree.padded_leaf_count() as u64,
                is_complete_binary_tree: tree.padded_leaf_count() == tree.leaf_count(),
            },
            block_metadata,
        })
    }

    /// The committed root.
    pub fn root(&self) -> Digest {
        self.root_hash
    }

    /// The length of every block's authentication path.
    pub fn path_length(&self) -> usize {
        self.merkle_tree_structure.height.saturating_sub(1)
    }

    /// The metadata of the block at `index`.
    pub fn block(&self, index: u64) -> Option<&BlockMetadata> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.block_metadata.get(i))
    }

    /// Check that the commitment is internally consistent: the algorithm is `H`'s, the counts
    /// and tree shape agree with the block list, and every block's path recombines into the
    /// root.
    pub fn validate<H: NodeHasher>(&self) -> Result<(), CommitmentError> {
        if self.commitment_type != COMMITMENT_TYPE {
            return Err(CommitmentError::UnsupportedType(
                self.commitment_type.clone(),
            ));
        }
        if self.hash_algorithm != H::ALGORITHM {
            return Err(CommitmentError::AlgorithmMismatch {
                expected: H::ALGORITHM,
                found: self.hash_algorithm.clone(),
            });
        }
        if self.total_blocks != self.block_metadata.len() as u64 {
            return Err(CommitmentError::BlockCount {
                recorded: self.total_blocks,
                listed: self.block_metadata.len(),
            });
        }

        let structure = &self.merkle_tree_structure;
        let padded = self.total_blocks.next_power_of_two();
        let shape_ok = self.total_blocks > 0
            && structure.leaf_count == self.total_blocks
            && (structure.padded_leaf_count == 0 || structure.padded_leaf_count == padded)
            && structure.height == padded.trailing_zeros() as usize + 1;
        if !shape_ok {
            return Err(CommitmentError::TreeStructure {
                total_blocks: self.total_blocks,
            });
        }

        let path_length = self.path_length();
        for (i, block) in self.block_metadata.iter().enumerate() {
            if block.authentication_path.len() != path_length {
                return Err(CommitmentError::PathLength {
                    block_id: block.block_id.clone(),
                    expected: path_length,
                    actual: block.authentication_path.len(),
                });
            }
            let root = compute_root::<H>(&block.hash, i as u64, &block.authentication_path);
            if root != self.root_hash {
                return Err(CommitmentError::RootMismatch {
                    block_id: block.block_id.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Write the commitment to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write commitment to {}", path.display()))
    }

    /// Read a commitment from a JSON file. The commitment is not validated.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read commitment from {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("failed to parse commitment in {}", path.display()))
    }
}

fn size_statistics(blocks: &[BlockMetadata]) -> Option<SizeStatistics> {
    let sizes = blocks
        .iter()
        .map(|b| b.size_bytes.map(|size| (size, b.is_empty)))
        .collect::<Option<Vec<_>>>()?;

    let data_sizes = sizes
        .iter()
        .filter(|(_, empty)| !empty)
        .map(|(size, _)| *size)
        .collect::<Vec<_>>();
    let data_size_bytes = data_sizes.iter().sum::<u64>();

    Some(SizeStatistics {
        total_size_bytes: sizes.iter().map(|(size, _)| size).sum(),
        data_size_bytes,
        average_block_size_bytes: if data_sizes.is_empty() {
            0.0
        } else {
            data_size_bytes as f64 / data_sizes.len() as f64
        },
        min_block_size_bytes: data_sizes.iter().copied().min().unwrap_or(0),
        max_block_size_bytes: data_sizes.iter().copied().max().unwrap_or(0),
    })
}

/// `root_hash` is written as `[root]` and read from `[root]` or `root`.
mod root_hash {
    use blockproof_core::Digest;
    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        List(Vec<Digest>),
        Bare(Digest),
    }

    pub fn serialize<S: Serializer>(root: &Digest, serializer: S) -> Result<S::Ok, S::Error> {
        [root].serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Digest, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Bare(root) => Ok(root),
            Repr::List(roots) if roots.len() == 1 => Ok(roots[0]),
            Repr::List(roots) => Err(D::Error::invalid_length(
                roots.len(),
                &"a single root hash",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{block_id, Commitment};
    use crate::error::{CommitmentError, InputError};
    use blockproof_core::{Digest, NodeHasher, Sha3Hasher};

    fn contents(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| format!("row {}\n", i).into_bytes()).collect()
    }

    #[test]
    fn block_ids() {
        assert_eq!(block_id(0), "block_0001");
        assert_eq!(block_id(41), "block_0042");
        assert_eq!(block_id(12_344), "block_12345");
    }

    #[test]
    fn builds_and_validates() {
        let c = Commitment::from_contents::<Sha3Hasher, _, _>(contents(8)).unwrap();
        assert_eq!(c.total_blocks, 8);
        assert_eq!(c.hash_algorithm, "SHA3-256");
        assert_eq!(c.merkle_tree_structure.height, 4);
        assert_eq!(c.path_length(), 3);
        assert!(c.merkle_tree_structure.is_complete_binary_tree);
        assert_eq!(c.block(7).unwrap().block_id, "block_0008");
        assert!(c.block(8).is_none());
        c.validate::<Sha3Hasher>().unwrap();
    }

    #[test]
    fn padded_commitment() {
        let c = Commitment::from_contents::<Sha3Hasher, _, _>(contents(5)).unwrap();
        assert_eq!(c.total_blocks, 5);
        assert_eq!(c.merkle_tree_structure.padded_leaf_count, 8);
        assert!(!c.merkle_tree_structure.is_complete_binary_tree);
        assert_eq!(c.block_metadata.len(), 5);
        c.validate::<Sha3Hasher>().unwrap();
    }

    #[test]
    fn empty_blocks_counted() {
        let mut blocks = contents(3);
        blocks.push(Vec::new());
        let c = Commitment::from_contents::<Sha3Hasher, _, _>(blocks).unwrap();
        assert_eq!(c.data_blocks, 3);
        assert_eq!(c.empty_blocks, 1);
        let stats = c.size_statistics.as_ref().unwrap();
        assert_eq!(stats.total_size_bytes, stats.data_size_bytes);
        assert_eq!(stats.min_block_size_bytes, 6);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            Commitment::from_contents::<Sha3Hasher, _, Vec<u8>>(Vec::new()).unwrap_err(),
            InputError::EmptyBlocks
        );
        assert_eq!(
            Commitment::from_leaf_hashes::<Sha3Hasher>(vec!["a".into()], vec![]).unwrap_err(),
            InputError::LengthMismatch { ids: 1, hashes: 0 }
        );
    }

    #[test]
    fn leaf_hashes_match_contents() {
        let blocks = contents(4);
        let hashes = blocks.iter().map(|b| Sha3Hasher::hash_leaf(b)).collect();
        let ids = (0..4).map(block_id).collect();
        let a = Commitment::from_leaf_hashes::<Sha3Hasher>(ids, hashes).unwrap();
        let b = Commitment::from_contents::<Sha3Hasher, _, _>(blocks).unwrap();
        assert_eq!(a.root(), b.root());
        assert!(a.size_statistics.is_none());
    }

    #[test]
    fn json_layout() {
        let c = Commitment::from_contents::<Sha3Hasher, _, _>(contents(2)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&c.to_json().unwrap()).unwrap();
        assert_eq!(value["commitment_type"], "merkle_tree");
        assert_eq!(value["root_hash"][0], c.root().to_hex());
        assert_eq!(value["block_metadata"][1]["block_id"], "block_0002");
        assert_eq!(
            value["block_metadata"][1]["authentication_path"][0],
            c.block_metadata[0].hash.to_hex()
        );

        let back = Commitment::from_json(&c.to_json().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn reads_bare_root_and_minimal_fields() {
        let c = Commitment::from_contents::<Sha3Hasher, _, _>(contents(2)).unwrap();
        let json = format!(
            r#"{{
                "commitment_type": "merkle_tree",
                "hash_algorithm": "SHA3-256",
                "root_hash": "{}",
                "total_blocks": 2,
                "block_metadata": [
                    {{"block_id": "a", "hash": "{}", "authentication_path": ["{}"]}},
                    {{"block_id": "b", "hash": "{}", "authentication_path": ["{}"]}}
                ],
                "merkle_tree_structure": {{"height": 2, "leaf_count": 2, "is_complete_binary_tree": true}}
            }}"#,
            c.root(),
            c.block_metadata[0].hash,
            c.block_metadata[1].hash,
            c.block_metadata[1].hash,
            c.block_metadata[0].hash,
        );
        let parsed = Commitment::from_json(&json).unwrap();
        assert_eq!(parsed.root(), c.root());
        parsed.validate::<Sha3Hasher>().unwrap();
    }

    #[test]
    fn rejects_two_roots() {
        let c = Commitment::from_contents::<Sha3Hasher, _, _>(contents(2)).unwrap();
        let json = c
            .to_json()
            .unwrap()
            .replacen(&format!("\"{}\"", c.root()), &format!("\"{0}\", \"{0}\"", c.root()), 1);
        assert!(Commitment::from_json(&json).is_err());
    }

    #[test]
    fn corrupted_commitment_detected() {
        let mut c = Commitment::from_contents::<Sha3Hasher, _, _>(contents(4)).unwrap();
        c.block_metadata[2].authentication_path.0[1] = Digest::default();
        assert_eq!(
            c.validate::<Sha3Hasher>(),
            Err(CommitmentError::RootMismatch {
                block_id: "block_0003".into()
            })
        );

        let mut c = Commitment::from_contents::<Sha3Hasher, _, _>(contents(4)).unwrap();
        c.total_blocks = 5;
        assert!(matches!(
            c.validate::<Sha3Hasher>(),
            Err(CommitmentError::BlockCount { .. })
        ));

        let mut c = Commitment::from_contents::<Sha3Hasher, _, _>(contents(4)).unwrap();
        c.hash_algorithm = "BLAKE3".into();
        assert!(matches!(
            c.validate::<Sha3Hasher>(),
            Err(CommitmentError::AlgorithmMismatch { .. })
        ));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merkle_commitment.json");
        let c = Commitment::from_contents::<Sha3Hasher, _, _>(contents(3)).unwrap();
        c.save(&path).unwrap();
        assert_eq!(Commitment::load(&path).unwrap(), c);
        assert!(Commitment::load(dir.path().join("missing.json")).is_err());
    }
}
