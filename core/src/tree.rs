//! The block tree: an immutable binary Merkle tree over an ordered sequence of leaf digests.
//!
//! Level 0 holds the leaves, each following level is built by hashing adjacent pairs
//! left-to-right, and the last level holds exactly one node, the root. All levels are retained
//! so that authentication paths can be read off the tree after construction.
//!
//! The leaf level is always a power of two. When the number of supplied leaves is not, the last
//! leaf is duplicated until it is. This is the only padding rule, and it is part of the
//! commitment format: a commitment records both the supplied and the padded leaf count.

use crate::hasher::{Digest, NodeHasher};

use alloc::vec::Vec;
use core::fmt;

/// Sibling digests needed to recompute the root from a single leaf, in ascending order from the
/// leaf level up to (but excluding) the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "borsh",
    derive(borsh::BorshDeserialize, borsh::BorshSerialize)
)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct AuthPath(pub Vec<Digest>);

impl AuthPath {
    /// The number of sibling digests. Equal to the tree height minus one.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path is empty, which is the case for a single-leaf tree.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Digest> {
        self.0.iter()
    }
}

impl From<Vec<Digest>> for AuthPath {
    fn from(siblings: Vec<Digest>) -> Self {
        AuthPath(siblings)
    }
}

/// Errors when building or querying a [`MerkleTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    /// No leaves were provided.
    EmptyLeaves,
    /// The requested leaf does not exist.
    IndexOutOfRange {
        /// The requested index.
        index: u64,
        /// The number of supplied leaves.
        leaf_count: u64,
    },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::EmptyLeaves => f.write_str("cannot build a tree without leaves"),
            TreeError::IndexOutOfRange { index, leaf_count } => write!(
                f,
                "leaf index {} out of range for {} leaves",
                index, leaf_count
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TreeError {}

/// An immutable block tree.
///
/// Built once from an ordered leaf sequence; read-only thereafter and safe to share between
/// threads deriving authentication paths concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    /// Levels from the leaves (index 0) to the root (last).
    levels: Vec<Vec<Digest>>,
    /// The number of leaves supplied, before padding.
    leaf_count: usize,
}

impl MerkleTree {
    /// Build a tree from an ordered sequence of leaf digests.
    ///
    /// Fails with [`TreeError::EmptyLeaves`] when `leaves` is empty. Otherwise the leaf level is
    /// padded according to [`pad_leaves`] and hashed bottom-up until one node remains.
    pub fn build<H: NodeHasher>(leaves: Vec<Digest>) -> Result<Self, TreeError> {
        if leaves.is_empty() {
            return Err(TreeError::EmptyLeaves);
        }

        let leaf_count = leaves.len();
        let mut current = leaves;
        pad_leaves(&mut current);

        let height = current.len().trailing_zeros() as usize + 1;
        let mut levels = Vec::with_capacity(height);
        while current.len() > 1 {
            let next = current
                .chunks_exact(2)
                .map(|pair| H::hash_internal(&pair[0], &pair[1]))
                .collect::<Vec<_>>();
            levels.push(current);
            current = next;
        }
        levels.push(current);

        Ok(MerkleTree { levels, leaf_count })
    }

    /// The root of the tree.
    pub fn root(&self) -> Digest {
        // UNWRAP: construction always leaves exactly one node in the last level.
        self.levels.last().and_then(|l| l.first()).copied().unwrap()
    }

    /// The number of leaves supplied at construction, before padding.
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// The number of leaves in the padded leaf level. Always a power of two.
    pub fn padded_leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// The number of levels, including the leaf level and the root.
    pub fn height(&self) -> usize {
        self.levels.len()
    }

    /// All levels, from leaves to root.
    pub fn levels(&self) -> &[Vec<Digest>] {
        &self.levels
    }

    /// The supplied leaf at `index`, if any.
    pub fn leaf(&self, index: usize) -> Option<&Digest> {
        if index < self.leaf_count {
            self.levels[0].get(index)
        } else {
            None
        }
    }

    /// The authentication path of a supplied leaf.
    ///
    /// At each level the sibling is found at `index ^ 1`, then the index moves up by halving.
    /// A single-leaf tree yields an empty path.
    pub fn authentication_path(&self, leaf_index: usize) -> Result<AuthPath, TreeError> {
        if leaf_index >= self.leaf_count {
            return Err(TreeError::IndexOutOfRange {
                index: leaf_index as u64,
                leaf_count: self.leaf_count as u64,
            });
        }

        let mut index = leaf_index;
        let siblings = self.levels[..self.levels.len() - 1]
            .iter()
            .map(|level| {
                let sibling = level[index ^ 1];
                index >>= 1;
                sibling
            })
            .collect();

        Ok(AuthPath(siblings))
    }
}

/// Duplicate the last leaf until the number of leaves is a power of two.
///
/// No-op on an empty sequence or one whose length is already a power of two.
pub fn pad_leaves(leaves: &mut Vec<Digest>) {
    if let Some(&last) = leaves.last() {
        let target = leaves.len().next_power_of_two();
        leaves.resize(target, last);
    }
}

/// Recompute the root implied by a leaf, its index, and its authentication path.
///
/// This performs no sanity-checking: an index with bits set above the path length is simply
/// truncated by the walk.
pub fn compute_root<H: NodeHasher>(leaf: &Digest, leaf_index: u64, path: &AuthPath) -> Digest {
    let mut node = *leaf;
    let mut index = leaf_index;
    for sibling in path.iter() {
        node = if index % 2 == 0 {
            H::hash_internal(&node, sibling)
        } else {
            H::hash_internal(sibling, &node)
        };
        index >>= 1;
    }
    node
}

#[cfg(all(test, feature = "sha3-hasher"))]
mod tests {
    use super::{compute_root, pad_leaves, AuthPath, MerkleTree, TreeError};
    use crate::hasher::{Digest, NodeHasher, Sha3Hasher};
    use quickcheck::{quickcheck, TestResult};

    fn leaves(n: usize) -> Vec<Digest> {
        (0..n)
            .map(|i| Sha3Hasher::hash_leaf(format!("block {}", i).as_bytes()))
            .collect()
    }

    #[test]
    fn empty_input_rejected() {
        assert_eq!(
            MerkleTree::build::<Sha3Hasher>(Vec::new()),
            Err(TreeError::EmptyLeaves)
        );
    }

    #[test]
    fn single_leaf_is_root() {
        let l = leaves(1);
        let tree = MerkleTree::build::<Sha3Hasher>(l.clone()).unwrap();
        assert_eq!(tree.root(), l[0]);
        assert_eq!(tree.height(), 1);
        assert!(tree.authentication_path(0).unwrap().is_empty());
    }

    #[test]
    fn two_leaves() {
        let l = leaves(2);
        let tree = MerkleTree::build::<Sha3Hasher>(l.clone()).unwrap();
        assert_eq!(tree.root(), Sha3Hasher::hash_internal(&l[0], &l[1]));
        assert_eq!(tree.authentication_path(0).unwrap(), AuthPath(vec![l[1]]));
        assert_eq!(tree.authentication_path(1).unwrap(), AuthPath(vec![l[0]]));
    }

    #[test]
    fn deterministic_for_powers_of_two() {
        for k in 0..=10 {
            let l = leaves(1 << k);
            let a = MerkleTree::build::<Sha3Hasher>(l.clone()).unwrap();
            let b = MerkleTree::build::<Sha3Hasher>(l).unwrap();
            assert_eq!(a.root(), b.root());
            assert_eq!(a, b);
            assert_eq!(a.height(), k + 1);
        }
    }

    #[test]
    fn path_length_is_height_minus_one() {
        let tree = MerkleTree::build::<Sha3Hasher>(leaves(16)).unwrap();
        for i in 0..16 {
            assert_eq!(tree.authentication_path(i).unwrap().len(), 4);
        }
    }

    #[test]
    fn out_of_range_index() {
        let tree = MerkleTree::build::<Sha3Hasher>(leaves(5)).unwrap();
        assert_eq!(
            tree.authentication_path(5),
            Err(TreeError::IndexOutOfRange {
                index: 5,
                leaf_count: 5
            })
        );
        // padded leaves are not addressable.
        assert_eq!(tree.padded_leaf_count(), 8);
        assert!(tree.leaf(7).is_none());
    }

    #[test]
    fn padding_duplicates_last_leaf() {
        let mut l = leaves(5);
        let last = l[4];
        pad_leaves(&mut l);
        assert_eq!(l.len(), 8);
        assert!(l[4..].iter().all(|d| *d == last));

        let padded = MerkleTree::build::<Sha3Hasher>(l).unwrap();
        let unpadded = MerkleTree::build::<Sha3Hasher>(leaves(5)).unwrap();
        assert_eq!(padded.root(), unpadded.root());
        assert_eq!(unpadded.leaf_count(), 5);
    }

    #[test]
    fn order_matters() {
        let l = leaves(4);
        let mut swapped = l.clone();
        swapped.swap(0, 1);
        assert_ne!(
            MerkleTree::build::<Sha3Hasher>(l).unwrap().root(),
            MerkleTree::build::<Sha3Hasher>(swapped).unwrap().root()
        );
    }

    #[test]
    fn paths_recompute_root() {
        fn prop(n: u8) -> TestResult {
            let n = n as usize % 70;
            if n == 0 {
                return TestResult::discard();
            }
            let l = leaves(n);
            let tree = MerkleTree::build::<Sha3Hasher>(l.clone()).unwrap();
            for (i, leaf) in l.iter().enumerate() {
                let path = tree.authentication_path(i).unwrap();
                if compute_root::<Sha3Hasher>(leaf, i as u64, &path) != tree.root() {
                    return TestResult::failed();
                }
            }
            TestResult::passed()
        }
        quickcheck(prop as fn(u8) -> TestResult);
    }
}
