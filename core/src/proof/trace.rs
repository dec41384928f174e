//! Execution traces of leaf-to-root recombination and the constraints derived from them.

use crate::{
    hasher::{Digest, NodeHasher, HEX_LEN},
    tree::AuthPath,
};

use alloc::{string::String, vec::Vec};

/// A single combining step of an [`ExecutionTrace`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "borsh",
    derive(borsh::BorshDeserialize, borsh::BorshSerialize)
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombineStep {
    /// The position of this step in the trace, starting at 1.
    pub step: u32,
    /// The node being combined.
    pub current_hash: Digest,
    /// The index of the node being combined, within its level.
    pub current_index: u64,
    /// The sibling taken from the authentication path.
    pub sibling_hash: Digest,
    /// Whether the current node is the left child of its parent.
    pub is_left_child: bool,
    /// The parent preimage: the hex renderings of left and right, concatenated.
    pub parent_input: String,
    /// The index of the parent within its level.
    pub parent_index: u64,
    /// The hash of `parent_input`.
    pub parent_hash: Digest,
}

/// One step of an [`ExecutionTrace`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "borsh",
    derive(borsh::BorshDeserialize, borsh::BorshSerialize)
)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "operation", rename_all = "snake_case")
)]
pub enum TraceStep {
    /// Step 0: the leaf and its index.
    Initialize {
        step: u32,
        current_hash: Digest,
        current_index: u64,
    },
    /// A step combining the current node with its sibling.
    HashCombine(CombineStep),
}

impl TraceStep {
    /// The position of this step in the trace.
    pub fn step(&self) -> u32 {
        match self {
            TraceStep::Initialize { step, .. } => *step,
            TraceStep::HashCombine(c) => c.step,
        }
    }

    /// The node carried out of this step: the leaf for step 0, the parent otherwise.
    pub fn output_hash(&self) -> Digest {
        match self {
            TraceStep::Initialize { current_hash, .. } => *current_hash,
            TraceStep::HashCombine(c) => c.parent_hash,
        }
    }

    /// The index carried out of this step: the leaf index for step 0, the parent index
    /// otherwise.
    pub fn output_index(&self) -> u64 {
        match self {
            TraceStep::Initialize { current_index, .. } => *current_index,
            TraceStep::HashCombine(c) => c.parent_index,
        }
    }
}

/// An ordered sequence of trace steps. Step 0 is always [`TraceStep::Initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "borsh",
    derive(borsh::BorshDeserialize, borsh::BorshSerialize)
)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct ExecutionTrace(pub Vec<TraceStep>);

impl ExecutionTrace {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.0
    }

    /// The node carried out of the last step, which is the recomputed root for a complete trace.
    pub fn final_hash(&self) -> Option<Digest> {
        self.0.last().map(TraceStep::output_hash)
    }
}

/// The kind of a [`Constraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ConstraintKind {
    HashCorrectness,
    IndexProgression,
    ChildPosition,
}

/// A single correctness check over one combining step.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "borsh",
    derive(borsh::BorshDeserialize, borsh::BorshSerialize)
)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "type", rename_all = "snake_case")
)]
pub enum Constraint {
    /// The recorded parent preimage follows the concatenation rule and hashes to the recorded
    /// parent.
    HashCorrectness {
        step: u32,
        expected_input: String,
        actual_input: String,
        expected_output: Digest,
        actual_output: Digest,
        satisfied: bool,
    },
    /// The recorded parent index is the carried index, halved.
    IndexProgression {
        step: u32,
        prev_index: u64,
        expected_index: u64,
        actual_index: u64,
        satisfied: bool,
    },
    /// The recorded child position matches the parity of the carried index.
    ChildPosition {
        step: u32,
        index: u64,
        expected_is_left: bool,
        actual_is_left: bool,
        satisfied: bool,
    },
}

impl Constraint {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Constraint::HashCorrectness { .. } => ConstraintKind::HashCorrectness,
            Constraint::IndexProgression { .. } => ConstraintKind::IndexProgression,
            Constraint::ChildPosition { .. } => ConstraintKind::ChildPosition,
        }
    }

    pub fn step(&self) -> u32 {
        match self {
            Constraint::HashCorrectness { step, .. }
            | Constraint::IndexProgression { step, .. }
            | Constraint::ChildPosition { step, .. } => *step,
        }
    }

    pub fn satisfied(&self) -> bool {
        match self {
            Constraint::HashCorrectness { satisfied, .. }
            | Constraint::IndexProgression { satisfied, .. }
            | Constraint::ChildPosition { satisfied, .. } => *satisfied,
        }
    }
}

/// Concatenate the hex renderings of two nodes in the order given by the child position.
pub fn parent_input(current: &Digest, sibling: &Digest, is_left_child: bool) -> String {
    let (left, right) = if is_left_child {
        (current, sibling)
    } else {
        (sibling, current)
    };
    let mut input = String::with_capacity(HEX_LEN * 2);
    // UNWRAP: hex renderings are ASCII.
    input.push_str(core::str::from_utf8(&left.hex_bytes()).unwrap());
    input.push_str(core::str::from_utf8(&right.hex_bytes()).unwrap());
    input
}

/// Record the recombination of a leaf up to the root as an execution trace.
///
/// This does no sanity-checking of the inputs: index bits above the path length are ignored,
/// exactly as a walk up the tree would ignore them.
pub fn record_trace<H: NodeHasher>(
    leaf_hash: &Digest,
    leaf_index: u64,
    auth_path: &AuthPath,
) -> ExecutionTrace {
    let mut steps = Vec::with_capacity(auth_path.len() + 1);
    steps.push(TraceStep::Initialize {
        step: 0,
        current_hash: *leaf_hash,
        current_index: leaf_index,
    });

    let mut current_hash = *leaf_hash;
    let mut current_index = leaf_index;
    for (level, sibling_hash) in auth_path.iter().enumerate() {
        let is_left_child = current_index % 2 == 0;
        let parent_input = parent_input(&current_hash, sibling_hash, is_left_child);
        let parent_hash = H::hash_str(&parent_input);
        let parent_index = current_index / 2;

        steps.push(TraceStep::HashCombine(CombineStep {
            step: level as u32 + 1,
            current_hash,
            current_index,
            sibling_hash: *sibling_hash,
            is_left_child,
            parent_input,
            parent_index,
            parent_hash,
        }));

        current_hash = parent_hash;
        current_index = parent_index;
    }

    ExecutionTrace(steps)
}

/// Derive the three constraints of every combining step in a trace.
///
/// Constraints are computed from the recorded values alone, carrying the index from one step to
/// the next. Steps which are not combining steps (step 0, or a misplaced initialization) produce
/// no constraints.
pub fn derive_constraints<H: NodeHasher>(trace: &ExecutionTrace) -> Vec<Constraint> {
    let mut constraints = Vec::with_capacity(trace.len().saturating_sub(1) * 3);
    let mut carried_index = match trace.steps().first() {
        Some(first) => first.output_index(),
        None => return constraints,
    };

    for step in trace.steps().iter().skip(1) {
        let c = match step {
            TraceStep::HashCombine(c) => c,
            TraceStep::Initialize { .. } => continue,
        };

        let expected_input = parent_input(&c.current_hash, &c.sibling_hash, c.is_left_child);
        let expected_output = H::hash_str(&c.parent_input);
        let hash_ok = expected_input == c.parent_input && expected_output == c.parent_hash;
        constraints.push(Constraint::HashCorrectness {
            step: c.step,
            satisfied: hash_ok,
            expected_output,
            actual_output: c.parent_hash,
            expected_input,
            actual_input: c.parent_input.clone(),
        });

        let expected_index = carried_index / 2;
        constraints.push(Constraint::IndexProgression {
            step: c.step,
            prev_index: carried_index,
            expected_index,
            actual_index: c.parent_index,
            satisfied: expected_index == c.parent_index,
        });

        let expected_is_left = carried_index % 2 == 0;
        constraints.push(Constraint::ChildPosition {
            step: c.step,
            index: carried_index,
            expected_is_left,
            actual_is_left: c.is_left_child,
            satisfied: expected_is_left == c.is_left_child,
        });

        carried_index = c.parent_index;
    }

    constraints
}
