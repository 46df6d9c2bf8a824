//! Append-Only Merkle Mountain Range (MMR) Accumulator
//!
//! Commits every outbound message into a flat array of 32-byte nodes.
//! Leaves are appended in nonce order; whenever two peaks of equal height
//! exist after an append, they merge into a parent node which is itself
//! appended. Node positions are assigned strictly sequentially, so the
//! structure after four leaves looks like:
//!
//! ```text
//!        6            <- peak (root for a 4-leaf range)
//!      /   \
//!     2     5
//!    / \   / \
//!   0   1 3   4       <- leaves at positions 0, 1, 3, 4
//! ```
//!
//! For `L` leaves the node count follows the MMR growth law
//! `node_count == 2*L - popcount(L)`. The root bags all current peaks
//! right-to-left with the position-ordered merge rule from [`crate::hash`];
//! a single peak is the root itself, so a 1-leaf accumulator's root is that
//! leaf hash. The all-zero sentinel is returned only while no leaves exist.
//!
//! Proofs are snapshot-bound: verification runs against the leaf count and
//! root at generation time, and stays valid for that snapshot forever.

use cosmwasm_std::{StdResult, Storage};

use crate::error::ContractError;
use crate::hash::hash_pair;
use crate::state::{LEAF_COUNT, MMR_NODES, NODE_COUNT};

/// Root of the empty accumulator
pub const EMPTY_ROOT: [u8; 32] = [0u8; 32];

/// Append a leaf hash and merge peaks until no two peaks share a height.
///
/// Returns the index of the new leaf (its nonce) and the new root.
pub fn append(storage: &mut dyn Storage, leaf: [u8; 32]) -> Result<(u64, [u8; 32]), ContractError> {
    let leaf_index = LEAF_COUNT.may_load(storage)?.unwrap_or(0);
    let mut pos = NODE_COUNT.may_load(storage)?.unwrap_or(0);

    MMR_NODES.save(storage, pos, &leaf)?;

    let mut top = leaf;
    let mut height = 0u32;
    // the number of merges an append triggers equals the number of
    // trailing zero bits of the new leaf count
    let merges = (leaf_index + 1).trailing_zeros();
    for _ in 0..merges {
        // the left peak of equal height sits one full subtree behind
        let subtree_nodes = (1u64 << (height + 1)) - 1;
        let left = MMR_NODES.load(storage, pos - subtree_nodes)?;
        top = hash_pair(&left, &top);
        pos += 1;
        MMR_NODES.save(storage, pos, &top)?;
        height += 1;
    }

    LEAF_COUNT.save(storage, &(leaf_index + 1))?;
    NODE_COUNT.save(storage, &(pos + 1))?;

    let new_root = root(storage)?;
    Ok((leaf_index, new_root))
}

/// Current root: all peaks bagged right-to-left.
pub fn root(storage: &dyn Storage) -> StdResult<[u8; 32]> {
    let leaf_count = LEAF_COUNT.may_load(storage)?.unwrap_or(0);
    if leaf_count == 0 {
        return Ok(EMPTY_ROOT);
    }

    let mut peaks = Vec::new();
    for pos in peak_positions(leaf_count) {
        peaks.push(MMR_NODES.load(storage, pos)?);
    }
    Ok(bag_peaks(&peaks))
}

/// Read a raw node by its flat-array position.
pub fn get_node(storage: &dyn Storage, index: u64) -> Result<[u8; 32], ContractError> {
    let node_count = NODE_COUNT.may_load(storage)?.unwrap_or(0);
    if index >= node_count {
        return Err(ContractError::InvalidNodeIndex { index, node_count });
    }
    Ok(MMR_NODES.load(storage, index)?)
}

/// Generate a membership proof for a leaf.
///
/// Proof layout, consumed in order by [`verify_proof`]:
/// 1. the sibling at each level inside the leaf's mountain, bottom-up;
/// 2. if peaks exist to the right of that mountain, their right-to-left bag
///    as a single hash;
/// 3. each peak to the left of the mountain, rightmost first.
///
/// A single-leaf accumulator yields an empty proof. Returns the proof and
/// the leaf count it is bound to.
pub fn generate_proof(
    storage: &dyn Storage,
    leaf_index: u64,
) -> Result<(Vec<[u8; 32]>, u64), ContractError> {
    let leaf_count = LEAF_COUNT.may_load(storage)?.unwrap_or(0);
    if leaf_count == 0 {
        return Err(ContractError::EmptyAccumulator {});
    }
    if leaf_index >= leaf_count {
        return Err(ContractError::LeafIndexOutOfBounds {
            leaf_index,
            leaf_count,
        });
    }

    let (height, start_leaf, node_offset, peak_index) = locate_mountain(leaf_index, leaf_count)
        .ok_or(ContractError::LeafIndexOutOfBounds {
            leaf_index,
            leaf_count,
        })?;
    let local = leaf_index - start_leaf;

    let mut proof = Vec::new();
    for h in 0..height {
        let sibling_block = (local >> h) ^ 1;
        let pos = node_offset + subtree_root_pos(sibling_block, h);
        proof.push(MMR_NODES.load(storage, pos)?);
    }

    let peak_pos = peak_positions(leaf_count);
    let mut peaks = Vec::with_capacity(peak_pos.len());
    for pos in &peak_pos {
        peaks.push(MMR_NODES.load(storage, *pos)?);
    }
    if peak_index + 1 < peaks.len() {
        proof.push(bag_peaks(&peaks[peak_index + 1..]));
    }
    for peak in peaks[..peak_index].iter().rev() {
        proof.push(*peak);
    }

    Ok((proof, leaf_count))
}

/// Recompute the root from a leaf and its proof against a leaf-count
/// snapshot. Pure: shared by the verification query and remote verifiers.
pub fn verify_proof(
    leaf: &[u8; 32],
    leaf_index: u64,
    leaf_count: u64,
    proof: &[[u8; 32]],
    root: &[u8; 32],
) -> bool {
    if leaf_count == 0 || leaf_index >= leaf_count {
        return false;
    }
    let (height, start_leaf, _, peak_index) = match locate_mountain(leaf_index, leaf_count) {
        Some(m) => m,
        None => return false,
    };
    let local = leaf_index - start_leaf;
    let peak_count = leaf_count.count_ones() as usize;

    let mut acc = *leaf;
    let mut idx = 0usize;
    for h in 0..height {
        let sibling = match proof.get(idx) {
            Some(s) => s,
            None => return false,
        };
        idx += 1;
        if (local >> h) & 1 == 0 {
            acc = hash_pair(&acc, sibling);
        } else {
            acc = hash_pair(sibling, &acc);
        }
    }

    // bagged right peaks, then left peaks rightmost-first, mirroring root()
    if peak_index + 1 < peak_count {
        let bagged = match proof.get(idx) {
            Some(s) => s,
            None => return false,
        };
        idx += 1;
        acc = hash_pair(&acc, bagged);
    }
    for _ in 0..peak_index {
        let peak = match proof.get(idx) {
            Some(s) => s,
            None => return false,
        };
        idx += 1;
        acc = hash_pair(peak, &acc);
    }

    idx == proof.len() && acc == *root
}

/// Positions of all current peaks, left to right. Each set bit of the leaf
/// count is one perfect mountain of `2^bit` leaves occupying
/// `2*2^bit - 1` nodes; its peak is its last node.
fn peak_positions(leaf_count: u64) -> Vec<u64> {
    let mut peaks = Vec::with_capacity(leaf_count.count_ones() as usize);
    let mut offset = 0u64;
    for bit in (0..64).rev() {
        if leaf_count & (1u64 << bit) == 0 {
            continue;
        }
        let leaves = 1u64 << bit;
        peaks.push(offset + 2 * leaves - 2);
        offset += 2 * leaves - 1;
    }
    peaks
}

/// Bag peaks right-to-left into a single hash. A lone peak is its own bag.
fn bag_peaks(peaks: &[[u8; 32]]) -> [u8; 32] {
    let mut acc = peaks[peaks.len() - 1];
    for peak in peaks[..peaks.len() - 1].iter().rev() {
        acc = hash_pair(peak, &acc);
    }
    acc
}

/// Find the mountain containing a leaf: returns
/// `(mountain height, first leaf index, node offset, peak ordinal)`.
fn locate_mountain(leaf_index: u64, leaf_count: u64) -> Option<(u32, u64, u64, usize)> {
    let mut start_leaf = 0u64;
    let mut node_offset = 0u64;
    let mut peak_index = 0usize;
    for bit in (0..64).rev() {
        if leaf_count & (1u64 << bit) == 0 {
            continue;
        }
        let leaves = 1u64 << bit;
        if leaf_index < start_leaf + leaves {
            return Some((bit, start_leaf, node_offset, peak_index));
        }
        start_leaf += leaves;
        node_offset += 2 * leaves - 1;
        peak_index += 1;
    }
    None
}

/// Position (within one perfect mountain) of the root of the height-`h`
/// subtree covering leaf block `block`. Nodes are written in insertion
/// order, so this root lands right after the merge chain of the block's
/// last leaf: `2*(x-1) - popcount(x-1) + h` where `x = (block+1) * 2^h`.
fn subtree_root_pos(block: u64, h: u32) -> u64 {
    let x = (block + 1) << h;
    2 * (x - 1) - u64::from((x - 1).count_ones()) + u64::from(h)
}
