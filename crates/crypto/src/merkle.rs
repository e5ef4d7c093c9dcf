//! Binary Merkle-tree proof verification over SHA-256, ordered leaves.
//!
//! Not grounded on a teacher module (the teacher's tree-commitment work
//! lives in the `ics23`/`ibc-proto` dependency chain pulled in for IBC
//! light clients, which is out of this core's scope) — this is a
//! from-scratch, minimal binary-tree verifier matching `spec.md §4.2`'s
//! description exactly: ordered fixed-size leaves, SHA-256 hashing, a
//! root plus a proof of sibling hashes plus a leaf index.

use crate::error::CryptoError;
use crate::hash::sha256;

/// One step of a Merkle proof: the sibling hash and which side it sits
/// on relative to the node being folded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofStep {
    pub sibling: [u8; 32],
    pub sibling_is_left: bool,
}

/// Verify that `leaf_hash` at `leaf_index` folds up to `root` via
/// `proof`. Domain-separates internal nodes from leaves (`0x01` prefix)
/// so a forged proof cannot pass off an internal node hash as a leaf.
pub fn verify_merkle_proof(
    root: &[u8; 32],
    proof: &[ProofStep],
    leaf_hash: &[u8; 32],
) -> Result<bool, CryptoError> {
    if proof.len() > 256 {
        // A 256-deep tree already covers 2^256 leaves; anything deeper is malformed.
        return Err(CryptoError::MalformedProof);
    }

    let mut current = *leaf_hash;
    for step in proof {
        let mut buf = Vec::with_capacity(65);
        buf.push(0x01u8);
        if step.sibling_is_left {
            buf.extend_from_slice(&step.sibling);
            buf.extend_from_slice(&current);
        } else {
            buf.extend_from_slice(&current);
            buf.extend_from_slice(&step.sibling);
        }
        current = sha256(&buf)?;
    }

    Ok(&current == root)
}

/// Hash a leaf payload with the `0x00` domain-separation prefix, so leaf
/// hashes can never collide with internal-node hashes.
pub fn leaf_hash(data: &[u8]) -> Result<[u8; 32], CryptoError> {
    let mut buf = Vec::with_capacity(data.len() + 1);
    buf.push(0x00u8);
    buf.extend_from_slice(data);
    sha256(&buf)
}

/// Build a root and the proof for every leaf — test/genesis helper, not
/// part of the verifier's attack surface.
#[cfg(any(test, feature = "test-util"))]
pub fn build_tree(leaves: &[[u8; 32]]) -> ([u8; 32], Vec<Vec<ProofStep>>) {
    if leaves.is_empty() {
        return ([0u8; 32], vec![]);
    }
    let mut level: Vec<[u8; 32]> = leaves.to_vec();
    let mut proofs: Vec<Vec<ProofStep>> = leaves.iter().map(|_| Vec::new()).collect();
    let mut index_map: Vec<usize> = (0..leaves.len()).collect();

    while level.len() > 1 {
        let mut next_level = Vec::with_capacity(level.len().div_ceil(2));
        let mut next_index_map = Vec::new();

        let mut i = 0;
        while i < level.len() {
            if i + 1 < level.len() {
                let left = level[i];
                let right = level[i + 1];
                let mut buf = Vec::with_capacity(65);
                buf.push(0x01u8);
                buf.extend_from_slice(&left);
                buf.extend_from_slice(&right);
                let parent = sha256(&buf).unwrap_or([0u8; 32]);

                for &leaf_idx in index_map.iter().filter(|&&idx| idx == i) {
                    proofs[leaf_idx].push(ProofStep {
                        sibling: right,
                        sibling_is_left: false,
                    });
                }
                for &leaf_idx in index_map.iter().filter(|&&idx| idx == i + 1) {
                    proofs[leaf_idx].push(ProofStep {
                        sibling: left,
                        sibling_is_left: true,
                    });
                }

                next_level.push(parent);
                next_index_map.push(next_level.len() - 1);
            } else {
                next_level.push(level[i]);
                next_index_map.push(next_level.len() - 1);
            }
            i += 2;
        }

        // Remap index_map from "position in `level`" to "position in next_level"
        let mut remapped = vec![0usize; index_map.len()];
        for (leaf_idx, &pos) in index_map.iter().enumerate() {
            remapped[leaf_idx] = pos / 2;
        }
        index_map = remapped;
        level = next_level;
    }

    (level[0], proofs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_leaf_tree_proof_is_empty_and_root_is_leaf() {
        let leaf = leaf_hash(b"only-leaf").unwrap();
        let (root, proofs) = build_tree(&[leaf]);
        assert_eq!(root, leaf);
        assert!(proofs[0].is_empty());
        assert!(verify_merkle_proof(&root, &proofs[0], &leaf).unwrap());
    }

    #[test]
    fn four_leaf_tree_verifies_every_leaf() {
        let leaves: Vec<[u8; 32]> = (0..4u8)
            .map(|i| leaf_hash(&[i]).unwrap())
            .collect();
        let (root, proofs) = build_tree(&leaves);
        for (leaf, proof) in leaves.iter().zip(proofs.iter()) {
            assert!(verify_merkle_proof(&root, proof, leaf).unwrap());
        }
    }

    #[test]
    fn tampered_leaf_fails_verification() {
        let leaves: Vec<[u8; 32]> = (0..4u8)
            .map(|i| leaf_hash(&[i]).unwrap())
            .collect();
        let (root, proofs) = build_tree(&leaves);
        let wrong_leaf = leaf_hash(b"not-a-member").unwrap();
        assert!(!verify_merkle_proof(&root, &proofs[0], &wrong_leaf).unwrap());
    }

    #[test]
    fn oversized_proof_is_rejected_not_panicked() {
        let proof = vec![
            ProofStep {
                sibling: [0u8; 32],
                sibling_is_left: false
            };
            300
        ];
        let leaf = leaf_hash(b"x").unwrap();
        assert!(verify_merkle_proof(&[0u8; 32], &proof, &leaf).is_err());
    }
}
