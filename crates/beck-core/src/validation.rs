//! Context-free transaction validation.
//!
//! [`validate_structure`] checks transaction format and internal
//! consistency without touching chain state or witness contents. Witness
//! verification is the script verifier's concern: witness bytes sit outside
//! the identity hash, so any witness-derived rejection must go through the
//! verifier's malleation classification rather than through these checks.
//!
//! One consequence: every error produced here except
//! [`TxError::OversizedTransaction`] (whose size includes witness bytes) is
//! fully determined by the transaction identity and is safe to record in the
//! negative cache.

use std::collections::HashSet;

use crate::constants::{MAX_COINBASE_DATA, MAX_TX_SIZE};
use crate::error::TxError;
use crate::types::Transaction;

/// Validate transaction structure (context-free).
///
/// Checks that apply to both coinbase and regular transactions:
/// - Non-empty inputs and outputs
/// - All output values are non-zero
/// - Total output value does not overflow
/// - Serialized size is within [`MAX_TX_SIZE`]
///
/// Coinbase-specific: exactly one null-outpoint input, coinbase data within
/// size limit. Regular transactions: no null outpoints, no duplicate input
/// outpoints.
pub fn validate_structure(tx: &Transaction) -> Result<(), TxError> {
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Err(TxError::EmptyInputsOrOutputs);
    }

    for (i, output) in tx.outputs.iter().enumerate() {
        if output.value == 0 {
            return Err(TxError::ZeroValueOutput(i));
        }
    }

    if tx.total_output_value().is_none() {
        return Err(TxError::ValueOverflow);
    }

    let encoded = tx.encode()?;
    if encoded.len() > MAX_TX_SIZE {
        return Err(TxError::OversizedTransaction {
            size: encoded.len(),
            max: MAX_TX_SIZE,
        });
    }

    if tx.is_coinbase() {
        validate_coinbase_structure(tx)?;
    } else {
        validate_regular_structure(tx)?;
    }

    Ok(())
}

/// Coinbase-specific structure: exactly one input with null outpoint, data
/// carried in the witness signature field within [`MAX_COINBASE_DATA`].
fn validate_coinbase_structure(tx: &Transaction) -> Result<(), TxError> {
    if tx.inputs.len() != 1 {
        return Err(TxError::InvalidCoinbase("must have exactly one input".into()));
    }

    if !tx.inputs[0].previous_output.is_null() {
        return Err(TxError::InvalidCoinbase("input must be null outpoint".into()));
    }

    if let Some(witness) = &tx.inputs[0].witness {
        if witness.signature.len() > MAX_COINBASE_DATA {
            return Err(TxError::InvalidCoinbase(format!(
                "data too large: {} > {MAX_COINBASE_DATA}",
                witness.signature.len(),
            )));
        }
    }

    Ok(())
}

/// Regular transaction structure: no null outpoints, no duplicate inputs.
fn validate_regular_structure(tx: &Transaction) -> Result<(), TxError> {
    let mut seen = HashSet::with_capacity(tx.inputs.len());

    for (i, input) in tx.inputs.iter().enumerate() {
        if input.previous_output.is_null() {
            return Err(TxError::NullOutpointInRegularTx(i));
        }

        if !seen.insert(&input.previous_output) {
            return Err(TxError::DuplicateInput(input.previous_output.to_string()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COIN;
    use crate::types::{Hash256, LockingPredicate, OutPoint, TxInput, TxOutput, Witness};

    // --- Helpers ---

    fn output(value: u64) -> TxOutput {
        TxOutput {
            value,
            lock: LockingPredicate::KeyHash(Hash256([0xAA; 32])),
        }
    }

    fn input(seed: u8, index: u64) -> TxInput {
        TxInput {
            previous_output: OutPoint {
                txid: Hash256([seed; 32]),
                index,
            },
            witness: None,
        }
    }

    fn regular_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![input(0x11, 0)],
            outputs: vec![output(50 * COIN)],
            lock_time: 0,
        }
    }

    fn coinbase_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint::null(),
                witness: Some(Witness {
                    signature: b"height 1".to_vec(),
                    public_key: vec![],
                }),
            }],
            outputs: vec![output(50 * COIN)],
            lock_time: 0,
        }
    }

    // --- Common checks ---

    #[test]
    fn rejects_empty_inputs() {
        let mut tx = regular_tx();
        tx.inputs.clear();
        assert_eq!(
            validate_structure(&tx).unwrap_err(),
            TxError::EmptyInputsOrOutputs
        );
    }

    #[test]
    fn rejects_empty_outputs() {
        let mut tx = regular_tx();
        tx.outputs.clear();
        assert_eq!(
            validate_structure(&tx).unwrap_err(),
            TxError::EmptyInputsOrOutputs
        );
    }

    #[test]
    fn rejects_zero_value_output() {
        let mut tx = regular_tx();
        tx.outputs.push(output(0));
        assert_eq!(
            validate_structure(&tx).unwrap_err(),
            TxError::ZeroValueOutput(1)
        );
    }

    #[test]
    fn rejects_output_value_overflow() {
        let mut tx = regular_tx();
        tx.outputs = vec![output(u64::MAX), output(1)];
        assert_eq!(validate_structure(&tx).unwrap_err(), TxError::ValueOverflow);
    }

    #[test]
    fn rejects_oversized_transaction() {
        let mut tx = regular_tx();
        // Pad the witness over the size limit; the identity is unaffected.
        tx.inputs[0].witness = Some(Witness {
            signature: vec![0u8; MAX_TX_SIZE + 1],
            public_key: vec![0u8; 32],
        });
        let err = validate_structure(&tx).unwrap_err();
        assert!(matches!(err, TxError::OversizedTransaction { .. }));
        assert!(err.is_witness_sensitive());
    }

    // --- Regular transactions ---

    #[test]
    fn accepts_valid_regular_tx() {
        validate_structure(&regular_tx()).unwrap();
    }

    #[test]
    fn rejects_null_outpoint_in_regular_tx() {
        let mut tx = regular_tx();
        tx.inputs.push(TxInput {
            previous_output: OutPoint::null(),
            witness: None,
        });
        assert_eq!(
            validate_structure(&tx).unwrap_err(),
            TxError::NullOutpointInRegularTx(1)
        );
    }

    #[test]
    fn rejects_duplicate_inputs() {
        let mut tx = regular_tx();
        tx.inputs.push(input(0x11, 0));
        assert!(matches!(
            validate_structure(&tx).unwrap_err(),
            TxError::DuplicateInput(_)
        ));
    }

    #[test]
    fn witness_contents_are_not_checked_here() {
        // Garbage witness bytes pass structural validation; classifying them
        // is the verifier's job.
        let mut tx = regular_tx();
        tx.inputs[0].witness = Some(Witness {
            signature: vec![0xFF; 3],
            public_key: vec![0xEE; 5],
        });
        validate_structure(&tx).unwrap();
    }

    // --- Coinbase ---

    #[test]
    fn accepts_valid_coinbase() {
        validate_structure(&coinbase_tx()).unwrap();
    }

    #[test]
    fn rejects_coinbase_with_oversized_data() {
        let mut tx = coinbase_tx();
        tx.inputs[0].witness.as_mut().unwrap().signature = vec![0u8; MAX_COINBASE_DATA + 1];
        assert!(matches!(
            validate_structure(&tx).unwrap_err(),
            TxError::InvalidCoinbase(_)
        ));
    }

    #[test]
    fn deterministic_errors_are_not_witness_sensitive() {
        assert!(!TxError::EmptyInputsOrOutputs.is_witness_sensitive());
        assert!(!TxError::ZeroValueOutput(0).is_witness_sensitive());
        assert!(!TxError::DuplicateInput("x".into()).is_witness_sensitive());
        assert!(!TxError::NullOutpointInRegularTx(0).is_witness_sensitive());
        assert!(!TxError::ValueOverflow.is_witness_sensitive());
    }
}
