//! Byte framing for verification jobs and replies.
//!
//! All frames are MAGIC prefix + bincode payload. The transport between the
//! pipeline and the workers carries only these opaque frames; decoding into
//! [`VerifyJob`]/[`Verdict`] values happens at the endpoints, so the same
//! channel works whether workers are tasks, threads, or separate processes.

use beck_core::constants::MAX_TX_SIZE;

use crate::engine::{Verdict, VerifyJob};

/// Four-byte frame prefix identifying the verify protocol.
pub const VERIFY_MAGIC: [u8; 4] = *b"BVFY";

/// Maximum job frame size: one transaction plus its input coins and flags.
pub const MAX_JOB_SIZE: usize = MAX_TX_SIZE + 64 * 1024;

/// Maximum reply frame size. Verdicts are tiny.
pub const MAX_REPLY_SIZE: usize = 1024;

/// Encode a job as MAGIC + bincode payload.
///
/// Returns `None` if the encoded size exceeds [`MAX_JOB_SIZE`].
pub fn encode_job(job: &VerifyJob) -> Option<Vec<u8>> {
    encode(job, MAX_JOB_SIZE)
}

/// Decode a job frame. Returns `None` on bad magic, oversize, or a payload
/// that does not parse.
pub fn decode_job(data: &[u8]) -> Option<VerifyJob> {
    decode(data, MAX_JOB_SIZE)
}

/// Encode a verdict reply as MAGIC + bincode payload.
pub fn encode_reply(verdict: &Verdict) -> Option<Vec<u8>> {
    encode(verdict, MAX_REPLY_SIZE)
}

/// Decode a verdict reply frame.
pub fn decode_reply(data: &[u8]) -> Option<Verdict> {
    decode(data, MAX_REPLY_SIZE)
}

fn encode<T: bincode::Encode>(value: &T, max: usize) -> Option<Vec<u8>> {
    let payload = bincode::encode_to_vec(value, bincode::config::standard()).ok()?;
    let total = VERIFY_MAGIC.len() + payload.len();
    if total > max {
        return None;
    }
    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&VERIFY_MAGIC);
    buf.extend_from_slice(&payload);
    Some(buf)
}

fn decode<T: bincode::Decode<()>>(data: &[u8], max: usize) -> Option<T> {
    if data.len() > max || data.len() < VERIFY_MAGIC.len() {
        return None;
    }
    if data[..VERIFY_MAGIC.len()] != VERIFY_MAGIC {
        return None;
    }
    let payload = &data[VERIFY_MAGIC.len()..];
    let (value, _): (T, usize) =
        bincode::decode_from_slice(payload, bincode::config::standard()).ok()?;
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScriptError;
    use beck_core::traits::ScriptFlags;
    use beck_core::types::{
        Hash256, LockingPredicate, OutPoint, Transaction, TxInput, TxOutput,
    };

    fn sample_job() -> VerifyJob {
        VerifyJob::new(
            Transaction {
                version: 1,
                inputs: vec![TxInput {
                    previous_output: OutPoint {
                        txid: Hash256([0x11; 32]),
                        index: 0,
                    },
                    witness: None,
                }],
                outputs: vec![TxOutput {
                    value: 500,
                    lock: LockingPredicate::Open,
                }],
                lock_time: 0,
            },
            vec![],
            ScriptFlags::default(),
        )
    }

    #[test]
    fn job_frame_round_trip() {
        let job = sample_job();
        let frame = encode_job(&job).unwrap();
        assert_eq!(&frame[..4], &VERIFY_MAGIC);
        assert_eq!(decode_job(&frame).unwrap(), job);
    }

    #[test]
    fn reply_frame_round_trip() {
        let verdict = Verdict::InvalidMalleated(ScriptError::MissingWitness { input: 0 });
        let frame = encode_reply(&verdict).unwrap();
        assert_eq!(decode_reply(&frame).unwrap(), verdict);
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let mut frame = encode_job(&sample_job()).unwrap();
        frame[0] = b'X';
        assert!(decode_job(&frame).is_none());
    }

    #[test]
    fn decode_rejects_truncated_frame() {
        assert!(decode_job(b"BV").is_none());
        assert!(decode_reply(&[]).is_none());
    }

    #[test]
    fn decode_rejects_garbage_payload() {
        let mut frame = VERIFY_MAGIC.to_vec();
        frame.extend_from_slice(&[0xFF; 16]);
        assert!(decode_reply(&frame).is_none());
    }

    #[test]
    fn oversized_job_refused_at_encode() {
        let mut job = sample_job();
        job.tx.inputs[0].witness = Some(beck_core::types::Witness {
            signature: vec![0u8; MAX_JOB_SIZE],
            public_key: vec![],
        });
        assert!(encode_job(&job).is_none());
    }
}
