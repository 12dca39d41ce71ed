//! Bounded worker pool for script verification.
//!
//! Verification is the CPU-heavy step of admission and the only one allowed
//! off the pool's serialized path. [`WorkerPool`] runs a [`ScriptEngine`]
//! on N background tasks fed by a single byte-oriented job channel; each job
//! carries an opaque encoded frame and a one-shot reply channel. Because the
//! transport is bytes-in/bytes-out, the same topology works for in-process
//! tasks or external worker processes.
//!
//! Worker loss is observable: a dropped reply channel or a closed job
//! channel surfaces as [`VerifierError::WorkerLost`], never as a silent
//! hang. Slow jobs are cut off by [`WorkerPoolConfig::job_timeout`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::{ScriptEngine, Verdict, VerifyJob};
use crate::wire;

/// Failures of the verification transport itself, as opposed to verdicts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifierError {
    #[error("verification worker lost: {0}")] WorkerLost(String),
    #[error("verification timed out after {0:?}")] Timeout(Duration),
    #[error("verification frame codec error: {0}")] Codec(String),
}

/// Asynchronous verification seam consumed by the admission pipeline.
///
/// The pipeline suspends on `verify` without holding any pool lock; the
/// result rejoins the serialized section before any state is mutated.
#[async_trait]
pub trait TxVerifier: Send + Sync {
    /// Verify one job, returning the engine's verdict or a transport failure.
    async fn verify(&self, job: VerifyJob) -> Result<Verdict, VerifierError>;
}

/// Run the engine directly on the caller's task.
///
/// Useful for tests and single-threaded embedders; the contract is
/// identical to [`WorkerPool`] minus the transport failure modes.
pub struct InlineVerifier {
    engine: Arc<dyn ScriptEngine>,
}

impl InlineVerifier {
    /// Wrap an engine for synchronous, in-task execution.
    pub fn new(engine: Arc<dyn ScriptEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl TxVerifier for InlineVerifier {
    async fn verify(&self, job: VerifyJob) -> Result<Verdict, VerifierError> {
        Ok(self.engine.execute(&job))
    }
}

/// Configuration for [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker tasks.
    pub workers: usize,
    /// Maximum wall-clock time to wait for one job's reply.
    pub job_timeout: Duration,
    /// Job channel capacity; senders back-pressure when full.
    pub queue_depth: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            job_timeout: Duration::from_secs(5),
            queue_depth: 256,
        }
    }
}

/// One queued unit of work: an encoded job frame and its reply slot.
struct Job {
    frame: Bytes,
    reply: oneshot::Sender<Bytes>,
}

/// A bounded pool of verification workers behind a byte channel.
pub struct WorkerPool {
    job_tx: parking_lot::Mutex<Option<mpsc::Sender<Job>>>,
    handles: Vec<JoinHandle<()>>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    /// Spawn `config.workers` tasks running the given engine.
    pub fn spawn(engine: Arc<dyn ScriptEngine>, config: WorkerPoolConfig) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<Job>(config.queue_depth);
        let job_rx = Arc::new(tokio::sync::Mutex::new(job_rx));

        let mut handles = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let rx = Arc::clone(&job_rx);
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                debug!(worker_id, "verify worker started");
                loop {
                    let job = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(job) = job else {
                        debug!(worker_id, "verify worker stopping: channel closed");
                        break;
                    };
                    Self::serve(worker_id, &*engine, job);
                }
            }));
        }

        Self {
            job_tx: parking_lot::Mutex::new(Some(job_tx)),
            handles,
            config,
        }
    }

    /// Decode, execute, and answer one job. A frame that does not decode
    /// gets no reply; the submitter observes the dropped channel as a lost
    /// worker rather than a fabricated verdict.
    fn serve(worker_id: usize, engine: &dyn ScriptEngine, job: Job) {
        let Some(decoded) = wire::decode_job(&job.frame) else {
            warn!(worker_id, "discarding malformed job frame");
            return;
        };
        let verdict = engine.execute(&decoded);
        let Some(frame) = wire::encode_reply(&verdict) else {
            warn!(worker_id, "failed to encode reply frame");
            return;
        };
        let _ = job.reply.send(Bytes::from(frame));
    }

    /// Close the job channel. Workers exit after draining; in-flight and
    /// subsequent submissions fail with [`VerifierError::WorkerLost`].
    pub fn shutdown(&self) {
        self.job_tx.lock().take();
    }

    /// Number of worker tasks that have finished.
    pub fn finished_workers(&self) -> usize {
        self.handles.iter().filter(|h| h.is_finished()).count()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl TxVerifier for WorkerPool {
    async fn verify(&self, job: VerifyJob) -> Result<Verdict, VerifierError> {
        let frame = wire::encode_job(&job)
            .ok_or_else(|| VerifierError::Codec("job exceeds frame limit".into()))?;

        let sender = self
            .job_tx
            .lock()
            .clone()
            .ok_or_else(|| VerifierError::WorkerLost("pool is shut down".into()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        sender
            .send(Job {
                frame: Bytes::from(frame),
                reply: reply_tx,
            })
            .await
            .map_err(|_| VerifierError::WorkerLost("job channel closed".into()))?;

        let reply = tokio::time::timeout(self.config.job_timeout, reply_rx)
            .await
            .map_err(|_| VerifierError::Timeout(self.config.job_timeout))?
            .map_err(|_| VerifierError::WorkerLost("reply channel dropped".into()))?;

        wire::decode_reply(&reply)
            .ok_or_else(|| VerifierError::Codec("malformed reply frame".into()))
    }
}
