//! In-order execution queues and the gates the host waits on.
//!
//! Each [`ExecutionQueue`] owns one worker thread that runs submitted commands strictly in
//! submission order. Two queues never coordinate with each other. Faults are sticky: once
//! a command fails, the rest of the queue's commands are skipped and the fault stays on
//! the queue's [`SyncGate`].

use super::error::OffloadError;
use crate::core::models::locality::LocalityClass;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Transfer,
    Kernel,
    ResultCopy,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transfer => "transfer",
            Self::Kernel => "kernel",
            Self::ResultCopy => "result copy",
        })
    }
}

/// Work executed on a queue's worker.
pub type Command = Box<dyn FnOnce() -> Result<(), String> + Send + 'static>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFault {
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Default)]
struct GateStatus {
    submitted: u64,
    completed: u64,
    fault: Option<QueueFault>,
}

#[derive(Debug, Default)]
struct GateInner {
    status: Mutex<GateStatus>,
    drained: Condvar,
}

/// Completion tracking for one queue.
#[derive(Debug, Clone, Default)]
pub struct SyncGate {
    inner: Arc<GateInner>,
}

impl SyncGate {
    /// Blocks until every command submitted so far has run or been skipped.
    pub fn wait(&self) -> Result<(), QueueFault> {
        let mut status = self.inner.status.lock();
        while status.completed < status.submitted {
            self.inner.drained.wait(&mut status);
        }
        match &status.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }

    pub fn is_idle(&self) -> bool {
        let status = self.inner.status.lock();
        status.completed == status.submitted
    }

    pub fn fault(&self) -> Option<QueueFault> {
        self.inner.status.lock().fault.clone()
    }

    pub fn outstanding(&self) -> u64 {
        let status = self.inner.status.lock();
        status.submitted - status.completed
    }

    fn record_submit(&self) {
        self.inner.status.lock().submitted += 1;
    }

    fn record_completion(&self, fault: Option<QueueFault>) {
        let mut status = self.inner.status.lock();
        status.completed += 1;
        if status.fault.is_none() {
            status.fault = fault;
        }
        if status.completed == status.submitted {
            self.inner.drained.notify_all();
        }
    }
}

struct Job {
    stage: Stage,
    command: Command,
}

pub struct ExecutionQueue {
    locality: LocalityClass,
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    gate: SyncGate,
}

impl ExecutionQueue {
    pub fn spawn(locality: LocalityClass) -> Result<Self, OffloadError> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let gate = SyncGate::default();
        let worker_gate = gate.clone();
        let worker = thread::Builder::new()
            .name(format!("nbflow-{}", locality.as_str()))
            .spawn(move || {
                for job in receiver {
                    let fault = if worker_gate.fault().is_some() {
                        trace!(stage = %job.stage, "Skipping command on faulted queue");
                        None
                    } else {
                        run_job(job)
                    };
                    worker_gate.record_completion(fault);
                }
            })
            .map_err(|source| OffloadError::QueueStartup { locality, source })?;

        Ok(Self {
            locality,
            sender: Some(sender),
            worker: Some(worker),
            gate,
        })
    }

    pub fn locality(&self) -> LocalityClass {
        self.locality
    }

    pub fn gate(&self) -> &SyncGate {
        &self.gate
    }

    /// Enqueues `command` behind everything already submitted. Never blocks.
    pub fn submit(&self, stage: Stage, command: Command) {
        trace!(locality = %self.locality, %stage, "Issuing command");
        self.gate.record_submit();
        let sent = match &self.sender {
            Some(sender) => sender.send(Job { stage, command }).is_ok(),
            None => false,
        };
        if !sent {
            self.gate.record_completion(Some(QueueFault {
                stage,
                message: "execution queue worker is gone".to_string(),
            }));
        }
    }
}

fn run_job(job: Job) -> Option<QueueFault> {
    let stage = job.stage;
    let outcome = panic::catch_unwind(AssertUnwindSafe(job.command));
    let message = match outcome {
        Ok(Ok(())) => return None,
        Ok(Err(message)) => message,
        Err(_) => "command panicked".to_string(),
    };
    warn!(%stage, %message, "Queued command failed");
    Some(QueueFault { stage, message })
}

impl Drop for ExecutionQueue {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish queued work and exit.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
