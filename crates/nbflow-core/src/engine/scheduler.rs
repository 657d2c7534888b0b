use super::error::OffloadError;
use super::queue::{Command, ExecutionQueue, Stage, SyncGate};
use crate::core::models::locality::LocalityClass;

/// Binds each locality class to its own execution queue.
pub struct StreamScheduler {
    queues: [ExecutionQueue; 2],
}

impl StreamScheduler {
    pub fn new() -> Result<Self, OffloadError> {
        let local = ExecutionQueue::spawn(LocalityClass::Local)?;
        let non_local = ExecutionQueue::spawn(LocalityClass::NonLocal)?;
        Ok(Self {
            queues: [local, non_local],
        })
    }

    pub fn queue(&self, locality: LocalityClass) -> &ExecutionQueue {
        &self.queues[locality.index()]
    }

    pub fn gate(&self, locality: LocalityClass) -> &SyncGate {
        self.queue(locality).gate()
    }

    pub fn submit(&self, locality: LocalityClass, stage: Stage, command: Command) {
        self.queue(locality).submit(stage, command);
    }
}
