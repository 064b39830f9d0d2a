//! Worker pool: concurrent dispatch of independent instances.
//!
//! Each worker processes at most one instance's dispatch loop at a time;
//! handler invocation is synchronous and may block, so the loop occupies its
//! worker for the operation's full duration. Distinct instances execute
//! independently with no ordering guarantee between them.

use crate::engine::WorkflowEngine;
use alder_workflow_types::WorkflowInstanceId;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// A fixed pool of dispatch workers fed from a shared queue.
pub struct WorkerPool {
    sender: Sender<WorkflowInstanceId>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(engine: Arc<WorkflowEngine>, workers: usize) -> Self {
        let (sender, receiver) = channel::<WorkflowInstanceId>();
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = (0..workers.max(1))
            .map(|_| {
                let engine = engine.clone();
                let receiver = receiver.clone();
                std::thread::spawn(move || Self::worker_loop(engine, receiver))
            })
            .collect();
        Self { sender, workers }
    }

    /// Queue an instance for dispatch on the next free worker.
    pub fn submit(&self, id: WorkflowInstanceId) {
        if let Err(error) = self.sender.send(id) {
            tracing::warn!(%error, "worker pool rejected instance; all workers exited");
        }
    }

    /// Stop accepting work, drain the queue, and join the workers.
    pub fn shutdown(self) {
        drop(self.sender);
        for worker in self.workers {
            let _ = worker.join();
        }
    }

    fn worker_loop(engine: Arc<WorkflowEngine>, receiver: Arc<Mutex<Receiver<WorkflowInstanceId>>>) {
        loop {
            let next = {
                let receiver = receiver.lock().unwrap_or_else(|e| e.into_inner());
                receiver.recv()
            };
            let Ok(id) = next else { break };
            match engine.dispatch(&id) {
                Ok(state) => {
                    tracing::debug!(instance_id = %id, state = %state, "dispatch finished")
                }
                Err(error) => {
                    tracing::warn!(instance_id = %id, %error, "dispatch rejected")
                }
            }
        }
    }
}
