//! A fault-tolerant MapReduce.
//!
//! A [`Coordinator`] splits a job into one map task per input file and
//! `n_reduce` reduce tasks, and hands them out to [`Worker`]s that poll it over
//! a unix socket. Workers that go quiet are detected by timeout only: their
//! task is handed to someone else, and since every output file name is derived
//! from the task id, re-running a task simply overwrites the same files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub mod app;
mod coordinator;
pub mod error;
pub mod files;
pub mod partition;
pub mod transport;
mod worker;

pub use coordinator::{Coordinator, CoordinatorConfig};
pub use error::{Error, Result};
pub use worker::{reduce_records, Mapper, Reducer, Worker};

/// RPCs served by the coordinator. Workers are the only callers.
#[tarpc::service]
pub trait Service {
    /// Ask for work. Never fails: when nothing can be handed out the reply is
    /// [`Assignment::Wait`] or [`Assignment::Done`].
    async fn assign_task() -> Assignment;
    /// Report that a task finished. Duplicate and stale reports are ignored.
    async fn finished_task(id: usize, kind: TaskKind);
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Map,
    Reduce,
}

/// Reply to [`Service::assign_task`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Assignment {
    /// Map `file` and split its output into `n_reduce` buckets.
    Map {
        id: usize,
        file: PathBuf,
        n_reduce: usize,
    },
    /// Reduce every shard of bucket `id`.
    Reduce { id: usize },
    /// Nothing to hand out yet, poll again later.
    Wait,
    /// The job is finished, the worker should exit.
    Done,
}

/// A record emitted by a map function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
