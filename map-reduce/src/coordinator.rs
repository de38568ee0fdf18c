use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use tarpc::context;
use tokio::task::JoinHandle;

use crate::{transport, Assignment, Error, Result, Service, TaskKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    Idle,
    InProgress { assigned_at: Instant },
    Completed,
}

#[derive(Debug, Clone)]
struct Task {
    id: usize,
    kind: TaskKind,
    state: TaskState,
    // Only map tasks read an input file; a reduce task is its bucket index.
    input: Option<PathBuf>,
}

impl Task {
    fn new(id: usize, kind: TaskKind, input: Option<PathBuf>) -> Self {
        Self {
            id,
            kind,
            state: TaskState::Idle,
            input,
        }
    }

    fn is_completed(&self) -> bool {
        self.state == TaskState::Completed
    }

    fn start(&mut self, now: Instant) {
        self.state = TaskState::InProgress { assigned_at: now };
    }
}

/// Scheduling state of one MapReduce job.
///
/// Task ids are positions in `map_tasks`/`reduce_tasks` and never change.
#[derive(Debug)]
struct Job {
    map_tasks: Vec<Task>,
    reduce_tasks: Vec<Task>,
    timeout: Duration,
}

impl Job {
    fn new(files: Vec<PathBuf>, n_reduce: usize, timeout: Duration) -> Self {
        Self {
            map_tasks: files
                .into_iter()
                .enumerate()
                .map(|(id, file)| Task::new(id, TaskKind::Map, Some(file)))
                .collect(),
            reduce_tasks: (0..n_reduce)
                .map(|id| Task::new(id, TaskKind::Reduce, None))
                .collect(),
            timeout,
        }
    }

    fn n_reduce(&self) -> usize {
        self.reduce_tasks.len()
    }

    fn all_maps_done(&self) -> bool {
        self.map_tasks.iter().all(Task::is_completed)
    }

    fn all_reduces_done(&self) -> bool {
        self.reduce_tasks.iter().all(Task::is_completed)
    }

    fn done(&self) -> bool {
        // Reduce tasks are only handed out once every map task completed.
        self.all_reduces_done()
    }

    /// Put tasks whose worker has been silent for longer than the timeout
    /// back to idle. Completed tasks are never reset.
    fn expire(&mut self, now: Instant) {
        let timeout = self.timeout;
        for task in self.map_tasks.iter_mut().chain(self.reduce_tasks.iter_mut()) {
            if let TaskState::InProgress { assigned_at } = task.state {
                if now.saturating_duration_since(assigned_at) > timeout {
                    warn!(
                        "{:?} task {} timed out after {:?}, reassigning",
                        task.kind, task.id, timeout
                    );
                    task.state = TaskState::Idle;
                }
            }
        }
    }

    fn assign(&mut self, now: Instant) -> Assignment {
        self.expire(now);

        let n_reduce = self.n_reduce();
        if let Some(task) = self
            .map_tasks
            .iter_mut()
            .find(|t| t.state == TaskState::Idle)
        {
            task.start(now);
            debug!("assigning map task {} ({:?})", task.id, task.input);
            return Assignment::Map {
                id: task.id,
                file: task.input.clone().unwrap_or_default(),
                n_reduce,
            };
        }

        if !self.all_maps_done() {
            return Assignment::Wait;
        }

        if let Some(task) = self
            .reduce_tasks
            .iter_mut()
            .find(|t| t.state == TaskState::Idle)
        {
            task.start(now);
            debug!("assigning reduce task {}", task.id);
            return Assignment::Reduce { id: task.id };
        }

        if self.all_reduces_done() {
            Assignment::Done
        } else {
            Assignment::Wait
        }
    }

    fn finish(&mut self, id: usize, kind: TaskKind) {
        let tasks = match kind {
            TaskKind::Map => &mut self.map_tasks,
            TaskKind::Reduce => &mut self.reduce_tasks,
        };
        match tasks.get_mut(id) {
            Some(task) if !task.is_completed() => {
                task.state = TaskState::Completed;
                info!("{:?} task {} completed", kind, id);
            }
            Some(_) => debug!("{:?} task {} already completed, ignoring report", kind, id),
            None => debug!("no {:?} task {}, ignoring report", kind, id),
        }
    }
}

/// Handler for worker RPCs. Every clone shares the same job.
#[derive(Debug, Clone)]
pub(crate) struct CoordinatorServer {
    job: Arc<Mutex<Job>>,
}

impl CoordinatorServer {
    fn job(&self) -> MutexGuard<'_, Job> {
        // Job methods leave the state consistent at every step, so a handler
        // that panicked mid-way cannot have corrupted it.
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Service for CoordinatorServer {
    async fn assign_task(self, _: context::Context) -> Assignment {
        let reply = self.job().assign(Instant::now());
        trace!("assign_task -> {:?}", reply);
        reply
    }

    async fn finished_task(self, _: context::Context, id: usize, kind: TaskKind) {
        self.job().finish(id, kind);
    }
}

pub struct CoordinatorConfig {
    /// Unix socket the coordinator listens on.
    pub socket: PathBuf,
    /// How long a task may stay in progress before it is handed out again.
    pub timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            socket: transport::coordinator_sock(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// A running coordinator.
///
/// Dropping it stops the RPC server and removes the socket.
pub struct Coordinator {
    server: CoordinatorServer,
    socket: PathBuf,
    listener: JoinHandle<()>,
}

impl Coordinator {
    /// Create one map task per file and `n_reduce` reduce tasks, then start
    /// serving workers on `config.socket`.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn launch(
        files: Vec<PathBuf>,
        n_reduce: usize,
        config: CoordinatorConfig,
    ) -> Result<Self> {
        if n_reduce == 0 {
            return Err(Error::Config("n_reduce must be at least 1".into()));
        }
        info!(
            "starting job with {} map tasks and {} reduce tasks",
            files.len(),
            n_reduce
        );
        let server = CoordinatorServer {
            job: Arc::new(Mutex::new(Job::new(files, n_reduce, config.timeout))),
        };
        let listener = transport::listen(&config.socket, server.clone()).await?;
        Ok(Self {
            server,
            socket: config.socket,
            listener,
        })
    }

    /// Same as a worker's `assign_task` RPC.
    pub fn assign_task(&self) -> Assignment {
        self.server.job().assign(Instant::now())
    }

    /// Same as a worker's `finished_task` RPC.
    pub fn finished_task(&self, id: usize, kind: TaskKind) {
        self.server.job().finish(id, kind)
    }

    /// Whether every reduce task has completed. Once true, stays true.
    pub fn done(&self) -> bool {
        self.server.job().done()
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.listener.abort();
        if let Err(e) = std::fs::remove_file(&self.socket) {
            debug!("could not remove {:?}: {}", self.socket, e);
        }
    }
}
