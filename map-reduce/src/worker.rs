use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, trace};
use tarpc::context;
use tokio::time;

use crate::{files, partition, transport, Assignment, Error, KeyValue, Result, TaskKind};

/// User map function: turns one input file into intermediate records.
pub trait Mapper {
    fn map(&self, filename: &Path, contents: &str) -> Vec<KeyValue>;
}

/// User reduce function: folds every value emitted for `key` into one.
pub trait Reducer {
    fn reduce(&self, key: &str, values: &[String]) -> String;
}

impl<F> Mapper for F
where
    F: Fn(&Path, &str) -> Vec<KeyValue>,
{
    fn map(&self, filename: &Path, contents: &str) -> Vec<KeyValue> {
        self(filename, contents)
    }
}

impl<F> Reducer for F
where
    F: Fn(&str, &[String]) -> String,
{
    fn reduce(&self, key: &str, values: &[String]) -> String {
        self(key, values)
    }
}

/// A worker process. It keeps nothing between tasks: everything it needs
/// comes with the assignment or is derived from the task id.
pub struct Worker<M, R> {
    /// Where shards and outputs are written and read. Must be shared by all
    /// workers of a job.
    pub dir: PathBuf,
    /// Coordinator address.
    pub socket: PathBuf,
    /// Back-off after a [`Assignment::Wait`] reply.
    pub poll_interval: Duration,
    pub map: M,
    pub reduce: R,
}

impl<M: Mapper, R: Reducer> Worker<M, R> {
    /// Ask for tasks and run them until the coordinator says the job is done.
    ///
    /// Any failure ends the loop. The coordinator will hand the task this
    /// worker was running to another worker once it times out.
    pub async fn launch(&self) -> Result<()> {
        let client = transport::connect(&self.socket).await?;
        loop {
            match client.assign_task(context::current()).await? {
                Assignment::Map { id, file, n_reduce } => {
                    self.run_map(id, &file, n_reduce)?;
                    client
                        .finished_task(context::current(), id, TaskKind::Map)
                        .await?;
                }
                Assignment::Reduce { id } => {
                    self.run_reduce(id)?;
                    client
                        .finished_task(context::current(), id, TaskKind::Reduce)
                        .await?;
                }
                Assignment::Wait => {
                    trace!("nothing to do, sleeping {:?}", self.poll_interval);
                    time::sleep(self.poll_interval).await;
                }
                Assignment::Done => {
                    info!("job done, exiting");
                    return Ok(());
                }
            }
        }
    }

    /// Map `file` and write one shard per non-empty bucket. Returns the shards
    /// written.
    pub fn run_map(&self, id: usize, file: &Path, n_reduce: usize) -> Result<Vec<PathBuf>> {
        if n_reduce == 0 {
            return Err(Error::Config(format!("map task {} has no reduce buckets", id)));
        }
        info!("map task {}: {:?}", id, file);
        let contents = fs::read_to_string(file)?;

        let mut buckets = vec![Vec::new(); n_reduce];
        for kv in self.map.map(file, &contents) {
            buckets[partition::bucket(&kv.key, n_reduce)].push(kv);
        }

        let mut written = Vec::new();
        for (bucket, records) in buckets.iter().enumerate() {
            if records.is_empty() {
                continue;
            }
            let path = self.dir.join(files::intermediate_name(id, bucket));
            files::write_records(&path, records)?;
            written.push(path);
        }
        debug!("map task {} wrote {} shards", id, written.len());
        Ok(written)
    }

    /// Reduce every shard of bucket `id` into `mr-out-{id}`. Returns the output
    /// path.
    pub fn run_reduce(&self, id: usize) -> Result<PathBuf> {
        info!("reduce task {}", id);
        let mut records = Vec::new();
        for shard in files::shards(&self.dir, id)? {
            records.extend(files::read_records(&shard)?);
        }
        let lines = reduce_records(records, &self.reduce);

        let path = self.dir.join(files::output_name(id));
        files::write_output(&path, &lines)?;
        debug!("reduce task {} wrote {} keys", id, lines.len());
        Ok(path)
    }
}

/// Sort `records` by key and call `reducer` once per distinct key, in
/// ascending key order. Values reach the reducer in the order they were emitted.
pub fn reduce_records(mut records: Vec<KeyValue>, reducer: &impl Reducer) -> Vec<(String, String)> {
    records.sort_by(|a, b| a.key.cmp(&b.key));
    records
        .chunk_by(|a, b| a.key == b.key)
        .map(|group| {
            let key = &group[0].key;
            let values: Vec<String> = group.iter().map(|kv| kv.value.clone()).collect();
            (key.clone(), reducer.reduce(key, &values))
        })
        .collect()
}
