use map_reduce::app::{self, App};
use map_reduce::{
    files, partition, transport, Assignment, Coordinator, CoordinatorConfig, TaskKind, Worker,
};
use tarpc::context;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, iter};

const WORDS: [&str; 12] = [
    "the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog", "and", "runs", "away", "again",
];

fn init_logger() {
    let _ = pretty_env_logger::try_init();
}

/// Write `n` deterministic input files of varying length.
fn write_inputs(dir: &Path, n: usize) -> Vec<PathBuf> {
    let input_dir = dir.join("input");
    fs::create_dir(&input_dir).unwrap();
    (0..n)
        .map(|i| {
            let text: Vec<&str> = (0..50 * (i + 1))
                .map(|j| WORDS[(i * 7 + j * 5 + j / 3) % WORDS.len()])
                .collect();
            let p = input_dir.join(format!("pg-{}.txt", i));
            fs::write(&p, text.join(" ")).unwrap();
            p
        })
        .collect()
}

fn config(dir: &Path, timeout: Duration) -> CoordinatorConfig {
    CoordinatorConfig {
        socket: dir.join("mr.sock"),
        timeout,
    }
}

fn spawn_workers(n: usize, dir: &Path, socket: &Path, app: App) -> Vec<JoinHandle<()>> {
    iter::repeat_with(|| {
        let w = Worker {
            dir: dir.to_owned(),
            socket: socket.to_owned(),
            poll_interval: Duration::from_millis(50),
            map: app.map,
            reduce: app.reduce,
        };
        tokio::spawn(async move {
            w.launch().await.unwrap();
        })
    })
    .take(n)
    .collect()
}

/// Result of running the application sequentially.
fn sequential(files: &[PathBuf], app: App) -> HashMap<String, String> {
    let mut cnt = HashMap::<String, Vec<String>>::new();
    for fname in files.iter() {
        let contents = fs::read_to_string(fname).expect("Error on reading file");
        for kv in (app.map)(fname, &contents) {
            cnt.entry(kv.key).or_default().push(kv.value);
        }
    }
    cnt.iter()
        .map(|(k, vs)| (k.clone(), (app.reduce)(k, vs)))
        .collect()
}

/// Collect every `mr-out-*` file, checking that each key appears once, in the
/// file of its bucket, in ascending order.
fn collect_output(dir: &Path, n_reduce: usize) -> HashMap<String, String> {
    let mut result = HashMap::new();
    for r in 0..n_reduce {
        let s = fs::read_to_string(dir.join(files::output_name(r))).unwrap();
        let mut prev: Option<String> = None;
        for l in s.lines() {
            let (k, v) = l.split_once(' ').unwrap();
            assert_eq!(partition::bucket(k, n_reduce), r, "{} in wrong output file", k);
            if let Some(p) = &prev {
                assert!(p.as_str() < k, "{} listed after {}", k, p);
            }
            prev = Some(k.to_owned());
            assert!(result.insert(k.to_owned(), v.to_owned()).is_none());
        }
    }
    result
}

async fn run_job(app_name: &str, n_files: usize, n_reduce: usize, n_workers: usize) {
    init_logger();
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let p = temp_dir.path();
    let files = write_inputs(p, n_files);
    let app = app::named(app_name).unwrap();

    let coordinator = Coordinator::launch(
        files.clone(),
        n_reduce,
        config(p, Duration::from_secs(10)),
    )
    .await
    .unwrap();
    for w in spawn_workers(n_workers, p, coordinator.socket(), app) {
        w.await.unwrap();
    }
    assert!(coordinator.done());
    println!("MapReduce finished.");

    // Check that the result is identical to the result of sequential MapReduce
    assert_eq!(collect_output(p, n_reduce), sequential(&files, app));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_word_count() {
    run_job("wc", 5, 3, 4).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_indexer() {
    run_job("indexer", 4, 2, 3).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_worker_single_reducer() {
    run_job("wc", 3, 1, 1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_more_reducers_than_keys() {
    // Some buckets receive no key; their output file must still exist, empty.
    run_job("wc", 2, 20, 3).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_crashed_worker_task_is_reassigned() {
    init_logger();
    let temp_dir = TempDir::new().unwrap();
    let p = temp_dir.path();
    let files = write_inputs(p, 3);
    let app = app::named("wc").unwrap();
    let coordinator = Coordinator::launch(files.clone(), 2, config(p, Duration::from_millis(300)))
        .await
        .unwrap();

    // A worker that takes the first map task and dies without reporting.
    let crashed = transport::connect(coordinator.socket()).await.unwrap();
    match crashed.assign_task(context::current()).await.unwrap() {
        Assignment::Map { id: 0, .. } => {}
        other => panic!("expected map task 0, got {:?}", other),
    }
    drop(crashed);

    for w in spawn_workers(2, p, coordinator.socket(), app) {
        w.await.unwrap();
    }
    assert!(coordinator.done());
    assert_eq!(collect_output(p, 2), sequential(&files, app));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_straggler_report_is_harmless() {
    init_logger();
    let temp_dir = TempDir::new().unwrap();
    let p = temp_dir.path();
    let files = write_inputs(p, 2);
    let app = app::named("wc").unwrap();
    let coordinator = Coordinator::launch(files.clone(), 2, config(p, Duration::from_millis(200)))
        .await
        .unwrap();

    // A slow worker holds map task 0 past its timeout.
    let slow = transport::connect(coordinator.socket()).await.unwrap();
    let (id, file, n_reduce) = match slow.assign_task(context::current()).await.unwrap() {
        Assignment::Map { id, file, n_reduce } => (id, file, n_reduce),
        other => panic!("expected a map task, got {:?}", other),
    };
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Meanwhile the task is handed out again and the whole job completes.
    for w in spawn_workers(2, p, coordinator.socket(), app) {
        w.await.unwrap();
    }
    assert!(coordinator.done());

    // The slow worker finally finishes: it rewrites the same shards and
    // reports a task that is already completed.
    let straggler = Worker {
        dir: p.to_owned(),
        socket: coordinator.socket().to_owned(),
        poll_interval: Duration::from_millis(50),
        map: app.map,
        reduce: app.reduce,
    };
    straggler.run_map(id, &file, n_reduce).unwrap();
    slow.finished_task(context::current(), id, TaskKind::Map)
        .await
        .unwrap();

    assert!(coordinator.done());
    assert_eq!(
        slow.assign_task(context::current()).await.unwrap(),
        Assignment::Done
    );
    assert_eq!(collect_output(p, 2), sequential(&files, app));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_workers_wait_for_map_phase() {
    init_logger();
    let temp_dir = TempDir::new().unwrap();
    let p = temp_dir.path();
    let files = write_inputs(p, 1);
    let coordinator = Coordinator::launch(files, 1, config(p, Duration::from_secs(10)))
        .await
        .unwrap();

    let first = transport::connect(coordinator.socket()).await.unwrap();
    let second = transport::connect(coordinator.socket()).await.unwrap();
    assert!(matches!(
        first.assign_task(context::current()).await.unwrap(),
        Assignment::Map { id: 0, .. }
    ));
    // The only map task is running: nobody may start reducing yet.
    assert_eq!(
        second.assign_task(context::current()).await.unwrap(),
        Assignment::Wait
    );
    first
        .finished_task(context::current(), 0, TaskKind::Map)
        .await
        .unwrap();
    assert_eq!(
        second.assign_task(context::current()).await.unwrap(),
        Assignment::Reduce { id: 0 }
    );
    assert!(!coordinator.done());
}
