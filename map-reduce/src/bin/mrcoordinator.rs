use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use log::info;
use structopt::StructOpt;
use tokio::time;

use map_reduce::{transport, Coordinator, CoordinatorConfig};

#[derive(StructOpt, Debug)]
#[structopt(name = "mrcoordinator", version = env!("CARGO_PKG_VERSION"), about = env!("CARGO_PKG_DESCRIPTION"), author = env!("CARGO_PKG_AUTHORS"))]
struct Opt {
    /// Unix socket to listen on [default: /var/tmp/5840-mr-<uid>]
    #[structopt(short, long, parse(from_os_str))]
    socket: Option<PathBuf>,

    /// Seconds a task may stay in progress before it is handed to another worker
    #[structopt(short, long, default_value = "10")]
    timeout: u64,

    /// Number of reduce tasks
    #[structopt(long, default_value = "10")]
    nreduce: usize,

    /// Seconds to keep answering workers once the job is done, so that idle
    /// workers learn they can exit
    #[structopt(long, default_value = "1")]
    linger: u64,

    /// Files to process, one map task each
    #[structopt(name = "FILE", parse(from_os_str))]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let opt = Opt::from_args();
    let config = CoordinatorConfig {
        socket: opt.socket.unwrap_or_else(transport::coordinator_sock),
        timeout: Duration::from_secs(opt.timeout),
    };
    let coordinator = Coordinator::launch(opt.files, opt.nreduce, config)
        .await
        .context("failed to start coordinator")?;

    while !coordinator.done() {
        time::sleep(Duration::from_secs(1)).await;
    }
    info!("all tasks completed");
    time::sleep(Duration::from_secs(opt.linger)).await;
    Ok(())
}
