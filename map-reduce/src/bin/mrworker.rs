use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use structopt::StructOpt;

use map_reduce::{app, transport, Worker};

#[derive(StructOpt, Debug)]
#[structopt(name = "mrworker", version = env!("CARGO_PKG_VERSION"), about = env!("CARGO_PKG_DESCRIPTION"), author = env!("CARGO_PKG_AUTHORS"))]
struct Opt {
    /// Coordinator socket [default: /var/tmp/5840-mr-<uid>]
    #[structopt(short, long, parse(from_os_str))]
    socket: Option<PathBuf>,

    /// Application to run (wc, indexer)
    #[structopt(short, long, default_value = "wc")]
    app: String,

    /// Directory for intermediate and output files
    #[structopt(short, long, default_value = ".", parse(from_os_str))]
    dir: PathBuf,

    /// Seconds to wait before asking again when no task is available
    #[structopt(short, long, default_value = "10")]
    poll: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let opt = Opt::from_args();
    let app = app::named(&opt.app)?;
    let socket = opt.socket.unwrap_or_else(transport::coordinator_sock);
    let w = Worker {
        dir: opt.dir,
        socket: socket.clone(),
        poll_interval: Duration::from_secs(opt.poll),
        map: app.map,
        reduce: app.reduce,
    };
    w.launch()
        .await
        .with_context(|| format!("worker failed (coordinator at {:?})", socket))
}
