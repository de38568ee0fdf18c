use std::fs;
use std::path::PathBuf;

use anyhow::{ensure, Context};
use log::trace;
use structopt::StructOpt;

use map_reduce::{app, files, partition, reduce_records};

/// Runs a job in a single process, without coordinator or workers. The output
/// has the same layout as a distributed run with the same `--nreduce`.
#[derive(StructOpt, Debug)]
#[structopt(name = "mrsequential", version = env!("CARGO_PKG_VERSION"), author = env!("CARGO_PKG_AUTHORS"))]
struct Opt {
    /// Application to run (wc, indexer)
    #[structopt(short, long, default_value = "wc")]
    app: String,

    /// Directory for the output files
    #[structopt(short, long, default_value = ".", parse(from_os_str))]
    dir: PathBuf,

    #[structopt(long, default_value = "1")]
    nreduce: usize,

    /// Files to process
    #[structopt(name = "FILE", parse(from_os_str))]
    files: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let opt = Opt::from_args();
    ensure!(opt.nreduce > 0, "--nreduce must be at least 1");
    let app = app::named(&opt.app)?;

    let mut buckets = vec![Vec::new(); opt.nreduce];
    for fname in opt.files.iter() {
        let contents =
            fs::read_to_string(fname).with_context(|| format!("error reading {:?}", fname))?;
        for kv in (app.map)(fname, &contents) {
            buckets[partition::bucket(&kv.key, opt.nreduce)].push(kv);
        }
    }
    for (r, kvs) in buckets.into_iter().enumerate() {
        let path = opt.dir.join(files::output_name(r));
        files::write_output(&path, &reduce_records(kvs, &app.reduce))?;
        trace!("output {:?}", path);
    }
    Ok(())
}
