//! RPC plumbing between workers and the coordinator: JSON frames over a
//! unix domain socket.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use futures::{future, prelude::*};
use log::{info, warn};
use nix::unistd::getuid;
use tarpc::{
    client,
    serde_transport::unix,
    server::{self, Channel},
    tokio_serde::formats::Json,
};
use tokio::task::JoinHandle;

use crate::coordinator::CoordinatorServer;
use crate::{Service, ServiceClient};

/// Default coordinator address, unique per OS user so that several users can
/// run jobs on one machine.
///
/// Lives in `/var/tmp` rather than the working directory, which may be on a
/// filesystem without unix socket support.
pub fn coordinator_sock() -> PathBuf {
    PathBuf::from(format!("/var/tmp/5840-mr-{}", getuid()))
}

async fn spawn(fut: impl Future<Output = ()> + Send + 'static) {
    tokio::spawn(fut);
}

/// Bind `path` and serve `server` to every worker that connects, until the
/// returned task is aborted.
pub(crate) async fn listen(path: &Path, server: CoordinatorServer) -> io::Result<JoinHandle<()>> {
    // A coordinator that exited without cleaning up leaves its socket behind.
    match tokio::fs::remove_file(path).await {
        Ok(()) => warn!("removed stale socket {:?}", path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    let mut listener = unix::listen(path, Json::default).await?;
    listener.config_mut().max_frame_length(usize::MAX);
    info!("coordinator listening on {:?}", path);

    Ok(tokio::spawn(
        listener
            // Ignore accept errors.
            .filter_map(|r| future::ready(r.ok()))
            .map(server::BaseChannel::with_defaults)
            // One channel per worker connection, each request on its own task.
            .for_each(move |channel| {
                let server = server.clone();
                async move {
                    tokio::spawn(channel.execute(server.serve()).for_each(spawn));
                }
            }),
    ))
}

/// Dial the coordinator at `path`.
pub async fn connect(path: &Path) -> io::Result<ServiceClient> {
    let transport = unix::connect(path, Json::default).await?;
    Ok(ServiceClient::new(client::Config::default(), transport).spawn())
}
