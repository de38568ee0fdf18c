use thiserror::Error;

/// Failures surfaced by the coordinator and the workers.
///
/// Every variant is fatal to the worker that hits it. Recovery happens on the
/// coordinator side: the task times out and is handed to another worker.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading an input file or writing a shard/output file failed, or the
    /// coordinator socket could not be bound or dialed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An RPC to the coordinator failed after the connection was established.
    #[error("rpc error: {0}")]
    Rpc(#[from] tarpc::client::RpcError),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid shard pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Inconsistent job or worker parameters, e.g. zero reducers.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no application named `{0}`")]
    UnknownApp(String),
}

pub type Result<T> = std::result::Result<T, Error>;
