//! Sample applications, looked up by name by the worker and sequential
//! binaries.

use std::path::Path;

use crate::{Error, KeyValue, Result};

pub mod indexer;
pub mod wc;

pub type MapFn = fn(&Path, &str) -> Vec<KeyValue>;
pub type ReduceFn = fn(&str, &[String]) -> String;

/// A map function and the reduce function that consumes its output.
#[derive(Clone, Copy)]
pub struct App {
    pub map: MapFn,
    pub reduce: ReduceFn,
}

/// Gets the [`App`] named `name`.
pub fn named(name: &str) -> Result<App> {
    match name {
        "wc" => Ok(App {
            map: wc::map,
            reduce: wc::reduce,
        }),
        "indexer" => Ok(App {
            map: indexer::map,
            reduce: indexer::reduce,
        }),
        _ => Err(Error::UnknownApp(name.to_owned())),
    }
}
