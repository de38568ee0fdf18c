//! Inverted index: for every word, the documents it appears in.

use std::collections::BTreeSet;
use std::path::Path;

use crate::KeyValue;

/// Emits `(word, filename)` once per distinct word of the document.
pub fn map(filename: &Path, contents: &str) -> Vec<KeyValue> {
    let document = filename.to_string_lossy().into_owned();
    contents
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|w| KeyValue::new(w, document.as_str()))
        .collect()
}

/// `"{n} {doc1},{doc2},..."` with the documents sorted.
pub fn reduce(_key: &str, values: &[String]) -> String {
    let docs: BTreeSet<&str> = values.iter().map(String::as_str).collect();
    format!(
        "{} {}",
        docs.len(),
        docs.into_iter().collect::<Vec<_>>().join(",")
    )
}
