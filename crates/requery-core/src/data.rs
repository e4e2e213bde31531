//! Query records and TSV input/output
//!
//! Benchmark queries arrive as two-column TSV (`qid \t text`) and
//! reformulated queries leave in the same shape, so run files can be
//! produced by retrieval tooling that expects raw TSV topics.

use crate::error::Result;
use crate::methods::ReformulatedQuery;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A benchmark query: stable identifier plus text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub qid: String,
    pub text: String,
}

impl Query {
    pub fn new(qid: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            qid: qid.into(),
            text: text.into(),
        }
    }
}

/// Load queries from a `qid \t text` TSV file.
///
/// Blank lines and rows with an empty text column are skipped; order is
/// preserved.
pub fn load_queries_tsv(path: impl AsRef<Path>) -> Result<Vec<Query>> {
    let content = fs::read_to_string(path.as_ref())?;
    let mut queries = Vec::new();
    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if let Some((qid, text)) = line.split_once('\t') {
            let text = text.trim();
            if !text.is_empty() {
                queries.push(Query::new(qid.trim(), text));
            }
        }
    }
    Ok(queries)
}

/// Save reformulated queries as `qid \t reformulated` rows.
///
/// Rows are written verbatim without quoting: the composition primitives
/// guarantee single-line, tab-free query strings, and Pyserini reads the
/// file as a raw topics TSV.
pub fn save_reformulated_tsv(
    results: &[ReformulatedQuery],
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = String::new();
    for result in results {
        out.push_str(&result.qid);
        out.push('\t');
        out.push_str(&result.reformulated);
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_queries_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queries.tsv");
        fs::write(&path, "q1\twhat is rust\nq2\tborrow checker\n").unwrap();

        let queries = load_queries_tsv(&path).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0], Query::new("q1", "what is rust"));
        assert_eq!(queries[1].text, "borrow checker");
    }

    #[test]
    fn test_load_skips_blank_and_empty_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queries.tsv");
        fs::write(&path, "q1\tfirst\n\nq2\t   \nq3\tthird\n").unwrap();

        let queries = load_queries_tsv(&path).unwrap();
        let qids: Vec<&str> = queries.iter().map(|q| q.qid.as_str()).collect();
        assert_eq!(qids, vec!["q1", "q3"]);
    }

    #[test]
    fn test_load_handles_crlf() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queries.tsv");
        fs::write(&path, "q1\tline one\r\nq2\tline two\r\n").unwrap();

        let queries = load_queries_tsv(&path).unwrap();
        assert_eq!(queries[0].text, "line one");
        assert_eq!(queries[1].text, "line two");
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/gpt-4.1/q2k/dl19.tsv");
        let results = vec![ReformulatedQuery {
            qid: "q1".to_string(),
            original: "solar panels".to_string(),
            reformulated: "solar panels photovoltaic".to_string(),
            metadata: serde_json::Map::new(),
        }];

        save_reformulated_tsv(&results, &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "q1\tsolar panels photovoltaic\n");
    }
}
