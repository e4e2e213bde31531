//! Context grounding: top-k passage texts per query
//!
//! Corpus-grounded methods condition their prompts on evidence retrieved
//! for the original query. This module turns the backend's raw hits into
//! per-query passage lists, extracting readable text regardless of how the
//! underlying index stores documents.

use super::{RetrievedDoc, SearchBackend};
use crate::data::Query;
use crate::datasets::DatasetSpec;
use crate::error::Result;
use std::collections::HashMap;

/// Ranked passage texts per qid, most relevant first
pub type ContextMap = HashMap<String, Vec<String>>;

/// Extract readable passage text from a retrieved document.
///
/// Indexes store documents differently: MS MARCO-style indexes keep a
/// `raw` JSON blob with a `contents` key, BEIR-style flat indexes store a
/// `contents` field directly. Tries the structured form first, then named
/// fallback keys, then the raw string itself; unknown layouts yield an
/// empty string rather than an error.
pub fn extract_passage_text(doc: &RetrievedDoc) -> String {
    if let Some(raw) = doc.raw.as_deref() {
        if !raw.is_empty() {
            if let Ok(serde_json::Value::Object(parsed)) = serde_json::from_str(raw) {
                for key in ["contents", "body", "text", "passage"] {
                    if let Some(serde_json::Value::String(text)) = parsed.get(key) {
                        return text.trim().to_string();
                    }
                }
            }
            return raw.trim().to_string();
        }
    }

    doc.contents
        .as_deref()
        .map(|c| c.trim().to_string())
        .unwrap_or_default()
}

/// Fetch the top-`k` passage texts for every query.
///
/// Queries absent from the backend's response map to empty lists, so
/// callers can always index the result by qid.
pub async fn gather_contexts(
    backend: &dyn SearchBackend,
    queries: &[Query],
    dataset: &DatasetSpec,
    retriever: &str,
    k: usize,
    threads: usize,
) -> Result<ContextMap> {
    let hits_by_qid = backend
        .fetch_contexts(queries, dataset, retriever, k, threads)
        .await?;

    let mut ctx_map = ContextMap::with_capacity(queries.len());
    for query in queries {
        let passages = hits_by_qid
            .get(&query.qid)
            .map(|hits| {
                hits.iter()
                    .take(k)
                    .map(extract_passage_text)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        ctx_map.insert(query.qid.clone(), passages);
    }

    tracing::debug!(
        queries = queries.len(),
        dataset = dataset.name,
        k,
        "Contexts gathered"
    );
    Ok(ctx_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::dataset;
    use crate::error::RequeryError;
    use async_trait::async_trait;

    fn doc(raw: Option<&str>, contents: Option<&str>) -> RetrievedDoc {
        RetrievedDoc {
            docid: "d1".to_string(),
            score: 1.0,
            raw: raw.map(String::from),
            contents: contents.map(String::from),
        }
    }

    #[test]
    fn test_extract_from_raw_json_contents() {
        let d = doc(Some(r#"{"id": "d1", "contents": " passage text "}"#), None);
        assert_eq!(extract_passage_text(&d), "passage text");
    }

    #[test]
    fn test_extract_from_raw_json_fallback_keys() {
        let d = doc(Some(r#"{"body": "body text"}"#), None);
        assert_eq!(extract_passage_text(&d), "body text");
        let d = doc(Some(r#"{"text": "text field"}"#), None);
        assert_eq!(extract_passage_text(&d), "text field");
    }

    #[test]
    fn test_extract_raw_non_json_used_verbatim() {
        let d = doc(Some("plain stored text"), None);
        assert_eq!(extract_passage_text(&d), "plain stored text");
        // JSON without any known key falls back to the raw string
        let d = doc(Some(r#"{"title": "only a title"}"#), None);
        assert_eq!(extract_passage_text(&d), r#"{"title": "only a title"}"#);
    }

    #[test]
    fn test_extract_direct_contents_and_empty() {
        let d = doc(None, Some("flat contents"));
        assert_eq!(extract_passage_text(&d), "flat contents");
        let d = doc(None, None);
        assert_eq!(extract_passage_text(&d), "");
    }

    struct FixedBackend {
        hits: HashMap<String, Vec<RetrievedDoc>>,
    }

    #[async_trait]
    impl SearchBackend for FixedBackend {
        async fn retrieve_to_run_file(
            &self,
            _request: &super::super::RetrievalRequest,
        ) -> Result<()> {
            Err(RequeryError::Retrieval {
                status: -1,
                stderr: "not supported".to_string(),
            })
        }

        async fn fetch_contexts(
            &self,
            _queries: &[Query],
            _dataset: &DatasetSpec,
            _retriever: &str,
            _k: usize,
            _threads: usize,
        ) -> Result<HashMap<String, Vec<RetrievedDoc>>> {
            Ok(self.hits.clone())
        }
    }

    #[tokio::test]
    async fn test_gather_truncates_and_fills_missing_qids() {
        let mut hits = HashMap::new();
        hits.insert(
            "q1".to_string(),
            (1..=5)
                .map(|i| doc(None, Some(&format!("passage {i}"))))
                .collect(),
        );
        let backend = FixedBackend { hits };

        let queries = vec![Query::new("q1", "first"), Query::new("q2", "second")];
        let ds = dataset("dl19").unwrap();
        let ctx_map = gather_contexts(&backend, &queries, ds, "bm25", 3, 4)
            .await
            .unwrap();

        assert_eq!(ctx_map["q1"].len(), 3);
        assert_eq!(ctx_map["q1"][0], "passage 1");
        assert!(ctx_map["q2"].is_empty());
    }
}
