//! Relevance judgments for Recall@10

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use tracing::{info, warn};
use tripwire_config::QueryBankConfig;

/// Number of top results considered by recall
pub const RECALL_DEPTH: usize = 10;

/// Queries keyed by id, plus the set of relevant document ids per query.
///
/// Lookups go by query text, since that is what a worker has in hand.
#[derive(Debug, Clone, Default)]
pub struct GroundTruth {
    queries: Vec<(String, String)>,
    qid_by_text: HashMap<String, String>,
    relevant: HashMap<String, HashSet<String>>,
}

impl GroundTruth {
    /// Parse the two files; see [`GroundTruth::parse`] for the formats
    pub fn load(queries_path: &Path, qrels_path: &Path) -> io::Result<Self> {
        let queries = std::fs::read_to_string(queries_path)?;
        let qrels = std::fs::read_to_string(qrels_path)?;
        Ok(Self::parse(&queries, &qrels))
    }

    /// Load ground truth named by the query bank config, if any.
    ///
    /// Unreadable files are logged and treated as absent; recall is optional.
    pub fn from_config(config: &QueryBankConfig) -> Option<Self> {
        let (queries, qrels) = match (&config.ground_truth_queries, &config.ground_truth_qrels) {
            (Some(queries), Some(qrels)) => (queries, qrels),
            _ => return None,
        };
        match Self::load(queries, qrels) {
            Ok(gt) if !gt.is_empty() => {
                info!(
                    "Loaded ground truth: {} queries, {} with judgments",
                    gt.queries.len(),
                    gt.relevant.len()
                );
                Some(gt)
            }
            Ok(_) => {
                warn!("Ground truth files contain no usable judgments, recall disabled");
                None
            }
            Err(e) => {
                warn!("Failed to load ground truth, recall disabled: {}", e);
                None
            }
        }
    }

    /// Queries are `qid<TAB>text`. Judgments are either `qid<TAB>doc_id` or
    /// TREC style `qid iter doc_id relevance`, where rows with relevance
    /// of zero or less are skipped.
    pub fn parse(queries: &str, qrels: &str) -> Self {
        let mut gt = Self::default();

        for line in queries.lines() {
            let Some((qid, text)) = line.split_once('\t') else {
                continue;
            };
            let (qid, text) = (qid.trim(), text.trim());
            if qid.is_empty() || text.is_empty() {
                continue;
            }
            gt.qid_by_text.insert(text.to_string(), qid.to_string());
            gt.queries.push((qid.to_string(), text.to_string()));
        }

        for line in qrels.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let (qid, doc_id) = match fields.as_slice() {
                [qid, doc_id] => (*qid, *doc_id),
                [qid, _iter, doc_id, relevance] => match relevance.parse::<i64>() {
                    Ok(rel) if rel > 0 => (*qid, *doc_id),
                    _ => continue,
                },
                _ => continue,
            };
            gt.relevant
                .entry(qid.to_string())
                .or_default()
                .insert(doc_id.to_string());
        }

        gt
    }

    pub fn is_empty(&self) -> bool {
        self.relevant.is_empty()
    }

    /// Texts of queries that have at least one relevant document
    pub fn query_texts(&self) -> Vec<String> {
        self.queries
            .iter()
            .filter(|(qid, _)| self.relevant.contains_key(qid))
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn relevant_for(&self, query: &str) -> Option<&HashSet<String>> {
        let qid = self.qid_by_text.get(query)?;
        self.relevant.get(qid).filter(|docs| !docs.is_empty())
    }

    /// Recall@10 of a response, or `None` when the query has no judgments
    pub fn recall_for(&self, query: &str, doc_ids: &[String]) -> Option<f64> {
        self.relevant_for(query)
            .map(|relevant| recall_at_k(doc_ids, relevant, RECALL_DEPTH))
    }
}

/// `|top_k ∩ relevant| / min(k, |relevant|)`
pub fn recall_at_k(doc_ids: &[String], relevant: &HashSet<String>, k: usize) -> f64 {
    let denominator = k.min(relevant.len());
    if denominator == 0 {
        return 0.0;
    }
    let mut seen = HashSet::new();
    let hits = doc_ids
        .iter()
        .take(k)
        .filter(|doc| relevant.contains(*doc) && seen.insert(doc.as_str()))
        .count();
    hits as f64 / denominator as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_both_qrel_formats() {
        let gt = GroundTruth::parse(
            "q1\twhat is raft\nq2\thow do b-trees split\nbad line\n",
            "q1\td1\nq1\td2\nq2 0 d7 1\nq2 0 d8 0\n",
        );
        assert_eq!(gt.query_texts(), ids(&["what is raft", "how do b-trees split"]));
        assert_eq!(gt.relevant_for("what is raft").unwrap().len(), 2);
        let q2 = gt.relevant_for("how do b-trees split").unwrap();
        assert!(q2.contains("d7"));
        assert!(!q2.contains("d8"));
        assert!(gt.relevant_for("unknown").is_none());
    }

    #[test]
    fn test_recall_uses_min_of_k_and_relevant() {
        let relevant: HashSet<String> = ids(&["a", "b"]).into_iter().collect();
        assert_eq!(recall_at_k(&ids(&["a", "x", "b"]), &relevant, 10), 1.0);
        assert_eq!(recall_at_k(&ids(&["x", "a"]), &relevant, 10), 0.5);
        assert_eq!(recall_at_k(&ids(&["a", "a"]), &relevant, 10), 0.5);

        let many: HashSet<String> = (0..20).map(|n| format!("d{}", n)).collect();
        let returned: Vec<String> = (0..12).map(|n| format!("d{}", n)).collect();
        assert_eq!(recall_at_k(&returned, &many, 10), 1.0);
    }

    #[test]
    fn test_recall_for_unjudged_query_is_none() {
        let gt = GroundTruth::parse("q1\ttext\n", "");
        assert!(gt.is_empty());
        assert_eq!(gt.recall_for("text", &ids(&["a"])), None);
    }
}
