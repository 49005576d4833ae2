//! Test query supply

use crate::ground_truth::GroundTruth;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};
use tripwire_config::QueryBankConfig;

const SYNTHETIC_TOPICS: [&str; 10] = [
    "vector index",
    "cache eviction",
    "query planner",
    "consensus protocol",
    "rate limiting",
    "connection pooling",
    "tail latency",
    "load shedding",
    "write-ahead log",
    "service discovery",
];

const SYNTHETIC_TEMPLATES: [&str; 3] = [
    "what is {}",
    "how does {} work",
    "common failure modes of {}",
];

/// Read-only list of queries shared by every phase of a run.
///
/// `next` walks the list round-robin, or picks uniformly at random when the
/// run asks for query diversity. It is safe to call from many workers.
#[derive(Debug)]
pub struct QueryBank {
    queries: Vec<String>,
    cursor: AtomicUsize,
    random: bool,
}

impl QueryBank {
    /// Bank over the given queries; falls back to synthetic queries when empty
    pub fn new(queries: Vec<String>, random: bool) -> Self {
        let queries: Vec<String> = queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if queries.is_empty() {
            return Self::synthetic(random);
        }
        Self {
            queries,
            cursor: AtomicUsize::new(0),
            random,
        }
    }

    pub fn synthetic(random: bool) -> Self {
        let queries = SYNTHETIC_TEMPLATES
            .iter()
            .flat_map(|template| {
                SYNTHETIC_TOPICS
                    .iter()
                    .map(move |topic| template.replace("{}", topic))
            })
            .collect();
        Self {
            queries,
            cursor: AtomicUsize::new(0),
            random,
        }
    }

    /// One query per line. A missing or empty file yields synthetic queries.
    pub fn from_file(path: &Path, random: bool) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let bank = Self::new(content.lines().map(str::to_string).collect(), random);
                debug!("Loaded {} queries from {}", bank.len(), path.display());
                bank
            }
            Err(e) => {
                warn!(
                    "Query bank {} unreadable ({}), using synthetic queries",
                    path.display(),
                    e
                );
                Self::synthetic(random)
            }
        }
    }

    /// Build the bank a run should use.
    ///
    /// Ground-truth query texts win when they are loaded and preferred, so
    /// that every request can contribute to recall.
    pub fn load(config: &QueryBankConfig, ground_truth: Option<&GroundTruth>, random: bool) -> Self {
        if let Some(gt) = ground_truth.filter(|_| config.prefer_ground_truth) {
            let texts = gt.query_texts();
            if !texts.is_empty() {
                info!("Using {} ground-truth queries", texts.len());
                return Self::new(texts, random);
            }
        }
        match &config.path {
            Some(path) => Self::from_file(path, random),
            None => Self::synthetic(random),
        }
    }

    pub fn next(&self) -> &str {
        let idx = if self.random {
            fastrand::usize(..self.queries.len())
        } else {
            self.cursor.fetch_add(1, Ordering::Relaxed) % self.queries.len()
        };
        &self.queries[idx]
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn is_random(&self) -> bool {
        self.random
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_round_robin_wraps() {
        let bank = QueryBank::new(vec!["a".into(), " ".into(), "b".into()], false);
        assert_eq!(bank.len(), 2);
        let seen: Vec<_> = (0..5).map(|_| bank.next().to_string()).collect();
        assert_eq!(seen, vec!["a", "b", "a", "b", "a"]);
    }

    #[test]
    fn test_random_stays_in_bank() {
        let bank = QueryBank::new(vec!["x".into(), "y".into(), "z".into()], true);
        for _ in 0..50 {
            assert!(bank.queries().iter().any(|q| q == bank.next()));
        }
    }

    #[test]
    fn test_missing_or_empty_file_is_synthetic() {
        let bank = QueryBank::from_file(Path::new("/nonexistent/queries.txt"), false);
        assert_eq!(bank.len(), 30);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "\n   \n").unwrap();
        let bank = QueryBank::from_file(file.path(), false);
        assert_eq!(bank.len(), 30);
        assert_eq!(bank.next(), "what is vector index");
    }

    #[test]
    fn test_file_queries_are_used() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "first query\nsecond query").unwrap();
        let config = QueryBankConfig {
            path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let bank = QueryBank::load(&config, None, false);
        assert_eq!(bank.queries(), &["first query", "second query"]);
    }
}
