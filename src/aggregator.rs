//! Result aggregation and ranking.
//!
//! Records from all engines are merged and ranked by embedding similarity to
//! the query. Near-duplicates (the same page or fact reported by several
//! engines) are grouped by greedy clustering so that only one representative
//! per group competes for the top slots.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::embed::dot;
use crate::Record;

/// Similarity above which two records are considered the same result.
pub const DEFAULT_CLUSTER_THRESHOLD: f32 = 0.9;

/// Field-name fragments that carry relevance-bearing text.
const RANKING_FIELDS: &[&str] = &[
    "title",
    "description",
    "abstract",
    "summary",
    "content",
    "snippet",
];

/// Builds the text a record is ranked by.
///
/// Joins the values of every field whose lower-cased name contains one of
/// the ranking fragments, so custom engine field names like `tweet_content`
/// still take part. Records without such fields fall back to their `url`,
/// then to all of their values, since embedding endpoints reject empty input.
pub fn ranking_text(record: &Record) -> String {
    let text = record
        .fields()
        .filter(|(name, _)| {
            let name = name.to_lowercase();
            RANKING_FIELDS.iter().any(|f| name.contains(f))
        })
        .map(|(_, value)| value)
        .collect::<Vec<_>>()
        .join("\n");
    if !text.is_empty() {
        return text;
    }
    match record.url() {
        Some(url) => url.to_string(),
        None => record
            .fields()
            .map(|(_, value)| value)
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn descending(indices: &mut [usize], similarity: &[f32]) {
    indices.sort_by(|&a, &b| {
        similarity[b]
            .partial_cmp(&similarity[a])
            .unwrap_or(Ordering::Equal)
    });
}

/// Clusters and selects the top records.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    threshold: f32,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CLUSTER_THRESHOLD,
        }
    }
}

impl Aggregator {
    /// Creates an aggregator with the default clustering threshold.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the clustering threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Returns the clustering threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Ranks `records` against the query vector and keeps at most `num`.
    ///
    /// `embeddings[i]` belongs to `records[i]`. All vectors must be unit length.
    pub fn rank(
        &self,
        records: Vec<Record>,
        embeddings: &[Vec<f32>],
        query: &[f32],
        num: usize,
    ) -> Vec<Record> {
        let similarity: Vec<f32> = embeddings.iter().map(|e| dot(e, query)).collect();
        let selected = self.select(&similarity, embeddings, num);

        let mut slots: Vec<Option<Record>> = records.into_iter().map(Some).collect();
        selected
            .into_iter()
            .filter_map(|i| slots.get_mut(i).and_then(Option::take))
            .collect()
    }

    /// Groups record indices, visiting them in `order`.
    ///
    /// A record joins the cluster holding its most similar member when that
    /// similarity exceeds the threshold, and opens a new cluster otherwise.
    /// The first member of each cluster is its representative.
    pub fn cluster(&self, order: &[usize], embeddings: &[Vec<f32>]) -> Vec<Vec<usize>> {
        let mut clusters: Vec<Vec<usize>> = Vec::new();

        for &i in order {
            let best = clusters
                .iter()
                .enumerate()
                .map(|(c, members)| {
                    let closest = members
                        .iter()
                        .map(|&m| dot(&embeddings[i], &embeddings[m]))
                        .fold(f32::NEG_INFINITY, f32::max);
                    (c, closest)
                })
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

            match best {
                Some((c, closest)) if closest > self.threshold => clusters[c].push(i),
                _ => clusters.push(vec![i]),
            }
        }

        clusters
    }

    /// Picks at most `num` record indices, most query-similar first.
    ///
    /// Cluster representatives come first. When they fall short, the other
    /// cluster members are added by `(1 - min similarity to a representative)
    /// * query similarity`, then anything left by query similarity.
    pub fn select(&self, similarity: &[f32], embeddings: &[Vec<f32>], num: usize) -> Vec<usize> {
        if num == 0 || similarity.is_empty() {
            return Vec::new();
        }

        let mut order: Vec<usize> = (0..similarity.len()).collect();
        descending(&mut order, similarity);
        let clusters = self.cluster(&order, embeddings);

        let mut keep: Vec<usize> = clusters.iter().map(|members| members[0]).collect();
        descending(&mut keep, similarity);
        let mut chosen: HashSet<usize> = keep.iter().copied().collect();

        if keep.len() < num {
            let representatives = keep.clone();
            let mut candidates: Vec<(usize, f32)> = clusters
                .iter()
                .filter(|members| members.len() > 1)
                .flat_map(|members| members[1..].iter().copied())
                .map(|i| {
                    let farthest = representatives
                        .iter()
                        .map(|&k| dot(&embeddings[i], &embeddings[k]))
                        .fold(f32::INFINITY, f32::min);
                    (i, (1.0 - farthest) * similarity[i])
                })
                .collect();
            candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

            for (i, _) in candidates {
                if keep.len() >= num {
                    break;
                }
                if chosen.insert(i) {
                    keep.push(i);
                }
            }
        }

        if keep.len() < num {
            for &i in &order {
                if keep.len() >= num {
                    break;
                }
                if chosen.insert(i) {
                    keep.push(i);
                }
            }
        }

        descending(&mut keep, similarity);
        keep.truncate(num);
        keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(x: f32, y: f32, z: f32) -> Vec<f32> {
        crate::embed::normalize(&[x, y, z])
    }

    #[test]
    fn test_aggregator_new() {
        let aggregator = Aggregator::new();
        assert_eq!(aggregator.threshold(), DEFAULT_CLUSTER_THRESHOLD);
        assert_eq!(aggregator.with_threshold(0.5).threshold(), 0.5);
    }

    #[test]
    fn test_ranking_text_uses_relevant_fields() {
        let record = Record::new()
            .with("url", "https://example.com")
            .with("title", "Example")
            .with("Abstract", "An example page")
            .with("tweet_content", "hello")
            .with("source", "example.com");
        assert_eq!(ranking_text(&record), "An example page\nExample\nhello");
    }

    #[test]
    fn test_ranking_text_falls_back_to_url() {
        let record = Record::new()
            .with("url", "https://example.com")
            .with("source", "example.com");
        assert_eq!(ranking_text(&record), "https://example.com");
    }

    #[test]
    fn test_ranking_text_falls_back_to_any_value() {
        let record = Record::new().with("source", "example.com").with("rank", "3");
        assert_eq!(ranking_text(&record), "3\nexample.com");
        assert_eq!(ranking_text(&Record::new()), "");
    }

    #[test]
    fn test_cluster_groups_near_duplicates() {
        let embeddings = vec![unit(1.0, 0.0, 0.0), unit(0.0, 1.0, 0.0), unit(1.0, 0.05, 0.0)];
        let clusters = Aggregator::new().cluster(&[0, 1, 2], &embeddings);
        assert_eq!(clusters, vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn test_cluster_threshold_is_exclusive() {
        let embeddings = vec![unit(1.0, 0.0, 0.0), unit(1.0, 1.0, 0.0)];
        // cos 45deg is about 0.707
        let strict = Aggregator::new().with_threshold(0.8);
        assert_eq!(strict.cluster(&[0, 1], &embeddings).len(), 2);
        let loose = Aggregator::new().with_threshold(0.7);
        assert_eq!(loose.cluster(&[0, 1], &embeddings).len(), 1);
    }

    #[test]
    fn test_select_prefers_representatives() {
        let embeddings = vec![unit(1.0, 0.0, 0.0), unit(1.0, 0.0, 0.0), unit(0.0, 1.0, 0.0)];
        let similarity = vec![0.9, 0.85, 0.5];
        let selected = Aggregator::new().select(&similarity, &embeddings, 2);
        assert_eq!(selected, vec![0, 2]);
    }

    #[test]
    fn test_select_backfill_favours_diversity() {
        let embeddings = vec![
            unit(1.0, 0.0, 0.0),
            unit(1.0, 0.0, 0.0),
            vec![0.95, (1.0f32 - 0.95 * 0.95).sqrt(), 0.0],
        ];
        let similarity = vec![0.9, 0.8, 0.7];
        let aggregator = Aggregator::new();

        assert_eq!(aggregator.cluster(&[0, 1, 2], &embeddings).len(), 1);
        // Record 1 is closer to the query but identical to the representative.
        assert_eq!(aggregator.select(&similarity, &embeddings, 2), vec![0, 2]);
        assert_eq!(aggregator.select(&similarity, &embeddings, 3), vec![0, 1, 2]);
    }

    #[test]
    fn test_select_more_than_available() {
        let embeddings = vec![unit(1.0, 0.0, 0.0), unit(0.0, 1.0, 0.0)];
        let similarity = vec![0.2, 0.6];
        assert_eq!(Aggregator::new().select(&similarity, &embeddings, 10), vec![1, 0]);
    }

    #[test]
    fn test_select_empty_and_zero() {
        assert!(Aggregator::new().select(&[], &[], 5).is_empty());
        assert!(Aggregator::new().select(&[0.5], &[unit(1.0, 0.0, 0.0)], 0).is_empty());
    }

    #[test]
    fn test_rank_returns_records_in_similarity_order() {
        let records = vec![
            Record::new().with("title", "low"),
            Record::new().with("title", "high"),
            Record::new().with("title", "mid"),
        ];
        let embeddings = vec![unit(0.2, 1.0, 0.0), unit(1.0, 0.0, 0.0), unit(1.0, 0.0, 1.0)];
        let query = unit(1.0, 0.0, 0.0);
        let ranked = Aggregator::new().rank(records, &embeddings, &query, 3);
        let titles: Vec<&str> = ranked.iter().filter_map(|r| r.get("title")).collect();
        assert_eq!(titles, vec!["high", "mid", "low"]);
    }
}
