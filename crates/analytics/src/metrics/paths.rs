//! Navigation path frequency.

use std::collections::HashMap;

use pendo_insights_core::ResultRow;

use super::percent;

#[derive(Debug, Clone, PartialEq)]
pub struct PathCount {
    pub pages: Vec<String>,
    /// Visitors whose path matched exactly.
    pub visitors: usize,
    /// Share of all visitors with a path, in percent.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathReport {
    /// Visitors that contributed a path.
    pub visitors: usize,
    pub distinct_paths: usize,
    /// Most frequent first, at most `limit` entries.
    pub paths: Vec<PathCount>,
}

/// Rank visitor paths from rows ordered by visitor then time.
///
/// Each visitor's page ids are concatenated in row order and truncated at
/// `max_length`. With `start_page`, a path begins at the visitor's first
/// visit to that page and visitors who never saw it are skipped. Equal
/// counts keep first-seen order.
#[must_use]
pub fn rank_paths(
    rows: &[ResultRow],
    max_length: usize,
    start_page: Option<&str>,
    limit: usize,
) -> PathReport {
    let mut order: Vec<String> = Vec::new();
    let mut by_visitor: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        let (Some(visitor), Some(page)) = (row.get_display("visitorId"), row.get_display("pageId"))
        else {
            continue;
        };
        by_visitor
            .entry(visitor)
            .or_insert_with_key(|visitor| {
                order.push(visitor.clone());
                Vec::new()
            })
            .push(page);
    }

    let mut ranked: Vec<(Vec<String>, usize)> = Vec::new();
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();
    let mut visitors = 0;
    for visitor in &order {
        let Some(pages) = by_visitor.remove(visitor) else {
            continue;
        };
        let start = match start_page {
            Some(start) => match pages.iter().position(|p| p == start) {
                Some(pos) => pos,
                None => continue,
            },
            None => 0,
        };
        let path: Vec<String> = pages.into_iter().skip(start).take(max_length).collect();
        visitors += 1;
        match index.get(&path) {
            Some(&i) => {
                if let Some(entry) = ranked.get_mut(i) {
                    entry.1 += 1;
                }
            }
            None => {
                index.insert(path.clone(), ranked.len());
                ranked.push((path, 1));
            }
        }
    }

    let distinct_paths = ranked.len();
    // Stable sort keeps first-seen order among equal counts.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let paths = ranked
        .into_iter()
        .take(limit)
        .map(|(pages, count)| PathCount {
            pages,
            visitors: count,
            share: percent(count, visitors),
        })
        .collect();

    PathReport {
        visitors,
        distinct_paths,
        paths,
    }
}

/// Rows before the final visitor's run.
///
/// A capped listing can end partway through the last visitor's pages, so
/// that visitor is left out instead of being ranked on a partial path.
#[must_use]
pub fn without_last_visitor(rows: &[ResultRow]) -> &[ResultRow] {
    let Some(last) = rows.last().and_then(|row| row.get_display("visitorId")) else {
        return rows;
    };
    let keep = rows
        .iter()
        .rposition(|row| row.get_display("visitorId").as_deref() != Some(last.as_str()))
        .map_or(0, |i| i + 1);
    rows.get(..keep).unwrap_or(rows)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rows(events: &[(&str, &str)]) -> Vec<ResultRow> {
        events
            .iter()
            .map(|(v, p)| ResultRow::try_from(json!({"visitorId": v, "pageId": p})).unwrap())
            .collect()
    }

    #[test]
    fn test_identical_paths_are_counted_and_ranked() {
        let rows = rows(&[
            ("v1", "home"),
            ("v1", "pricing"),
            ("v2", "home"),
            ("v2", "docs"),
            ("v3", "home"),
            ("v3", "pricing"),
        ]);
        let report = rank_paths(&rows, 5, None, 10);
        assert_eq!(report.visitors, 3);
        assert_eq!(report.distinct_paths, 2);
        assert_eq!(report.paths[0].pages, vec!["home", "pricing"]);
        assert_eq!(report.paths[0].visitors, 2);
        assert!((report.paths[0].share - 66.7).abs() < 1e-9);
    }

    #[test]
    fn test_long_paths_are_truncated_not_dropped() {
        let rows = rows(&[("v1", "a"), ("v1", "b"), ("v1", "c"), ("v1", "d")]);
        let report = rank_paths(&rows, 2, None, 10);
        assert_eq!(report.paths[0].pages, vec!["a", "b"]);
        assert_eq!(report.visitors, 1);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let rows = rows(&[("v1", "x"), ("v2", "y"), ("v3", "z")]);
        let report = rank_paths(&rows, 5, None, 2);
        let firsts: Vec<_> = report.paths.iter().map(|p| p.pages[0].as_str()).collect();
        assert_eq!(firsts, vec!["x", "y"]);
        assert_eq!(report.distinct_paths, 3);
    }

    #[test]
    fn test_repeated_pages_are_kept() {
        let rows = rows(&[("v1", "a"), ("v1", "a"), ("v1", "b")]);
        let report = rank_paths(&rows, 5, None, 10);
        assert_eq!(report.paths[0].pages, vec!["a", "a", "b"]);
    }

    #[test]
    fn test_start_page_anchors_paths() {
        let rows = rows(&[
            ("v1", "login"),
            ("v1", "home"),
            ("v1", "reports"),
            ("v2", "docs"),
        ]);
        let report = rank_paths(&rows, 5, Some("home"), 10);
        assert_eq!(report.visitors, 1);
        assert_eq!(report.paths[0].pages, vec!["home", "reports"]);
    }

    #[test]
    fn test_without_last_visitor_drops_trailing_run() {
        let listing = rows(&[("v1", "a"), ("v1", "b"), ("v2", "a"), ("v2", "c")]);
        let kept = without_last_visitor(&listing);
        assert_eq!(kept.len(), 2);
        assert_eq!(rank_paths(kept, 5, None, 10).visitors, 1);

        let single = rows(&[("v1", "a"), ("v1", "b")]);
        assert!(without_last_visitor(&single).is_empty());
        assert!(without_last_visitor(&[]).is_empty());
    }
}
