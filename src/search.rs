//! Job search: query construction, in-memory filtering and skill-based ranking.
//!
//! The candidate set comes from a [`JobStore`], capped and ordered by
//! `created_at` descending. The cap bounds the engine's input, not its
//! output, so a query can miss true matches older than the most recent
//! `cap` candidates.

use anyhow::Result;
use std::cmp::Reverse;
use tracing::debug;

use crate::models::{JobListing, RankedJobListing};
use crate::skills::{normalize_skills, SkillSet};

pub const DEFAULT_SEARCH_CAP: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Trimmed; empty means inactive.
    pub free_text: String,
    /// `None` means no constraint.
    pub remote: Option<bool>,
    /// Trimmed; empty means inactive.
    pub location: String,
    /// 0 means inactive.
    pub min_salary: u64,
    /// Ranking only, never filters.
    pub skills: SkillSet,
}

impl SearchQuery {
    /// Build a query from raw request parameters. Never fails: anything
    /// unrecognized deactivates its criterion.
    pub fn from_params(
        q: Option<&str>,
        remote: Option<&str>,
        location: Option<&str>,
        min_salary: Option<&str>,
        skills: Option<&str>,
    ) -> Self {
        Self {
            free_text: q.unwrap_or_default().trim().to_string(),
            remote: parse_tri_state(remote),
            location: location.unwrap_or_default().trim().to_string(),
            min_salary: parse_threshold(min_salary),
            skills: normalize_skills(skills),
        }
    }

    pub fn matches(&self, job: &JobListing) -> bool {
        self.matches_free_text(job)
            && self.remote.is_none_or(|remote| job.remote == remote)
            && self.matches_location(job)
            && self.matches_salary(job)
    }

    fn matches_free_text(&self, job: &JobListing) -> bool {
        if self.free_text.is_empty() {
            return true;
        }
        [&job.title, &job.company, &job.description, &job.skills]
            .iter()
            .any(|field| contains_ci(field, &self.free_text))
    }

    fn matches_location(&self, job: &JobListing) -> bool {
        self.location.is_empty() || contains_ci(&job.location, &self.location)
    }

    // A missing side fails its half of the OR; it is not read as zero.
    fn matches_salary(&self, job: &JobListing) -> bool {
        if self.min_salary == 0 {
            return true;
        }
        let meets = |v: Option<i64>| v.is_some_and(|v| v >= 0 && v as u64 >= self.min_salary);
        meets(job.min_salary) || meets(job.max_salary)
    }
}

/// Case-insensitive substring test using Unicode lowercasing.
///
/// Stores that pre-filter text criteria must use this same comparison so
/// pushed-down and in-memory filtering agree.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Exactly `"true"` / `"false"` set the flag; anything else leaves it unset.
fn parse_tri_state(raw: Option<&str>) -> Option<bool> {
    match raw {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}

/// Non-negative integers only. An all-digit value too large for `u64`
/// saturates instead of deactivating the criterion.
fn parse_threshold(raw: Option<&str>) -> u64 {
    let Some(s) = raw.map(str::trim) else {
        return 0;
    };
    match s.parse::<u64>() {
        Ok(v) => v,
        Err(_) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => u64::MAX,
        Err(_) => 0,
    }
}

/// Source of candidate listings for a search.
///
/// Implementations return at most `limit` listings ordered by `created_at`
/// descending. They may pre-filter by any subset of the query's criteria;
/// the engine re-applies the full predicate either way.
pub trait JobStore {
    fn candidate_jobs(&self, query: &SearchQuery, limit: usize) -> Result<Vec<JobListing>>;
}

pub fn filter(candidates: Vec<JobListing>, query: &SearchQuery) -> Vec<JobListing> {
    candidates.into_iter().filter(|job| query.matches(job)).collect()
}

/// Number of query tokens present in the listing's normalized skills.
pub fn score(job: &JobListing, skills: &SkillSet) -> u32 {
    if skills.is_empty() {
        return 0;
    }
    let listing = normalize_skills(Some(&job.skills));
    skills.iter().filter(|s| listing.contains(*s)).count() as u32
}

/// Score and order listings by `(score desc, min_salary-or-0 desc, input order)`.
///
/// Expects the capped candidate sequence in `created_at` descending order,
/// which makes the final tie-break "newest first".
pub fn rank(listings: Vec<JobListing>, skills: &SkillSet) -> Vec<RankedJobListing> {
    let mut ranked: Vec<RankedJobListing> = listings
        .into_iter()
        .map(|job| {
            let score = score(&job, skills);
            RankedJobListing { job, score }
        })
        .collect();

    ranked.sort_by_key(|r| (Reverse(r.score), Reverse(r.job.min_salary.unwrap_or(0))));
    ranked
}

pub fn search_jobs(
    store: &impl JobStore,
    query: &SearchQuery,
    cap: usize,
) -> Result<Vec<RankedJobListing>> {
    let candidates = store.candidate_jobs(query, cap)?;
    let fetched = candidates.len();
    let survivors = filter(candidates, query);
    debug!(fetched, matched = survivors.len(), cap, "filtered job candidates");
    Ok(rank(survivors, &query.skills))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn job(id: &str, skills: &str, min: Option<i64>, max: Option<i64>) -> JobListing {
        JobListing {
            id: id.to_string(),
            title: format!("Engineer {}", id),
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            remote: true,
            min_salary: min,
            max_salary: max,
            currency: "USD".to_string(),
            skills: skills.to_string(),
            description: "Work on things".to_string(),
            posted_by_id: "u1".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn query(q: &str, remote: Option<&str>, location: &str, min: &str, skills: &str) -> SearchQuery {
        SearchQuery::from_params(Some(q), remote, Some(location), Some(min), Some(skills))
    }

    fn ids(ranked: &[RankedJobListing]) -> Vec<&str> {
        ranked.iter().map(|r| r.job.id.as_str()).collect()
    }

    struct VecStore(Vec<JobListing>);

    impl JobStore for VecStore {
        fn candidate_jobs(&self, _query: &SearchQuery, limit: usize) -> Result<Vec<JobListing>> {
            let mut jobs = self.0.clone();
            jobs.sort_by_key(|j| Reverse(j.created_at));
            jobs.truncate(limit);
            Ok(jobs)
        }
    }

    #[test]
    fn test_from_params_defaults_inactive() {
        let q = SearchQuery::from_params(None, None, None, None, None);
        assert_eq!(q, SearchQuery::default());
        assert!(q.matches(&job("a", "", None, None)));
    }

    #[test]
    fn test_from_params_trims_and_coerces() {
        let q = SearchQuery::from_params(
            Some("  rust "),
            Some("maybe"),
            Some(" Madrid "),
            Some("abc"),
            Some("Go, ,K8s"),
        );
        assert_eq!(q.free_text, "rust");
        assert_eq!(q.remote, None);
        assert_eq!(q.location, "Madrid");
        assert_eq!(q.min_salary, 0);
        assert_eq!(q.skills.len(), 2);

        assert_eq!(query("", None, "", "-5", "").min_salary, 0);
        assert_eq!(query("", None, "", "80000", "").min_salary, 80000);
        assert_eq!(query("", Some("true"), "", "", "").remote, Some(true));
        assert_eq!(query("", Some("false"), "", "", "").remote, Some(false));
    }

    #[test]
    fn test_tri_state_requires_exact_literal() {
        for raw in [" true", "false ", "TRUE", "1", ""] {
            assert_eq!(query("", Some(raw), "", "", "").remote, None, "{:?}", raw);
        }
    }

    #[test]
    fn test_oversized_threshold_saturates() {
        let q = query("", None, "", "99999999999999999999", "");
        assert_eq!(q.min_salary, u64::MAX);
        assert!(!q.matches(&job("a", "", Some(90000), Some(i64::MAX))));

        assert_eq!(query("", None, "", " 18446744073709551616 ", "").min_salary, u64::MAX);
        assert_eq!(query("", None, "", "1e30", "").min_salary, 0);
        assert_eq!(query("", None, "", "-99999999999999999999", "").min_salary, 0);
    }

    #[test]
    fn test_free_text_matches_any_field() {
        let mut listing = job("a", "Postgres,AWS", None, None);
        listing.title = "Backend Developer".to_string();
        listing.company = "CloudBridge".to_string();
        listing.description = "Pipelines and observability".to_string();

        assert!(query("backend", None, "", "", "").matches(&listing));
        assert!(query("CLOUD", None, "", "", "").matches(&listing));
        assert!(query("observ", None, "", "", "").matches(&listing));
        assert!(query("postgres", None, "", "", "").matches(&listing));
        assert!(!query("frontend", None, "", "", "").matches(&listing));
    }

    #[test]
    fn test_remote_tri_state() {
        let mut onsite = job("a", "", None, None);
        onsite.remote = false;
        let remote = job("b", "", None, None);

        let q = query("", Some("true"), "", "", "");
        assert!(q.matches(&remote));
        assert!(!q.matches(&onsite));

        let q = query("", Some("false"), "", "", "");
        assert!(!q.matches(&remote));
        assert!(q.matches(&onsite));

        let q = query("", None, "", "", "");
        assert!(q.matches(&remote) && q.matches(&onsite));
    }

    #[test]
    fn test_location_substring_case_insensitive() {
        let mut listing = job("a", "", None, None);
        listing.location = "Madrid, Spain".to_string();

        assert!(query("", None, "madrid", "", "").matches(&listing));
        assert!(query("", None, "SPAIN", "", "").matches(&listing));
        assert!(!query("", None, "Berlin", "", "").matches(&listing));
    }

    #[test]
    fn test_text_matching_folds_unicode() {
        let mut listing = job("a", "", None, None);
        listing.title = "\u{212A}ubernetes admin".to_string();
        listing.location = "MÁLAGA".to_string();

        assert!(contains_ci("Señor Dev", "SEÑOR"));
        assert!(!contains_ci("Senor Dev", "señor"));
        assert!(query("kubernetes", None, "", "", "").matches(&listing));
        assert!(query("", None, "málaga", "", "").matches(&listing));
    }

    #[test]
    fn test_salary_threshold_null_handling() {
        let neither = job("a", "", None, None);
        let max_only = job("b", "", None, Some(90000));
        let min_only = job("c", "", Some(85000), None);

        for t in ["1", "80000", "95000"] {
            assert!(!query("", None, "", t, "").matches(&neither));
        }
        assert!(query("", None, "", "80000", "").matches(&max_only));
        assert!(!query("", None, "", "95000", "").matches(&max_only));
        assert!(query("", None, "", "85000", "").matches(&min_only));
        assert!(!query("", None, "", "85001", "").matches(&min_only));
        assert!(query("", None, "", "0", "").matches(&neither));
    }

    #[test]
    fn test_criteria_combine_with_and() {
        let mut listing = job("a", "rust", Some(100000), None);
        listing.location = "Berlin".to_string();
        listing.remote = false;

        assert!(query("engineer", Some("false"), "berl", "90000", "").matches(&listing));
        assert!(!query("engineer", Some("true"), "berl", "90000", "").matches(&listing));
        assert!(!query("engineer", Some("false"), "paris", "90000", "").matches(&listing));
        assert!(!query("designer", Some("false"), "berl", "90000", "").matches(&listing));
        assert!(!query("engineer", Some("false"), "berl", "200000", "").matches(&listing));
    }

    #[test]
    fn test_skills_do_not_filter() {
        let listing = job("a", "java", None, None);
        assert!(query("", None, "", "", "rust,go").matches(&listing));
    }

    #[test]
    fn test_score_counts_distinct_query_tokens() {
        let listing = job("a", "Go, Kubernetes, K8s, AWS", None, None);
        let skills = normalize_skills(Some("go,k8s"));
        assert_eq!(score(&listing, &skills), 2);

        let skills = normalize_skills(Some("GO, go , kubernetes"));
        assert_eq!(score(&listing, &skills), 2);

        assert_eq!(score(&listing, &SkillSet::new()), 0);
    }

    #[test]
    fn test_rank_by_score_then_salary_then_input_order() {
        let listings = vec![
            job("newest", "rust", Some(50000), None),
            job("rich", "rust", Some(120000), None),
            job("both", "rust,sql", None, None),
            job("none", "", Some(200000), None),
            job("twin", "rust", Some(50000), None),
        ];
        let ranked = rank(listings, &normalize_skills(Some("rust,sql")));

        assert_eq!(ids(&ranked), vec!["both", "rich", "newest", "twin", "none"]);
        assert_eq!(ranked[0].score, 2);
        assert_eq!(ranked[4].score, 0);
    }

    #[test]
    fn test_rank_salary_tie_break_without_skills() {
        let listings = vec![
            job("low", "", Some(50000), None),
            job("high", "", Some(80000), None),
            job("unknown", "", None, Some(500000)),
        ];
        let ranked = rank(listings, &SkillSet::new());
        assert_eq!(ids(&ranked), vec!["high", "low", "unknown"]);
        assert!(ranked.iter().all(|r| r.score == 0));
        // the stored field is not rewritten
        assert_eq!(ranked[2].job.min_salary, None);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(filter(Vec::new(), &SearchQuery::default()).is_empty());
        assert!(rank(Vec::new(), &normalize_skills(Some("rust"))).is_empty());
        let store = VecStore(Vec::new());
        assert!(search_jobs(&store, &SearchQuery::default(), DEFAULT_SEARCH_CAP)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_search_jobs_caps_input_before_filtering() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut jobs = Vec::new();
        for i in 0..5 {
            let mut j = job(&format!("j{}", i), "", None, None);
            j.created_at = base + Duration::minutes(i);
            j.remote = i == 0; // only the oldest is remote
            jobs.push(j);
        }
        let store = VecStore(jobs);
        let q = query("", Some("true"), "", "", "");

        assert!(search_jobs(&store, &q, 4).unwrap().is_empty());
        assert_eq!(ids(&search_jobs(&store, &q, 5).unwrap()), vec!["j0"]);
    }

    #[test]
    fn test_search_jobs_newest_first_on_full_tie() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let jobs = (0..3)
            .map(|i| {
                let mut j = job(&format!("j{}", i), "rust", Some(70000), None);
                j.created_at = base + Duration::hours(i);
                j
            })
            .collect();
        let store = VecStore(jobs);
        let q = query("", None, "", "", "rust");
        assert_eq!(ids(&search_jobs(&store, &q, 100).unwrap()), vec!["j2", "j1", "j0"]);
    }

    fn arb_job() -> impl Strategy<Value = JobListing> {
        (
            "[a-z]{1,6}",
            prop::collection::vec(prop::sample::select(vec!["rust", "go", "sql", "k8s", "aws"]), 0..4),
            prop::option::of(0i64..5),
            prop::option::of(0i64..5),
            any::<bool>(),
        )
            .prop_map(|(id, skills, min, max, remote)| {
                let mut j = job(&id, &skills.join(","), min.map(|m| m * 10000), max.map(|m| m * 10000));
                j.remote = remote;
                j
            })
    }

    proptest! {
        #[test]
        fn prop_rank_is_sorted_and_stable(
            jobs in prop::collection::vec(arb_job(), 0..30),
            raw_skills in "(rust|go|sql|k8s|java)(,(rust|go|sql|k8s|java)){0,3}",
        ) {
            let skills = normalize_skills(Some(&raw_skills));
            let tagged: Vec<JobListing> = jobs
                .into_iter()
                .enumerate()
                .map(|(i, mut j)| { j.id = i.to_string(); j })
                .collect();

            let first = rank(tagged.clone(), &skills);
            let second = rank(tagged, &skills);
            prop_assert_eq!(&first, &second);

            for pair in first.windows(2) {
                let key = |r: &RankedJobListing| (r.score, r.job.min_salary.unwrap_or(0));
                let (a, b) = (key(&pair[0]), key(&pair[1]));
                prop_assert!(a >= b);
                if a == b {
                    let ia: usize = pair[0].job.id.parse().unwrap();
                    let ib: usize = pair[1].job.id.parse().unwrap();
                    prop_assert!(ia < ib);
                }
            }
        }

        #[test]
        fn prop_filter_keeps_exactly_matching(
            jobs in prop::collection::vec(arb_job(), 0..30),
            remote in prop::option::of(any::<bool>()),
            min in 0u64..60000,
        ) {
            let q = SearchQuery { remote, min_salary: min, ..SearchQuery::default() };
            let kept = filter(jobs.clone(), &q);
            let expected: Vec<JobListing> = jobs
                .into_iter()
                .filter(|j| {
                    let remote_ok = remote.is_none_or(|r| j.remote == r);
                    let salary_ok = min == 0
                        || j.min_salary.is_some_and(|v| v as u64 >= min)
                        || j.max_salary.is_some_and(|v| v as u64 >= min);
                    remote_ok && salary_ok
                })
                .collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
