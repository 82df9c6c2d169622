use std::collections::BTreeSet;

/// Canonical set of lowercase skill tokens.
pub type SkillSet = BTreeSet<String>;

/// Split a comma-separated skills field into trimmed, lowercased tokens.
///
/// Empty pieces (from `",,"`, leading or trailing commas) are dropped and
/// duplicates collapse. Absent text yields the empty set.
pub fn normalize_skills(raw: Option<&str>) -> SkillSet {
    raw.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Render a skill set back into the comma-separated form used for storage.
pub fn join_skills(skills: &SkillSet) -> String {
    skills.iter().cloned().collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tokens: &[&str]) -> SkillSet {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_trims_and_lowercases() {
        let skills = normalize_skills(Some("Go, Kubernetes, K8s, AWS"));
        assert_eq!(skills, set(&["go", "kubernetes", "k8s", "aws"]));
    }

    #[test]
    fn test_normalize_drops_empty_tokens() {
        let skills = normalize_skills(Some(",rust,, ,sql,"));
        assert_eq!(skills, set(&["rust", "sql"]));
    }

    #[test]
    fn test_normalize_collapses_duplicates() {
        let skills = normalize_skills(Some("Rust,rust , RUST"));
        assert_eq!(skills, set(&["rust"]));
    }

    #[test]
    fn test_normalize_absent_and_empty() {
        assert!(normalize_skills(None).is_empty());
        assert!(normalize_skills(Some("")).is_empty());
        assert!(normalize_skills(Some(" , ,")).is_empty());
    }

    #[test]
    fn test_join_skills() {
        let skills = normalize_skills(Some("postgres, Node"));
        assert_eq!(join_skills(&skills), "node,postgres");
    }
}
