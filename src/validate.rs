//! Length and shape checks applied before anything reaches the store.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::AppError;
use crate::models::NewJob;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid username regex"));
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

fn check_len(field: &'static str, value: &str, min: usize, max: usize) -> Result<(), AppError> {
    let len = value.chars().count();
    if len < min || len > max {
        let reason = if min == 0 {
            format!("must be at most {} characters", max)
        } else {
            format!("must be {}-{} characters", min, max)
        };
        return Err(AppError::validation(field, reason));
    }
    Ok(())
}

fn check_opt_len(field: &'static str, value: Option<&str>, max: usize) -> Result<(), AppError> {
    match value {
        Some(v) => check_len(field, v, 0, max),
        None => Ok(()),
    }
}

pub fn registration(username: &str, email: &str) -> Result<(), AppError> {
    check_len("username", username, 3, 24)?;
    if !USERNAME_RE.is_match(username) {
        return Err(AppError::validation(
            "username",
            "may only contain letters, digits and underscores",
        ));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(AppError::validation("email", "is not a valid address"));
    }
    Ok(())
}

pub fn profile(bio: Option<&str>, skills: Option<&str>) -> Result<(), AppError> {
    check_opt_len("bio", bio, 500)?;
    check_opt_len("skills", skills, 200)
}

pub fn job(job: &NewJob) -> Result<(), AppError> {
    check_len("title", &job.title, 3, 80)?;
    check_len("company", &job.company, 2, 80)?;
    check_opt_len("location", job.location.as_deref(), 80)?;
    check_opt_len("currency", job.currency.as_deref(), 6)?;
    check_opt_len("skills", job.skills.as_deref(), 200)?;
    check_len("description", &job.description, 10, 5000)?;
    for (field, value) in [("minSalary", job.min_salary), ("maxSalary", job.max_salary)] {
        if value.is_some_and(|v| v < 0) {
            return Err(AppError::validation(field, "must not be negative"));
        }
    }
    Ok(())
}

pub fn post(content: &str, tags: Option<&str>) -> Result<(), AppError> {
    check_len("content", content, 1, 2000)?;
    check_opt_len("tags", tags, 200)
}

pub fn comment(content: &str) -> Result<(), AppError> {
    check_len("content", content, 1, 1000)
}

pub fn feedback(content: Option<&str>) -> Result<(), AppError> {
    check_opt_len("content", content, 500)
}

pub fn application(message: Option<&str>) -> Result<(), AppError> {
    check_opt_len("message", message, 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_job() -> NewJob {
        NewJob {
            title: "Senior Node.js Engineer".to_string(),
            company: "TechFlow".to_string(),
            description: "Build high-throughput APIs.".to_string(),
            ..NewJob::default()
        }
    }

    fn field_of(err: AppError) -> &'static str {
        match err {
            AppError::Validation { field, .. } => field,
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_registration() {
        assert!(registration("alice_01", "alice@example.com").is_ok());
        assert_eq!(field_of(registration("al", "a@b.co").unwrap_err()), "username");
        assert_eq!(field_of(registration("bad name", "a@b.co").unwrap_err()), "username");
        assert_eq!(field_of(registration(&"x".repeat(25), "a@b.co").unwrap_err()), "username");
        assert_eq!(field_of(registration("alice", "not-an-email").unwrap_err()), "email");
    }

    #[test]
    fn test_job_bounds() {
        assert!(job(&valid_job()).is_ok());

        let mut j = valid_job();
        j.title = "QA".to_string();
        assert_eq!(field_of(job(&j).unwrap_err()), "title");

        let mut j = valid_job();
        j.description = "short".to_string();
        assert_eq!(field_of(job(&j).unwrap_err()), "description");

        let mut j = valid_job();
        j.currency = Some("DOLLARS".to_string());
        assert_eq!(field_of(job(&j).unwrap_err()), "currency");

        let mut j = valid_job();
        j.max_salary = Some(-1);
        assert_eq!(field_of(job(&j).unwrap_err()), "maxSalary");
    }

    #[test]
    fn test_lengths_count_characters() {
        // 2000 multi-byte characters are within bounds
        assert!(post(&"é".repeat(2000), None).is_ok());
        assert!(post(&"é".repeat(2001), None).is_err());
        assert!(post("", None).is_err());
    }

    #[test]
    fn test_optional_fields() {
        assert!(comment("nice").is_ok());
        assert!(comment("").is_err());
        assert!(feedback(None).is_ok());
        assert!(feedback(Some(&"x".repeat(501))).is_err());
        assert!(application(Some("hello")).is_ok());
        assert!(profile(Some("Fullstack dev"), Some(&"x".repeat(201))).is_err());
    }
}
