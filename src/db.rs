use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::feed::{FeedStore, PostBundle};
use crate::models::{
    AppStatus, Application, AuthorRef, Comment, Feedback, FeedbackType, FollowCounts, JobListing,
    NewJob, Post, User,
};
use crate::search::{self, JobStore, SearchQuery};
use crate::validate;

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedStats {
    pub users: usize,
    pub posts: usize,
    pub jobs: usize,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Per-connection setup shared by on-disk and in-memory databases.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    // contains_ci(haystack, needle) folds case the same way the search engine does
    conn.create_scalar_function(
        "contains_ci",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack = ctx.get::<String>(0)?;
            let needle = ctx.get::<String>(1)?;
            Ok(search::contains_ci(&haystack, &needle))
        },
    )
    .context("Failed to register SQL functions")?;
    Ok(())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        configure(&conn)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                bio TEXT NOT NULL DEFAULT '',
                skills TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT 'Remote',
                remote INTEGER NOT NULL DEFAULT 1,
                min_salary INTEGER,
                max_salary INTEGER,
                currency TEXT NOT NULL DEFAULT 'USD',
                skills TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL,
                posted_by_id TEXT NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS saved_jobs (
                job_id TEXT NOT NULL REFERENCES jobs(id),
                user_id TEXT NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL,
                PRIMARY KEY (job_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS applications (
                id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL REFERENCES jobs(id),
                user_id TEXT NOT NULL REFERENCES users(id),
                message TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'PENDING'
                    CHECK (status IN ('PENDING', 'REVIEWING', 'ACCEPTED', 'REJECTED')),
                created_at TEXT NOT NULL,
                UNIQUE (job_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL REFERENCES users(id),
                content TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS feedbacks (
                id TEXT PRIMARY KEY,
                post_id TEXT NOT NULL REFERENCES posts(id),
                author_id TEXT NOT NULL REFERENCES users(id),
                type TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                post_id TEXT NOT NULL REFERENCES posts(id),
                author_id TEXT NOT NULL REFERENCES users(id),
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS follows (
                follower_id TEXT NOT NULL REFERENCES users(id),
                following_id TEXT NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL,
                PRIMARY KEY (follower_id, following_id)
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_created ON jobs(created_at);
            CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at);
            CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);
            CREATE INDEX IF NOT EXISTS idx_feedbacks_post ON feedbacks(post_id);
            CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);
            CREATE INDEX IF NOT EXISTS idx_follows_following ON follows(following_id);
            "#,
        )?;
        info!(path = %self.path.display(), "schema ready");
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='jobs'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!(
                "Database not initialized. Run 'workthread init' first."
            ));
        }
        Ok(())
    }

    pub fn health(&self) -> Result<()> {
        let one: i64 = self
            .conn
            .query_row("SELECT 1", [], |row| row.get(0))
            .context("Database health probe failed")?;
        if one != 1 {
            return Err(anyhow!("Database health probe returned {}", one));
        }
        Ok(())
    }

    // --- User operations ---

    pub fn register_user(&self, username: &str, email: &str) -> Result<User> {
        validate::registration(username, email)?;
        let user = User {
            id: new_id(),
            username: username.to_string(),
            email: email.to_string(),
            bio: String::new(),
            skills: String::new(),
            created_at: Utc::now(),
        };
        let inserted = self.conn.execute(
            "INSERT INTO users (id, username, email, bio, skills, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![user.id, user.username, user.email, user.bio, user.skills, user.created_at],
        );
        match inserted {
            Ok(_) => Ok(user),
            Err(e) if is_constraint_violation(&e) => {
                Err(AppError::Conflict("Username or email already exists".to_string()).into())
            }
            Err(e) => Err(e).context("Failed to register user"),
        }
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.conn
            .query_row(
                "SELECT id, username, email, bio, skills, created_at
                 FROM users WHERE username = ?1",
                [username],
                Self::row_to_user,
            )
            .optional()
            .context("Failed to look up user")
    }

    pub fn require_user(&self, username: &str) -> Result<User> {
        self.get_user_by_username(username)?
            .ok_or_else(|| AppError::NotFound(format!("User '{}'", username)).into())
    }

    pub fn update_profile(&self, user_id: &str, bio: Option<&str>, skills: Option<&str>) -> Result<()> {
        validate::profile(bio, skills)?;
        self.conn.execute(
            "UPDATE users SET bio = ?1, skills = ?2 WHERE id = ?3",
            params![bio.unwrap_or_default(), skills.unwrap_or_default(), user_id],
        )?;
        Ok(())
    }

    pub fn search_users(&self, q: &str) -> Result<Vec<User>> {
        let q = q.trim();
        if q.is_empty() {
            return Ok(Vec::new());
        }
        let needle = q.to_lowercase();
        let mut stmt = self.conn.prepare(
            "SELECT id, username, email, bio, skills, created_at FROM users
             ORDER BY username",
        )?;
        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to search users")?;
        Ok(users
            .into_iter()
            .filter(|u| {
                [&u.username, &u.skills, &u.bio]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .collect())
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            bio: row.get(3)?,
            skills: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    // --- Job operations ---

    pub fn create_job(&self, poster_id: &str, new: &NewJob) -> Result<JobListing> {
        validate::job(new)?;
        let job = JobListing {
            id: new_id(),
            title: new.title.clone(),
            company: new.company.clone(),
            location: new
                .location
                .clone()
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| NewJob::DEFAULT_LOCATION.to_string()),
            remote: new.remote.unwrap_or(true),
            min_salary: new.min_salary,
            max_salary: new.max_salary,
            currency: new
                .currency
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| NewJob::DEFAULT_CURRENCY.to_string()),
            skills: new.skills.clone().unwrap_or_default(),
            description: new.description.clone(),
            posted_by_id: poster_id.to_string(),
            created_at: Utc::now(),
        };
        self.conn.execute(
            "INSERT INTO jobs (id, title, company, location, remote, min_salary, max_salary,
                               currency, skills, description, posted_by_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                job.id,
                job.title,
                job.company,
                job.location,
                job.remote,
                job.min_salary,
                job.max_salary,
                job.currency,
                job.skills,
                job.description,
                job.posted_by_id,
                job.created_at
            ],
        )?;
        Ok(job)
    }

    pub fn get_job(&self, id: &str) -> Result<Option<JobListing>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
                [id],
                Self::row_to_job,
            )
            .optional()
            .context("Failed to load job")
    }

    fn require_job(&self, id: &str) -> Result<JobListing> {
        self.get_job(id)?
            .ok_or_else(|| AppError::NotFound(format!("Job {}", id)).into())
    }

    pub fn save_job(&self, job_id: &str, user_id: &str) -> Result<()> {
        self.require_job(job_id)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO saved_jobs (job_id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![job_id, user_id, Utc::now()],
        )?;
        Ok(())
    }

    pub fn unsave_job(&self, job_id: &str, user_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM saved_jobs WHERE job_id = ?1 AND user_id = ?2",
            params![job_id, user_id],
        )?;
        Ok(())
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<JobListing> {
        Ok(JobListing {
            id: row.get(0)?,
            title: row.get(1)?,
            company: row.get(2)?,
            location: row.get(3)?,
            remote: row.get(4)?,
            min_salary: row.get(5)?,
            max_salary: row.get(6)?,
            currency: row.get(7)?,
            skills: row.get(8)?,
            description: row.get(9)?,
            posted_by_id: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    // --- Application operations ---

    pub fn apply(&self, job_id: &str, user_id: &str, message: Option<&str>) -> Result<Application> {
        validate::application(message)?;
        let job = self.require_job(job_id)?;
        let app = Application {
            id: new_id(),
            job_id: job.id,
            job_title: job.title,
            user_id: user_id.to_string(),
            message: message.unwrap_or_default().to_string(),
            status: AppStatus::default(),
            created_at: Utc::now(),
        };
        let inserted = self.conn.execute(
            "INSERT INTO applications (id, job_id, user_id, message, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![app.id, app.job_id, app.user_id, app.message, app.status.as_str(), app.created_at],
        );
        match inserted {
            Ok(_) => Ok(app),
            Err(e) if is_constraint_violation(&e) => {
                Err(AppError::Conflict("Already applied".to_string()).into())
            }
            Err(e) => Err(e).context("Failed to apply"),
        }
    }

    pub fn applications_for_user(&self, user_id: &str) -> Result<Vec<Application>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.job_id, j.title, a.user_id, a.message, a.status, a.created_at
             FROM applications a
             JOIN jobs j ON a.job_id = j.id
             WHERE a.user_id = ?1
             ORDER BY a.created_at DESC, a.rowid DESC",
        )?;
        let rows = stmt.query_map([user_id], Self::row_to_application)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list applications")
    }

    /// Only the poster of the job may move an application along.
    pub fn set_application_status(
        &self,
        app_id: &str,
        actor_id: &str,
        status: AppStatus,
    ) -> Result<Application> {
        let found = self
            .conn
            .query_row(
                "SELECT j.posted_by_id FROM applications a
                 JOIN jobs j ON a.job_id = j.id
                 WHERE a.id = ?1",
                [app_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        let poster = found.ok_or_else(|| AppError::NotFound(format!("Application {}", app_id)))?;
        if poster != actor_id {
            return Err(AppError::Forbidden("only the job poster can change status".to_string()).into());
        }
        self.conn.execute(
            "UPDATE applications SET status = ?1 WHERE id = ?2",
            params![status.as_str(), app_id],
        )?;
        self.conn
            .query_row(
                "SELECT a.id, a.job_id, j.title, a.user_id, a.message, a.status, a.created_at
                 FROM applications a JOIN jobs j ON a.job_id = j.id
                 WHERE a.id = ?1",
                [app_id],
                Self::row_to_application,
            )
            .context("Failed to reload application")
    }

    fn row_to_application(row: &rusqlite::Row) -> rusqlite::Result<Application> {
        let status: String = row.get(5)?;
        let status = status.parse::<AppStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Application {
            id: row.get(0)?,
            job_id: row.get(1)?,
            job_title: row.get(2)?,
            user_id: row.get(3)?,
            message: row.get(4)?,
            status,
            created_at: row.get(6)?,
        })
    }

    // --- Post operations ---

    pub fn create_post(&self, author_id: &str, content: &str, tags: Option<&str>) -> Result<Post> {
        validate::post(content, tags)?;
        let post = Post {
            id: new_id(),
            author_id: author_id.to_string(),
            content: content.to_string(),
            tags: tags.unwrap_or_default().to_string(),
            created_at: Utc::now(),
        };
        self.conn.execute(
            "INSERT INTO posts (id, author_id, content, tags, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![post.id, post.author_id, post.content, post.tags, post.created_at],
        )?;
        Ok(post)
    }

    pub fn posts_by(&self, author_id: &str) -> Result<Vec<Post>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, author_id, content, tags, created_at FROM posts
             WHERE author_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([author_id], Self::row_to_post)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list posts")
    }

    fn require_post(&self, post_id: &str) -> Result<()> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
            [post_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(AppError::NotFound(format!("Post {}", post_id)).into());
        }
        Ok(())
    }

    fn row_to_post(row: &rusqlite::Row) -> rusqlite::Result<Post> {
        Ok(Post {
            id: row.get(0)?,
            author_id: row.get(1)?,
            content: row.get(2)?,
            tags: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    // --- Feedback operations ---

    pub fn create_feedback(
        &self,
        post_id: &str,
        author_id: &str,
        kind: FeedbackType,
        content: Option<&str>,
    ) -> Result<Feedback> {
        validate::feedback(content)?;
        self.require_post(post_id)?;
        let feedback = Feedback {
            id: new_id(),
            post_id: post_id.to_string(),
            author_id: author_id.to_string(),
            kind,
            content: content.unwrap_or_default().to_string(),
            created_at: Utc::now(),
        };
        self.conn.execute(
            "INSERT INTO feedbacks (id, post_id, author_id, type, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                feedback.id,
                feedback.post_id,
                feedback.author_id,
                feedback.kind.as_str(),
                feedback.content,
                feedback.created_at
            ],
        )?;
        Ok(feedback)
    }

    /// Feedback on a post, newest first. Rows whose stored type is not a
    /// known feedback type are skipped.
    pub fn feedback_for(&self, post_id: &str) -> Result<Vec<Feedback>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, post_id, author_id, type, content, created_at FROM feedbacks
             WHERE post_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([post_id], |row| {
            let raw_kind: String = row.get(3)?;
            Ok((
                raw_kind,
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(4)?,
                row.get::<_, DateTime<Utc>>(5)?,
            ))
        })?;

        let mut feedback = Vec::new();
        for row in rows {
            let (raw_kind, id, post_id, author_id, content, created_at) =
                row.context("Failed to read feedback")?;
            match raw_kind.parse::<FeedbackType>() {
                Ok(kind) => feedback.push(Feedback {
                    id,
                    post_id,
                    author_id,
                    kind,
                    content,
                    created_at,
                }),
                Err(e) => warn!(%id, error = %e, "skipping feedback with unknown type"),
            }
        }
        Ok(feedback)
    }

    // --- Comment operations ---

    pub fn create_comment(&self, post_id: &str, author: &User, content: &str) -> Result<Comment> {
        validate::comment(content)?;
        self.require_post(post_id)?;
        let comment = Comment {
            id: new_id(),
            post_id: post_id.to_string(),
            author: AuthorRef {
                id: author.id.clone(),
                username: author.username.clone(),
            },
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.conn.execute(
            "INSERT INTO comments (id, post_id, author_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![comment.id, comment.post_id, comment.author.id, comment.content, comment.created_at],
        )?;
        Ok(comment)
    }

    pub fn comments_for(&self, post_id: &str) -> Result<Vec<Comment>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.post_id, u.id, u.username, c.content, c.created_at
             FROM comments c
             JOIN users u ON c.author_id = u.id
             WHERE c.post_id = ?1
             ORDER BY c.created_at ASC, c.rowid ASC",
        )?;
        let rows = stmt.query_map([post_id], |row| {
            Ok(Comment {
                id: row.get(0)?,
                post_id: row.get(1)?,
                author: AuthorRef {
                    id: row.get(2)?,
                    username: row.get(3)?,
                },
                content: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list comments")
    }

    // --- Follow operations ---

    pub fn follow(&self, follower_id: &str, following_id: &str) -> Result<()> {
        if follower_id == following_id {
            return Err(AppError::validation("user", "cannot follow yourself").into());
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO follows (follower_id, following_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![follower_id, following_id, Utc::now()],
        )?;
        Ok(())
    }

    pub fn unfollow(&self, follower_id: &str, following_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
            params![follower_id, following_id],
        )?;
        Ok(())
    }

    pub fn follow_counts(&self, user_id: &str) -> Result<FollowCounts> {
        let count = |sql: &str| -> Result<u64> {
            let n: i64 = self.conn.query_row(sql, [user_id], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(FollowCounts {
            followers: count("SELECT COUNT(*) FROM follows WHERE following_id = ?1")?,
            following: count("SELECT COUNT(*) FROM follows WHERE follower_id = ?1")?,
        })
    }

    // --- Demo data ---

    pub fn seed(&self) -> Result<SeedStats> {
        let mut stats = SeedStats::default();

        let mut seed_user = |username: &str, email: &str, bio: &str, skills: &str| -> Result<User> {
            if let Some(user) = self.get_user_by_username(username)? {
                return Ok(user);
            }
            stats.users += 1;
            let user = self.register_user(username, email)?;
            self.update_profile(&user.id, Some(bio), Some(skills))?;
            Ok(user)
        };
        let alice = seed_user("alice", "alice@example.com", "Fullstack dev", "node,react,postgres")?;
        let bob = seed_user("bob", "bob@example.com", "Backend enjoyer", "go,grpc,k8s")?;

        let post = self.create_post(&alice.id, "Any tips for backend interviews?", Some("interview,backend"))?;
        self.create_feedback(
            &post.id,
            &bob.id,
            FeedbackType::Insight,
            Some("Practice distributed systems and databases."),
        )?;
        stats.posts += 1;

        self.create_job(
            &alice.id,
            &NewJob {
                title: "Senior Node.js Engineer".to_string(),
                company: "TechFlow".to_string(),
                location: Some("Remote".to_string()),
                remote: Some(true),
                min_salary: Some(80000),
                max_salary: Some(120000),
                currency: Some("USD".to_string()),
                skills: Some("node,express,postgres,aws".to_string()),
                description: "Build high-throughput APIs with Node.js/Express and Postgres on AWS."
                    .to_string(),
            },
        )?;
        self.create_job(
            &bob.id,
            &NewJob {
                title: "DevOps Engineer".to_string(),
                company: "CloudBridge".to_string(),
                location: Some("Madrid".to_string()),
                remote: Some(false),
                min_salary: Some(50000),
                max_salary: Some(70000),
                currency: Some("EUR".to_string()),
                skills: Some("k8s,terraform,ci/cd,aws".to_string()),
                description: "Infrastructure as code, pipelines and observability.".to_string(),
            },
        )?;
        stats.jobs += 2;

        Ok(stats)
    }
}

const JOB_COLUMNS: &str = "id, title, company, location, remote, min_salary, max_salary, \
                           currency, skills, description, posted_by_id, created_at";

impl JobStore for Database {
    // Every criterion is pushed down, so the cap applies to matching rows.
    fn candidate_jobs(&self, query: &SearchQuery, limit: usize) -> Result<Vec<JobListing>> {
        let mut sql = format!("SELECT {} FROM jobs WHERE 1=1", JOB_COLUMNS);
        let mut values: Vec<Value> = vec![];

        if !query.free_text.is_empty() {
            values.push(Value::Text(query.free_text.clone()));
            let n = values.len();
            sql.push_str(&format!(
                " AND (contains_ci(title, ?{n}) OR contains_ci(company, ?{n})
                   OR contains_ci(description, ?{n}) OR contains_ci(skills, ?{n}))"
            ));
        }

        if let Some(remote) = query.remote {
            values.push(Value::Integer(remote as i64));
            sql.push_str(&format!(" AND remote = ?{}", values.len()));
        }

        if !query.location.is_empty() {
            values.push(Value::Text(query.location.clone()));
            sql.push_str(&format!(" AND contains_ci(location, ?{})", values.len()));
        }

        if query.min_salary > 0 {
            match i64::try_from(query.min_salary) {
                Ok(threshold) => {
                    values.push(Value::Integer(threshold));
                    let n = values.len();
                    sql.push_str(&format!(" AND (min_salary >= ?{n} OR max_salary >= ?{n})"));
                }
                // no stored salary can reach it
                Err(_) => sql.push_str(" AND 0"),
            }
        }

        values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        sql.push_str(&format!(" ORDER BY created_at DESC, rowid DESC LIMIT ?{}", values.len()));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Self::row_to_job)?;
        let jobs = rows
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to fetch job candidates")?;
        debug!(pushed_params = values.len() - 1, fetched = jobs.len(), "loaded candidates");
        Ok(jobs)
    }
}

impl FeedStore for Database {
    fn recent_posts(&self, limit: usize) -> Result<Vec<PostBundle>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.author_id, p.content, p.tags, p.created_at, u.username
             FROM posts p
             JOIN users u ON p.author_id = u.id
             ORDER BY p.created_at DESC, p.rowid DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map([i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            let post = Self::row_to_post(row)?;
            let username: String = row.get(5)?;
            Ok((post, username))
        })?;
        let posts = rows
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load feed")?;

        let mut kinds_stmt = self
            .conn
            .prepare("SELECT type FROM feedbacks WHERE post_id = ?1")?;
        let mut bundles = Vec::with_capacity(posts.len());
        for (post, username) in posts {
            let feedback_types = kinds_stmt
                .query_map([&post.id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            let comments: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
                [&post.id],
                |row| row.get(0),
            )?;
            bundles.push(PostBundle {
                author: AuthorRef {
                    id: post.author_id.clone(),
                    username,
                },
                post,
                feedback_types,
                comments_count: comments as u64,
            });
        }
        Ok(bundles)
    }
}
