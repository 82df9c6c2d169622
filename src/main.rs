mod config;
mod db;
mod error;
mod feed;
mod models;
mod search;
mod skills;
mod validate;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use db::Database;
use error::AppError;
use models::{AppStatus, FeedbackType, JobListing, NewJob, UnknownVariant, User};
use search::SearchQuery;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "workthread")]
#[command(about = "Job board with a social feed - post updates, react, follow, and search jobs")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true, env = "WORKTHREAD_DB")]
    db: Option<PathBuf>,

    /// Username to act as
    #[arg(long = "as", global = true, env = "WORKTHREAD_USER")]
    acting_user: Option<String>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable logging
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Maximum job candidates considered per search
    #[arg(long, global = true, env = "WORKTHREAD_SEARCH_CAP")]
    search_cap: Option<usize>,

    /// Maximum posts returned by the feed
    #[arg(long, global = true, env = "WORKTHREAD_FEED_CAP")]
    feed_cap: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Check that the database answers
    Health,

    /// Insert demo users, a post and two jobs
    Seed,

    /// Manage users and profiles
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Post, search and save jobs
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },

    /// Apply to jobs and review applications
    Apply {
        #[command(subcommand)]
        command: ApplyCommands,
    },

    /// Write posts and read the feed
    Post {
        #[command(subcommand)]
        command: PostCommands,
    },

    /// React to posts
    Feedback {
        #[command(subcommand)]
        command: FeedbackCommands,
    },

    /// Comment on posts
    Comment {
        #[command(subcommand)]
        command: CommentCommands,
    },

    /// Follow other users
    Follow {
        #[command(subcommand)]
        command: FollowCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create an account
    Register { username: String, email: String },

    /// Show the acting user's profile
    Me,

    /// Update the acting user's bio and skills
    Update {
        #[arg(long)]
        bio: Option<String>,

        /// Comma-separated skills
        #[arg(long)]
        skills: Option<String>,
    },

    /// Find users by name, skills or bio
    Search { q: String },
}

#[derive(Subcommand)]
enum JobCommands {
    /// Post a job listing
    Post {
        #[arg(long)]
        title: String,

        #[arg(long)]
        company: String,

        #[arg(long)]
        description: String,

        /// Defaults to "Remote"
        #[arg(long)]
        location: Option<String>,

        /// true or false (defaults to true)
        #[arg(long)]
        remote: Option<bool>,

        #[arg(long, allow_negative_numbers = true)]
        min_salary: Option<i64>,

        #[arg(long, allow_negative_numbers = true)]
        max_salary: Option<i64>,

        /// Defaults to USD
        #[arg(long)]
        currency: Option<String>,

        /// Comma-separated skills
        #[arg(long)]
        skills: Option<String>,
    },

    /// Show job details
    Show { id: String },

    /// Search jobs, ranked by matching skills
    Search {
        /// Free text matched against title, company, description and skills
        #[arg(long)]
        q: Option<String>,

        /// true or false; anything else is ignored
        #[arg(long)]
        remote: Option<String>,

        /// Location substring
        #[arg(long)]
        location: Option<String>,

        /// Minimum salary; non-numeric values are ignored
        #[arg(long, allow_hyphen_values = true)]
        min_salary: Option<String>,

        /// Comma-separated skills used for ranking
        #[arg(long)]
        skills: Option<String>,
    },

    /// Bookmark a job
    Save { id: String },

    /// Remove a bookmark
    Unsave { id: String },
}

#[derive(Subcommand)]
enum ApplyCommands {
    /// Apply to a job
    Send {
        job_id: String,

        #[arg(short, long)]
        message: Option<String>,
    },

    /// List the acting user's applications
    Mine,

    /// Change an application's status (job poster only)
    Status {
        app_id: String,

        /// PENDING, REVIEWING, ACCEPTED or REJECTED
        #[arg(value_parser = parse_app_status)]
        status: AppStatus,
    },
}

#[derive(Subcommand)]
enum PostCommands {
    /// Publish a post
    Create {
        content: String,

        /// Comma-separated tags
        #[arg(short, long)]
        tags: Option<String>,
    },

    /// Show the most recent posts with feedback counts
    Feed,

    /// List a user's posts
    By { username: String },
}

#[derive(Subcommand)]
enum FeedbackCommands {
    /// React to a post
    Give {
        post_id: String,

        /// LIKE, INSIGHT, QUESTION, HIRE_ME or REFER
        #[arg(value_parser = parse_feedback_type)]
        kind: FeedbackType,

        #[arg(short, long)]
        content: Option<String>,
    },

    /// List feedback on a post
    List { post_id: String },
}

#[derive(Subcommand)]
enum CommentCommands {
    /// Comment on a post
    Add { post_id: String, content: String },

    /// List comments on a post, oldest first
    List { post_id: String },
}

#[derive(Subcommand)]
enum FollowCommands {
    /// Follow a user
    Add { username: String },

    /// Stop following a user
    Remove { username: String },

    /// Show follower and following counts (defaults to the acting user)
    Counts { username: Option<String> },
}

fn normalize_variant(s: &str) -> String {
    s.trim().to_uppercase().replace('-', "_")
}

fn parse_feedback_type(s: &str) -> Result<FeedbackType, UnknownVariant> {
    normalize_variant(s).parse()
}

fn parse_app_status(s: &str) -> Result<AppStatus, UnknownVariant> {
    normalize_variant(s).parse()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);
    let json = cli.json;

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<AppError>()
                .map(AppError::exit_code)
                .unwrap_or(1);
            if json {
                let error_json = serde_json::json!({ "error": format!("{:#}", e) });
                println!("{}", serde_json::to_string(&error_json).unwrap_or_default());
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::from(code)
        }
    }
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info,workthread=debug",
        _ => "debug,workthread=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::new(cli.db, cli.acting_user, cli.json)
        .with_caps(cli.search_cap, cli.feed_cap);
    let db = Database::open(&config.db_path)?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Health => {
            db.health()?;
            let now = chrono::Utc::now();
            if config.json {
                print_json(&serde_json::json!({ "ok": true, "time": now }))?;
            } else {
                println!("ok ({})", now.to_rfc3339());
            }
        }

        Commands::Seed => {
            db.init()?;
            let stats = db.seed()?;
            println!(
                "Seeded {} new user(s), {} post(s), {} job(s).",
                stats.users, stats.posts, stats.jobs
            );
        }

        Commands::User { command } => {
            db.ensure_initialized()?;
            run_user(&db, &config, command)?;
        }

        Commands::Job { command } => {
            db.ensure_initialized()?;
            run_job(&db, &config, command)?;
        }

        Commands::Apply { command } => {
            db.ensure_initialized()?;
            run_apply(&db, &config, command)?;
        }

        Commands::Post { command } => {
            db.ensure_initialized()?;
            run_post(&db, &config, command)?;
        }

        Commands::Feedback { command } => {
            db.ensure_initialized()?;
            run_feedback(&db, &config, command)?;
        }

        Commands::Comment { command } => {
            db.ensure_initialized()?;
            run_comment(&db, &config, command)?;
        }

        Commands::Follow { command } => {
            db.ensure_initialized()?;
            run_follow(&db, &config, command)?;
        }
    }

    Ok(())
}

fn acting_user(db: &Database, config: &Config) -> Result<User> {
    let username = config.require_user()?;
    db.require_user(username)
}

fn run_user(db: &Database, config: &Config, command: UserCommands) -> Result<()> {
    match command {
        UserCommands::Register { username, email } => {
            let user = db.register_user(&username, &email)?;
            if config.json {
                print_json(&user)?;
            } else {
                println!("Registered '{}' (ID: {})", user.username, user.id);
            }
        }

        UserCommands::Me => {
            let me = acting_user(db, config)?;
            if config.json {
                print_json(&me)?;
            } else {
                println!("{} <{}>", me.username, me.email);
                if !me.bio.is_empty() {
                    println!("Bio: {}", me.bio);
                }
                if !me.skills.is_empty() {
                    println!("Skills: {}", me.skills);
                }
                println!("Joined: {}", me.created_at.format("%Y-%m-%d"));
            }
        }

        UserCommands::Update { bio, skills } => {
            let me = acting_user(db, config)?;
            db.update_profile(&me.id, bio.as_deref(), skills.as_deref())?;
            println!("Profile updated.");
        }

        UserCommands::Search { q } => {
            let users = db.search_users(&q)?;
            if config.json {
                print_json(&users)?;
            } else if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<20} {:<30} {:<30}", "USERNAME", "SKILLS", "BIO");
                println!("{}", "-".repeat(80));
                for user in users {
                    println!(
                        "{:<20} {:<30} {:<30}",
                        truncate(&user.username, 18),
                        truncate(&user.skills, 28),
                        truncate(&user.bio, 28)
                    );
                }
            }
        }
    }
    Ok(())
}

fn run_job(db: &Database, config: &Config, command: JobCommands) -> Result<()> {
    match command {
        JobCommands::Post {
            title,
            company,
            description,
            location,
            remote,
            min_salary,
            max_salary,
            currency,
            skills,
        } => {
            let me = acting_user(db, config)?;
            let job = db.create_job(
                &me.id,
                &NewJob {
                    title,
                    company,
                    location,
                    remote,
                    min_salary,
                    max_salary,
                    currency,
                    skills,
                    description,
                },
            )?;
            if config.json {
                print_json(&job)?;
            } else {
                println!("Posted job {}", job.id);
            }
        }

        JobCommands::Show { id } => {
            let job = db
                .get_job(&id)?
                .ok_or_else(|| AppError::NotFound(format!("Job {}", id)))?;
            if config.json {
                print_json(&job)?;
            } else {
                print_job(&job);
            }
        }

        JobCommands::Search {
            q,
            remote,
            location,
            min_salary,
            skills,
        } => {
            let query = SearchQuery::from_params(
                q.as_deref(),
                remote.as_deref(),
                location.as_deref(),
                min_salary.as_deref(),
                skills.as_deref(),
            );
            let ranked = search::search_jobs(db, &query, config.search_cap)
                .context("Job search failed")?;

            if config.json {
                print_json(&ranked)?;
            } else if ranked.is_empty() {
                println!("No jobs found.");
            } else {
                if !query.skills.is_empty() {
                    println!("Ranking by skills: {}\n", crate::skills::join_skills(&query.skills));
                }
                println!(
                    "{:<5} {:<36} {:<26} {:<16} {:<10} {:>14}",
                    "SCORE", "ID", "TITLE", "COMPANY", "WHERE", "PAY RANGE"
                );
                println!("{}", "-".repeat(112));
                for r in ranked {
                    let place = if r.job.remote { "Remote".to_string() } else { r.job.location.clone() };
                    println!(
                        "{:<5} {:<36} {:<26} {:<16} {:<10} {:>14}",
                        r.score,
                        r.job.id,
                        truncate(&r.job.title, 24),
                        truncate(&r.job.company, 14),
                        truncate(&place, 8),
                        format_pay_short(&r.job)
                    );
                }
            }
        }

        JobCommands::Save { id } => {
            let me = acting_user(db, config)?;
            db.save_job(&id, &me.id)?;
            println!("Saved job {}.", id);
        }

        JobCommands::Unsave { id } => {
            let me = acting_user(db, config)?;
            db.unsave_job(&id, &me.id)?;
            println!("Removed job {} from saved.", id);
        }
    }
    Ok(())
}

fn run_apply(db: &Database, config: &Config, command: ApplyCommands) -> Result<()> {
    match command {
        ApplyCommands::Send { job_id, message } => {
            let me = acting_user(db, config)?;
            let app = db.apply(&job_id, &me.id, message.as_deref())?;
            if config.json {
                print_json(&app)?;
            } else {
                println!("Applied to '{}' (application {})", app.job_title, app.id);
            }
        }

        ApplyCommands::Mine => {
            let me = acting_user(db, config)?;
            let apps = db.applications_for_user(&me.id)?;
            if config.json {
                print_json(&apps)?;
            } else if apps.is_empty() {
                println!("No applications yet.");
            } else {
                println!("{:<36} {:<10} {:<30} {:<12}", "ID", "STATUS", "JOB", "APPLIED");
                println!("{}", "-".repeat(90));
                for app in apps {
                    println!(
                        "{:<36} {:<10} {:<30} {:<12}",
                        app.id,
                        app.status,
                        truncate(&app.job_title, 28),
                        app.created_at.format("%Y-%m-%d")
                    );
                }
            }
        }

        ApplyCommands::Status { app_id, status } => {
            let me = acting_user(db, config)?;
            let app = db.set_application_status(&app_id, &me.id, status)?;
            if config.json {
                print_json(&app)?;
            } else {
                println!("Application {} is now {}.", app.id, app.status);
            }
        }
    }
    Ok(())
}

fn run_post(db: &Database, config: &Config, command: PostCommands) -> Result<()> {
    match command {
        PostCommands::Create { content, tags } => {
            let me = acting_user(db, config)?;
            let post = db.create_post(&me.id, &content, tags.as_deref())?;
            if config.json {
                print_json(&post)?;
            } else {
                println!("Posted {}", post.id);
            }
        }

        PostCommands::Feed => {
            acting_user(db, config)?;
            let summaries = feed::load_feed(db, config.feed_cap)?;
            if config.json {
                print_json(&summaries)?;
            } else if summaries.is_empty() {
                println!("The feed is empty.");
            } else {
                for s in summaries {
                    println!(
                        "{} · @{} · {}",
                        s.id,
                        s.author.username,
                        s.created_at.format("%Y-%m-%d %H:%M")
                    );
                    for line in textwrap::wrap(&s.content, 76) {
                        println!("  {}", line);
                    }
                    if !s.tags.is_empty() {
                        println!("  tags: {}", s.tags);
                    }
                    let reactions = if s.feedback_counts.total() == 0 {
                        "no feedback yet".to_string()
                    } else {
                        FeedbackType::ALL
                            .iter()
                            .map(|k| format!("{} {}", k, s.feedback_counts.get(*k)))
                            .collect::<Vec<_>>()
                            .join("  ")
                    };
                    println!("  {} · {} comment(s)\n", reactions, s.comments_count);
                }
            }
        }

        PostCommands::By { username } => {
            let author = db.require_user(&username)?;
            let posts = db.posts_by(&author.id)?;
            if config.json {
                print_json(&posts)?;
            } else if posts.is_empty() {
                println!("@{} has not posted yet.", author.username);
            } else {
                for post in posts {
                    println!(
                        "{:<36} {:<17} {}",
                        post.id,
                        post.created_at.format("%Y-%m-%d %H:%M"),
                        truncate(&post.content, 60)
                    );
                }
            }
        }
    }
    Ok(())
}

fn run_feedback(db: &Database, config: &Config, command: FeedbackCommands) -> Result<()> {
    match command {
        FeedbackCommands::Give {
            post_id,
            kind,
            content,
        } => {
            let me = acting_user(db, config)?;
            let fb = db.create_feedback(&post_id, &me.id, kind, content.as_deref())?;
            if config.json {
                print_json(&fb)?;
            } else {
                println!("Recorded {} on post {}.", fb.kind, fb.post_id);
            }
        }

        FeedbackCommands::List { post_id } => {
            let list = db.feedback_for(&post_id)?;
            if config.json {
                print_json(&list)?;
            } else if list.is_empty() {
                println!("No feedback on post {}.", post_id);
            } else {
                for fb in list {
                    println!(
                        "{:<9} {:<17} {}",
                        fb.kind,
                        fb.created_at.format("%Y-%m-%d %H:%M"),
                        truncate(&fb.content, 60)
                    );
                }
            }
        }
    }
    Ok(())
}

fn run_comment(db: &Database, config: &Config, command: CommentCommands) -> Result<()> {
    match command {
        CommentCommands::Add { post_id, content } => {
            let me = acting_user(db, config)?;
            let comment = db.create_comment(&post_id, &me, &content)?;
            if config.json {
                print_json(&comment)?;
            } else {
                println!("Commented on post {}.", comment.post_id);
            }
        }

        CommentCommands::List { post_id } => {
            let comments = db.comments_for(&post_id)?;
            if config.json {
                print_json(&comments)?;
            } else if comments.is_empty() {
                println!("No comments on post {}.", post_id);
            } else {
                for c in comments {
                    println!("@{} ({}):", c.author.username, c.created_at.format("%Y-%m-%d %H:%M"));
                    for line in textwrap::wrap(&c.content, 76) {
                        println!("  {}", line);
                    }
                }
            }
        }
    }
    Ok(())
}

fn run_follow(db: &Database, config: &Config, command: FollowCommands) -> Result<()> {
    match command {
        FollowCommands::Add { username } => {
            let me = acting_user(db, config)?;
            let target = db.require_user(&username)?;
            db.follow(&me.id, &target.id)?;
            println!("Following @{}.", target.username);
        }

        FollowCommands::Remove { username } => {
            let me = acting_user(db, config)?;
            let target = db.require_user(&username)?;
            db.unfollow(&me.id, &target.id)?;
            println!("No longer following @{}.", target.username);
        }

        FollowCommands::Counts { username } => {
            let user = match username {
                Some(name) => db.require_user(&name)?,
                None => acting_user(db, config)?,
            };
            let counts = db.follow_counts(&user.id)?;
            if config.json {
                print_json(&counts)?;
            } else {
                println!(
                    "@{}: {} follower(s), following {}",
                    user.username, counts.followers, counts.following
                );
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_job(job: &JobListing) {
    println!("Job {}", job.id);
    println!("Title: {}", job.title);
    println!("Company: {}", job.company);
    println!(
        "Location: {}{}",
        job.location,
        if job.remote { " (remote)" } else { " (on-site)" }
    );
    if let Some(pay) = format_pay(job) {
        println!("Pay: {}", pay);
    }
    if !job.skills.is_empty() {
        println!("Skills: {}", job.skills);
    }
    println!("Posted: {}", job.created_at.format("%Y-%m-%d %H:%M"));
    println!("\n--- Description ---");
    for line in textwrap::wrap(&job.description, 80) {
        println!("{}", line);
    }
}

fn format_pay(job: &JobListing) -> Option<String> {
    let cur = &job.currency;
    match (job.min_salary, job.max_salary) {
        (Some(min), Some(max)) => Some(format!("{} - {} {}", min, max, cur)),
        (Some(min), None) => Some(format!("{}+ {}", min, cur)),
        (None, Some(max)) => Some(format!("up to {} {}", max, cur)),
        (None, None) => None,
    }
}

fn format_pay_short(job: &JobListing) -> String {
    match (job.min_salary, job.max_salary) {
        (Some(min), Some(max)) => format!("{}k-{}k {}", min / 1000, max / 1000, job.currency),
        (Some(min), None) => format!("{}k+ {}", min / 1000, job.currency),
        (None, Some(max)) => format!("<{}k {}", max / 1000, job.currency),
        (None, None) => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
