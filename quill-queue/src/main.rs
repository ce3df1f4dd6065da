//! quill-queue - Manage the scheduled publication queue
//!
//! Operator tool for inspecting, canceling, and rescheduling queued posts
//! and threads.

use clap::{Parser, Subcommand};
use libquillcast::{Config, Database, ItemStatus, QuillcastError, Result, ScheduledPost};

#[derive(Parser, Debug)]
#[command(name = "quill-queue")]
#[command(version)]
#[command(about = "Manage the scheduled publication queue")]
#[command(long_about = "\
quill-queue - Manage the scheduled publication queue

DESCRIPTION:
    quill-queue inspects and edits the Quillcast publication queue. Use it
    to list what is waiting, examine a thread after a partial failure,
    cancel or reschedule items, or view queue statistics.

COMMANDS:
    list        List queued posts and threads
    show        Show one post or thread in detail
    cancel      Cancel a scheduled post or thread
    reschedule  Move an item to a different time
    now         Make an item due immediately
    stats       Show queue statistics

USAGE EXAMPLES:
    # List everything still scheduled
    quill-queue list

    # Inspect a thread, including per-member status after a failure
    quill-queue show <THREAD_ID>

    # Cancel a scheduled post
    quill-queue cancel <POST_ID>

    # Reschedule an item (a thread member becomes a standalone post)
    quill-queue reschedule <ID> \"tomorrow 3pm\"

    # Publish on the next sweep
    quill-queue now <ID>

CONFIGURATION:
    Configuration file: ~/.config/quillcast/config.toml
    Override with: QUILLCAST_CONFIG

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Authentication error
    3 - Invalid input (unknown id, bad time format, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List queued posts and threads
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Filter by status: scheduled, published, or failed
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show one post or thread in detail
    Show {
        /// Post or thread ID
        id: String,
    },

    /// Cancel a scheduled post or thread
    Cancel {
        /// Post or thread ID
        id: String,
    },

    /// Reschedule an item to a different time
    Reschedule {
        /// Post or thread ID
        id: String,

        /// New schedule time (e.g., "30m", "tomorrow 3pm", "random:1h-2h")
        time: String,
    },

    /// Make an item due immediately
    Now {
        /// Post or thread ID
        id: String,
    },

    /// Show queue statistics
    Stats {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("error")
            .with_writer(std::io::stderr)
            .init();
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;

    match cli.command {
        Commands::List { format, status } => cmd_list(&db, &format, status.as_deref()).await,
        Commands::Show { id } => cmd_show(&db, &id).await,
        Commands::Cancel { id } => cmd_cancel(&db, &id).await,
        Commands::Reschedule { id, time } => cmd_reschedule(&db, &id, &time).await,
        Commands::Now { id } => cmd_now(&db, &id).await,
        Commands::Stats { format } => cmd_stats(&db, &format).await,
    }
}

fn parse_format(format: &str) -> Result<bool> {
    match format {
        "json" => Ok(true),
        "text" => Ok(false),
        other => Err(QuillcastError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            other
        ))),
    }
}

fn parse_status(status: &str) -> Result<ItemStatus> {
    ItemStatus::parse(status).ok_or_else(|| {
        QuillcastError::InvalidInput(format!(
            "Invalid status '{}'. Must be scheduled, published, or failed",
            status
        ))
    })
}

fn format_time(ts: i64) -> String {
    match chrono::DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => ts.to_string(),
    }
}

fn post_json(post: &ScheduledPost) -> serde_json::Value {
    serde_json::json!({
        "id": post.id,
        "owner_id": post.owner_id,
        "content": post.content,
        "media_refs": post.media_refs,
        "due_at": post.due_at,
        "thread_id": post.thread_id,
        "position": post.position,
        "status": post.status.as_str(),
        "error": post.error,
        "remote_id": post.remote_id,
    })
}

async fn cmd_list(db: &Database, format: &str, status: Option<&str>) -> Result<()> {
    let json = parse_format(format)?;
    let status = status.map(parse_status).transpose()?;

    let posts = db.list_posts(status).await?;
    let threads = db.list_threads(status).await?;

    if json {
        let value = serde_json::json!({
            "posts": posts.iter().map(post_json).collect::<Vec<_>>(),
            "threads": threads.iter().map(|t| serde_json::json!({
                "id": t.id,
                "owner_id": t.owner_id,
                "member_post_ids": t.member_post_ids,
                "due_at": t.due_at,
                "status": t.status.as_str(),
                "error": t.error,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
        return Ok(());
    }

    if posts.is_empty() && threads.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    // Standalone posts only; thread members show under their thread
    for post in posts.iter().filter(|p| p.thread_id.is_none()) {
        println!(
            "post    {}  {}  {}  {}",
            post.id,
            post.status,
            format_time(post.due_at),
            truncate(&post.content, 48)
        );
    }
    for thread in &threads {
        println!(
            "thread  {}  {}  {}  {} member(s)",
            thread.id,
            thread.status,
            format_time(thread.due_at),
            thread.member_post_ids.len()
        );
    }

    Ok(())
}

async fn cmd_show(db: &Database, id: &str) -> Result<()> {
    if let Some(post) = db.get_post(id).await? {
        println!("Post {}", post.id);
        println!("  owner:    {}", post.owner_id);
        println!("  status:   {}", post.status);
        println!("  due:      {}", format_time(post.due_at));
        if let Some(thread_id) = &post.thread_id {
            println!("  thread:   {} (position {})", thread_id, post.position.unwrap_or(0));
        }
        if !post.media_refs.is_empty() {
            println!("  media:    {}", post.media_refs.join(", "));
        }
        if let Some(remote_id) = &post.remote_id {
            println!("  remote:   {}", remote_id);
        }
        if let Some(error) = &post.error {
            println!("  error:    {}", error);
        }
        println!("  content:  {}", post.content);
        return Ok(());
    }

    if let Some(thread) = db.get_thread(id).await? {
        println!("Thread {}", thread.id);
        println!("  owner:    {}", thread.owner_id);
        println!("  status:   {}", thread.status);
        println!("  due:      {}", format_time(thread.due_at));
        if let Some(error) = &thread.error {
            println!("  error:    {}", error);
        }
        println!("  members:");
        for member in db.thread_members(&thread.id).await? {
            let remote = member.remote_id.as_deref().unwrap_or("-");
            println!(
                "    [{}] {}  {}  remote={}  {}",
                member.position.unwrap_or(0),
                member.id,
                member.status,
                remote,
                truncate(&member.content, 40)
            );
        }
        return Ok(());
    }

    Err(QuillcastError::InvalidInput(format!("No post or thread with id {}", id)))
}

async fn cmd_cancel(db: &Database, id: &str) -> Result<()> {
    if db.get_post(id).await?.is_some() {
        if db.delete_post(id).await? {
            println!("canceled: {}", id);
            return Ok(());
        }
        return Err(QuillcastError::InvalidInput(format!(
            "Post {} is no longer scheduled and cannot be canceled",
            id
        )));
    }

    if db.get_thread(id).await?.is_some() {
        let (thread_deleted, members_deleted) = db.delete_thread(id).await?;
        if thread_deleted {
            println!("canceled: {} ({} member(s) removed)", id, members_deleted);
            return Ok(());
        }
        return Err(QuillcastError::InvalidInput(format!(
            "Thread {} is already published and cannot be canceled",
            id
        )));
    }

    Err(QuillcastError::InvalidInput(format!("No post or thread with id {}", id)))
}

async fn cmd_reschedule(db: &Database, id: &str, time: &str) -> Result<()> {
    let due_at = libquillcast::scheduling::parse_schedule(time)?.timestamp();
    reschedule_to(db, id, due_at).await
}

async fn cmd_now(db: &Database, id: &str) -> Result<()> {
    reschedule_to(db, id, chrono::Utc::now().timestamp()).await
}

async fn reschedule_to(db: &Database, id: &str, due_at: i64) -> Result<()> {
    if let Some(post) = db.get_post(id).await? {
        if db.reschedule_post(id, due_at).await? {
            if post.thread_id.is_some() {
                println!("rescheduled: {} (detached from thread, now standalone)", id);
            } else {
                println!("rescheduled: {}", id);
            }
            println!("due: {}", format_time(due_at));
            return Ok(());
        }
        return Err(QuillcastError::InvalidInput(format!(
            "Post {} is no longer scheduled and cannot be rescheduled",
            id
        )));
    }

    if db.get_thread(id).await?.is_some() {
        if db.reschedule_thread(id, due_at).await? {
            println!("rescheduled: {}", id);
            println!("due: {}", format_time(due_at));
            return Ok(());
        }
        return Err(QuillcastError::InvalidInput(format!(
            "Thread {} is no longer scheduled and cannot be rescheduled",
            id
        )));
    }

    Err(QuillcastError::InvalidInput(format!("No post or thread with id {}", id)))
}

async fn cmd_stats(db: &Database, format: &str) -> Result<()> {
    let json = parse_format(format)?;
    let stats = db.queue_stats().await?;

    if json {
        let value = serde_json::json!({
            "posts": {
                "scheduled": stats.posts_scheduled,
                "published": stats.posts_published,
                "failed": stats.posts_failed,
            },
            "threads": {
                "scheduled": stats.threads_scheduled,
                "published": stats.threads_published,
                "failed": stats.threads_failed,
            },
        });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
        return Ok(());
    }

    println!("posts:    {} scheduled, {} published, {} failed",
        stats.posts_scheduled, stats.posts_published, stats.posts_failed);
    println!("threads:  {} scheduled, {} published, {} failed",
        stats.threads_scheduled, stats.threads_published, stats.threads_failed);

    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let prefix: String = s.chars().take(max_chars).collect();
        format!("{}...", prefix)
    }
}
