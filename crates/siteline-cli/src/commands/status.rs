use anyhow::Result;
use chrono::{DateTime, SecondsFormat};
use colored::Colorize;
use siteline_application::Siteline;

pub fn show(siteline: &Siteline, json: bool) -> Result<()> {
    let status = siteline.status();
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "=== Siteline ===".bright_magenta().bold());
    println!("Site:        {}", siteline.config().site);
    println!("Backlog:     {}", status.backlog.to_string().bold());
    let watermark = status
        .last_batch_sent_at
        .and_then(DateTime::from_timestamp_millis)
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "never".to_string());
    println!("Last batch:  {}", watermark);
    if status.batch_due {
        println!("Batch due:   {}", "yes".yellow());
    } else {
        println!("Batch due:   {}", "no".green());
    }
    match &status.session {
        Some(session) => println!("Session:     {} ({})", session.id, status.session_state),
        None => println!("Session:     {}", status.session_state),
    }
    println!("Sessions:    {} completed", status.completed_sessions);

    if status.categories.is_empty() {
        println!("{}", "No analytics recorded".bright_black());
    } else {
        println!("{}", "Analytics:".bright_cyan());
        for (category, count) in &status.categories {
            println!("  {:<14} {}", category, count);
        }
    }
    Ok(())
}
