use anyhow::Result;
use colored::Colorize;
use siteline_application::Siteline;
use std::time::Duration;

/// Runs a session with background batching until Ctrl-C or the deadline.
pub async fn run(siteline: &Siteline, duration_secs: Option<u64>) -> Result<()> {
    siteline.init();
    let session_id = siteline.sessions().session_id();
    println!("{}", format!("Session {} started", session_id).green());
    println!("{}", "Press Ctrl-C to stop.".bright_black());

    match duration_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
            }
        }
        None => tokio::signal::ctrl_c().await?,
    }

    if let Some(session) = siteline.end_session() {
        println!(
            "{}",
            format!(
                "Session {} ended after {} ms",
                session.id,
                session.duration_ms.unwrap_or_default()
            )
            .green()
        );
    }
    siteline.teardown();
    println!(
        "{}",
        format!("Backlog left: {}", siteline.status().backlog).bright_black()
    );
    Ok(())
}
