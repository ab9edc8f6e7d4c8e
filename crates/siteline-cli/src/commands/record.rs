use anyhow::Result;
use colored::Colorize;
use siteline_application::Siteline;
use siteline_core::record::{PageId, record_data};

/// What happened to the immediate relay of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relay {
    /// External submission is off; the record only joined the backlog
    Queued,
    Delivered,
    Failed,
}

/// Records a submission and waits for its own relay, if any.
pub async fn relay_submission(
    siteline: &Siteline,
    page: PageId,
    fields: Vec<(String, String)>,
) -> Result<Relay> {
    let Some(relay) = siteline.record_submission(page, record_data(fields)) else {
        return Ok(Relay::Queued);
    };
    Ok(if relay.await? {
        Relay::Delivered
    } else {
        Relay::Failed
    })
}

pub async fn submit(
    siteline: &Siteline,
    page: PageId,
    fields: Vec<(String, String)>,
) -> Result<()> {
    let relay = relay_submission(siteline, page.clone(), fields).await?;

    println!("{}", format!("Submission recorded for page '{}'", page).green());
    match relay {
        Relay::Delivered => println!("{}", "Delivered to the collector".green()),
        Relay::Failed => println!(
            "{}",
            "Immediate delivery failed; the submission stays queued for the next batch".yellow()
        ),
        Relay::Queued => {}
    }
    println!(
        "{}",
        format!("Backlog: {}", siteline.status().backlog).bright_black()
    );
    Ok(())
}

pub async fn track(
    siteline: &Siteline,
    category: &str,
    event_type: &str,
    fields: Vec<(String, String)>,
) -> Result<()> {
    if let Some(forward) = siteline.track(category, event_type, record_data(fields)) {
        forward.await?;
    }
    println!(
        "{}",
        format!("Recorded '{}' in '{}'", event_type, category).green()
    );
    Ok(())
}
