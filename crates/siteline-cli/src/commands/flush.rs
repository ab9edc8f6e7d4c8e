use anyhow::{Result, bail};
use colored::Colorize;
use siteline_application::{FlushOutcome, Siteline};

pub async fn run(siteline: &Siteline) -> Result<()> {
    match siteline.flush_now().await {
        FlushOutcome::Sent { batch_id, count } => {
            println!(
                "{}",
                format!("Delivered {} submissions in batch {}", count, batch_id).green()
            );
        }
        FlushOutcome::Empty => println!("{}", "Nothing to send".bright_black()),
        FlushOutcome::Disabled => {
            println!(
                "{}",
                "Batch delivery is disabled (external_submission_enabled / batch_url)".yellow()
            );
        }
        FlushOutcome::Failed {
            batch_id,
            count,
            error,
        } => {
            bail!(
                "Batch {} ({} submissions) failed: {}; the backlog is kept",
                batch_id,
                count,
                error
            );
        }
        other => println!("{}", format!("{:?}", other).yellow()),
    }
    Ok(())
}
