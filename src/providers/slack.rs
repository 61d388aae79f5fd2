//! Best-effort Slack notification when a run ends

use crate::core::state::RunOutcome;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Message text posted for a finished run
pub fn run_message(tag: &str, outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Success => format!("✅ Release run completed successfully. Released {}", tag),
        failed => format!("❌ Release run for {} failed. {}", tag, failed),
    }
}

/// Post the run result to an incoming webhook
///
/// Never fails: delivery problems are logged and swallowed.
pub async fn notify_run_complete(webhook_url: &str, tag: &str, outcome: &RunOutcome) {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!("Slack notification skipped: {}", e);
            return;
        }
    };

    let payload = json!({ "text": run_message(tag, outcome) });
    match client.post(webhook_url).json(&payload).send().await {
        Ok(response) if response.status().is_success() => {
            debug!("Slack notification delivered");
        }
        Ok(response) => warn!("Slack webhook returned HTTP {}", response.status()),
        Err(e) => warn!("Slack notification failed: {}", e),
    }
}
