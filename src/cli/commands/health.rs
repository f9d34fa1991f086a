//! Health command - probe every configured service.

use crate::cli::Output;
use crate::config::Settings;
use crate::services::health_check;
use anyhow::{bail, Result};

/// Run the health command.
pub async fn run_health(strict: bool, settings: Settings) -> Result<()> {
    Output::header("Coco Health");
    println!();

    let report = health_check(&settings, strict).await?;
    for service in &report {
        Output::health(service);
    }
    println!();

    let failed = report.iter().filter(|s| !s.is_healthy()).count();
    if failed > 0 {
        Output::error(&format!("{} of {} service(s) unreachable.", failed, report.len()));
        bail!("health check failed");
    }

    Output::success("All services reachable.");
    Ok(())
}
