// Output formatting and display for CLI

use crate::metrics::HistorySummary;
use crate::process::{HealthState, LifecycleState, ServiceStatus};
use chrono::{DateTime, Local};
use colored::*;
use std::time::Duration;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

/// Print an error message to stderr
pub fn print_error(error: &str) {
    eprintln!("{} {}", "✗ Error:".red().bold(), error);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a success message
pub fn print_success_msg(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a formatted table of service statuses
pub fn print_status_table(statuses: &[ServiceStatus]) {
    if statuses.is_empty() {
        println!("{}", "No services registered".yellow());
        return;
    }

    #[derive(Tabled)]
    struct ServiceRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Status")]
        state: String,
        #[tabled(rename = "Health")]
        health: String,
        #[tabled(rename = "PID")]
        pid: String,
        #[tabled(rename = "Port")]
        port: u16,
        #[tabled(rename = "Uptime")]
        uptime: String,
        #[tabled(rename = "Restarts")]
        restarts: u32,
        #[tabled(rename = "Auto")]
        auto_restart: String,
    }

    let now = Local::now();
    let rows: Vec<ServiceRow> = statuses
        .iter()
        .map(|s| ServiceRow {
            name: truncate(&s.name, 20),
            state: format_state_colored(s.state),
            health: format_health_colored(s.health),
            pid: s
                .pid
                .map(|pid| pid.to_string())
                .unwrap_or_else(|| "-".to_string()),
            port: s.port,
            uptime: s
                .started_at
                .map(|at| format_duration(&uptime(at, now)))
                .unwrap_or_else(|| "-".to_string()),
            restarts: s.restarts,
            auto_restart: if s.auto_restart { "yes" } else { "no" }.to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    println!("\n{}\n", table);

    let running = statuses.iter().filter(|s| s.is_running()).count();
    println!(
        "{}",
        format!("Total: {} service(s), {} running", statuses.len(), running)
            .dimmed()
            .italic()
    );
}

/// Print the newest host snapshot
pub fn print_metrics(summary: &HistorySummary) {
    let current = &summary.current;

    println!("\n{}", "Host Metrics".bold().underline());
    println!();
    println!(
        "  {:<15} {}",
        "Sampled:".bold(),
        current.timestamp.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  {:<15} {}",
        "CPU:".bold(),
        format_percent(current.cpu_percent as f64)
    );
    println!(
        "  {:<15} {} ({:.2} / {:.2} GiB)",
        "Memory:".bold(),
        format_percent(current.memory_percent),
        current.memory_used_gb,
        current.memory_total_gb
    );
    println!(
        "  {:<15} {} ({:.2} / {:.2} GiB)",
        "Disk:".bold(),
        format_percent(current.disk_percent),
        current.disk_used_gb,
        current.disk_total_gb
    );
    println!(
        "  {:<15} {:.2} MiB sent, {:.2} MiB received",
        "Network:".bold(),
        current.network_sent_mb,
        current.network_recv_mb
    );
    println!(
        "  {:<15} {}",
        "Services:".bold(),
        current.running_services
    );
    println!(
        "{}",
        format!(
            "  {} snapshot(s) retained, sampling {}",
            summary.history_count,
            if summary.monitoring_active { "active" } else { "stopped" }
        )
        .dimmed()
    );
    println!();
}

/// Format a lifecycle state with color coding
fn format_state_colored(state: LifecycleState) -> String {
    match state {
        LifecycleState::Running => state.to_string().green().to_string(),
        LifecycleState::Stopped => state.to_string().bright_black().to_string(),
    }
}

/// Format a health state with color coding
fn format_health_colored(health: HealthState) -> String {
    match health {
        HealthState::Healthy => health.to_string().green().to_string(),
        HealthState::Unhealthy => health.to_string().red().bold().to_string(),
        HealthState::Unknown => health.to_string().yellow().to_string(),
        HealthState::Down => health.to_string().bright_black().to_string(),
    }
}

/// Color a utilization figure by how close it is to saturation
fn format_percent(percent: f64) -> String {
    let text = format!("{:.1}%", percent);
    if percent >= 90.0 {
        text.red().bold().to_string()
    } else if percent >= 70.0 {
        text.yellow().to_string()
    } else {
        text.green().to_string()
    }
}

fn uptime(started_at: DateTime<Local>, now: DateTime<Local>) -> Duration {
    (now - started_at).to_std().unwrap_or_default()
}

/// Format a duration in human-readable format
fn format_duration(duration: &Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        let mins = secs / 60;
        let secs = secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    } else if secs < 86400 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    } else {
        let days = secs / 86400;
        let hours = (secs % 86400) / 3600;
        if hours > 0 {
            format!("{}d {}h", days, hours)
        } else {
            format!("{}d", days)
        }
    }
}

/// Truncate a string to a maximum number of characters
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
