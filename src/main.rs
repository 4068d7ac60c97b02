//! Headless GrowthFarm runner.
//!
//! Stands in for the desktop shell's timer callbacks: seeds the data
//! directory, drafts intro emails for new leads into the filesystem
//! outbox, runs one campaign sweep, and prints the day's activity.
//!
//! Usage: `growthfarm [init|draft|sweep|daily [--json]|tick]`
//! (no argument means `tick`, which is draft + sweep + daily).

use std::process::ExitCode;

use chrono::Local;

use growthfarm::analytics;
use growthfarm::campaigns::engine;
use growthfarm::outreach::{self, OutboxDrafter};
use growthfarm::paths::{ensure_app_files, AppPaths};

fn run(command: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let paths = AppPaths::resolve();
    ensure_app_files(&paths)?;
    let now = Local::now().naive_local();

    if matches!(command, "init") {
        println!("Data directory ready: {}", paths.dir().display());
        return Ok(());
    }

    if matches!(command, "draft" | "tick") {
        let mut drafter = OutboxDrafter::new(&paths);
        let report = outreach::draft_new_leads(&paths, &mut drafter)?;
        println!(
            "Drafted {} intro(s) ({} already seen, {} invalid, {} failed)",
            report.drafted, report.skipped_seen, report.skipped_invalid, report.failed
        );
    }

    if matches!(command, "sweep" | "tick") {
        let mut drafter = OutboxDrafter::new(&paths);
        let report = engine::sweep(&paths, &mut drafter, now)?;
        println!(
            "Sweep: {} follow-up(s) drafted, {} replied, {} completed ({} diverted to dialer)",
            report.drafted, report.removed_replied, report.completed, report.diverted
        );
    }

    if matches!(command, "daily" | "tick") {
        let activity = analytics::compute_daily_activity(&paths, now.date())?;
        if json {
            println!("{}", serde_json::to_string_pretty(&activity)?);
        } else {
            println!(
                "Today: {} call(s) ({} green / {} gray / {} red), {} email(s) sent",
                activity.calls_total,
                activity.calls_green,
                activity.calls_gray,
                activity.calls_red,
                activity.emails_sent
            );
            println!(
                "       {} new warm, {} new customer(s), {} order(s) totaling ${:.2}",
                activity.new_warm, activity.new_customers, activity.orders, activity.sales
            );
            match activity.last_sync {
                Some(t) => println!("       last mail sync {}", t.format("%Y-%m-%d %H:%M:%S")),
                None => println!("       mail never synced"),
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let json = args.iter().any(|a| a == "--json");
    let command = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map(String::as_str)
        .unwrap_or("tick");

    if !matches!(command, "init" | "draft" | "sweep" | "daily" | "tick") {
        eprintln!("unknown command: {command}");
        eprintln!("usage: growthfarm [init|draft|sweep|daily [--json]|tick]");
        return ExitCode::FAILURE;
    }

    match run(command, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
