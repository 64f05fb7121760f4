use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tracing::{debug, error, trace, warn};

use s3clean_rs::config::Config;
use s3clean_rs::types::{BucketTarget, DeleteOutcome};
use s3clean_rs::{BulkDeleter, CLIArgs, DeletionFailure, create_deletion_cancellation_token};

mod ctrl_c_handler;
pub mod indicator;
mod tracing_init;
pub mod ui_config;

/// s3clean - Empty and delete Amazon S3 buckets.
///
/// This binary is a thin wrapper over the s3clean-rs library.
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config_exit_if_err();

    if let Some(shell) = config.auto_complete_shell {
        generate(
            shell,
            &mut CLIArgs::command(),
            "s3clean",
            &mut std::io::stdout(),
        );

        return Ok(());
    }

    start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    let exit_code = run(config).await?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}

fn load_config_exit_if_err() -> Config {
    match Config::try_from(CLIArgs::parse()) {
        Ok(config) => config,
        Err(error_message) => {
            clap::Error::raw(clap::error::ErrorKind::ValueValidation, error_message).exit()
        }
    }
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    match &config.tracing_config {
        Some(tracing_config) => {
            tracing_init::init_tracing(tracing_config);
            true
        }
        None => false,
    }
}

/// Clean up every target in order and return the process exit code.
///
/// The exit code is that of the first failed target. Cancellation stops the
/// remaining targets and exits with 0.
async fn run(config: Config) -> Result<i32> {
    let cancellation_token = create_deletion_cancellation_token();
    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let start_time = tokio::time::Instant::now();
    debug!("s3clean start.");

    let deleter = BulkDeleter::from_config(config.clone(), cancellation_token).await?;
    let indicator_join_handle = indicator::show_indicator(
        deleter.get_stats_receiver(),
        ui_config::is_progress_indicator_needed(&config),
        ui_config::is_show_result_needed(&config),
    );

    let mut exit_code = 0;
    for target in &config.targets {
        match deleter.delete_target(target, config.keep_bucket).await {
            Ok(outcome) => print_outcome(target, &outcome),
            Err(failure) => {
                print_outcome(target, &failure.outcome);
                if failure.is_cancelled() {
                    warn!(target = %target, "deletion cancelled by user.");
                    break;
                }
                report_failure(target, &failure);
                if exit_code == 0 {
                    exit_code = failure.exit_code();
                }
            }
        }
    }

    deleter.close_stats_sender();
    indicator_join_handle.await?;

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());
    if exit_code == 0 {
        debug!(duration_sec = duration_sec, "s3clean has been completed.");
    } else {
        error!(duration_sec = duration_sec, exit_code = exit_code, "s3clean failed.");
    }

    Ok(exit_code)
}

fn print_outcome(target: &BucketTarget, outcome: &DeleteOutcome) {
    println!(
        "{target}: deleted {} objects, failed {} objects ({:?})",
        outcome.deleted_count,
        outcome.failed_count(),
        outcome.status
    );
}

fn report_failure(target: &BucketTarget, failure: &DeletionFailure) {
    error!(target = %target, "{}", failure);
    eprintln!("{target}: {failure}");
    for failed in &failure.outcome.failed {
        eprintln!(
            "  {}: {} {}",
            failed.identifier, failed.error_code, failed.error_message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusty_fork::rusty_fork_test;
    use s3clean_rs::config::args::parse_from_args;

    rusty_fork_test! {
        #[test]
        fn with_tracing() {
            let args = vec![
                "s3clean",
                "-v",
                "s3://test-bucket/prefix/",
            ];

            let config = Config::try_from(parse_from_args(args).unwrap()).unwrap();
            assert!(start_tracing_if_necessary(&config));
        }

        #[test]
        fn without_tracing() {
            let args = vec![
                "s3clean",
                "-qq",
                "s3://test-bucket/prefix/",
            ];

            let config = Config::try_from(parse_from_args(args).unwrap()).unwrap();
            assert!(!start_tracing_if_necessary(&config));
        }
    }
}
