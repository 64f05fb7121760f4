// Displays real-time deletion progress using indicatif and moving averages.
// Reads DeletionStatistics from an async channel and updates a progress line.

use std::io;
use std::io::Write;

use async_channel::Receiver;
use indicatif::{HumanCount, HumanDuration, ProgressBar, ProgressStyle};
use s3clean_rs::types::{DeletionPhase, DeletionStatistics};
use simple_moving_average::{SMA, SumTreeSMA};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

/// Summary returned by [`show_indicator`] after the stats channel closes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndicatorSummary {
    pub total_listed_count: u64,
    pub total_delete_count: u64,
    pub total_error_count: u64,
    pub total_retry_count: u64,
    pub total_chunk_count: u64,
}

/// Moving average window in seconds (samples).
const MOVING_AVERAGE_PERIOD_SECS: usize = 10;

/// How often (in seconds) to refresh the progress display.
const REFRESH_INTERVAL: f32 = 1.0;

fn template_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn phase_label(phase: Option<DeletionPhase>) -> &'static str {
    match phase {
        None | Some(DeletionPhase::Idle) => "starting",
        Some(DeletionPhase::ResolvingRegion) => "resolving region",
        Some(DeletionPhase::Listing) => "listing",
        Some(DeletionPhase::Chunking) | Some(DeletionPhase::Dispatching) => "deleting",
        Some(DeletionPhase::Aggregating) => "finishing",
        Some(DeletionPhase::Done(_)) => "done",
    }
}

/// Spawn a background task that reads deletion statistics from the channel
/// and displays progress using indicatif.
///
/// The task runs until `stats_receiver` is closed and drained.
pub fn show_indicator(
    stats_receiver: Receiver<DeletionStatistics>,
    show_progress: bool,
    show_result: bool,
) -> JoinHandle<IndicatorSummary> {
    let progress_text = ProgressBar::new(0);
    progress_text.set_style(template_style("{wide_msg}"));

    tokio::spawn(async move {
        let start_time = Instant::now();

        let mut ma_deleted_count = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();
        let mut summary = IndicatorSummary::default();
        let mut phase = None;

        loop {
            let mut period_count: u64 = 0;

            let period = Instant::now();
            loop {
                while let Ok(stats) = stats_receiver.try_recv() {
                    match stats {
                        DeletionStatistics::ObjectsListed(count) => {
                            summary.total_listed_count += count;
                        }
                        DeletionStatistics::DeleteComplete { .. } => {
                            period_count += 1;
                            summary.total_delete_count += 1;
                        }
                        DeletionStatistics::DeleteError { .. } => {
                            summary.total_error_count += 1;
                        }
                        DeletionStatistics::DeleteRetry { .. } => {
                            summary.total_retry_count += 1;
                        }
                        DeletionStatistics::ChunkComplete { .. } => {
                            summary.total_chunk_count += 1;
                        }
                        DeletionStatistics::PhaseChanged(new_phase) => {
                            phase = Some(new_phase);
                        }
                    }
                }

                if REFRESH_INTERVAL < period.elapsed().as_secs_f32() {
                    break;
                }

                if stats_receiver.is_closed() && stats_receiver.is_empty() {
                    let elapsed = start_time.elapsed();
                    let elapsed_secs_f64 = elapsed.as_secs_f64();

                    let objects_per_sec = if elapsed_secs_f64 < REFRESH_INTERVAL as f64 {
                        summary.total_delete_count
                    } else {
                        (summary.total_delete_count as f64 / elapsed_secs_f64) as u64
                    };

                    info!(
                        message = "deletion summary",
                        listed_objects = summary.total_listed_count,
                        deleted_objects = summary.total_delete_count,
                        deleted_objects_per_sec = objects_per_sec,
                        failed_objects = summary.total_error_count,
                        retried_requests = summary.total_retry_count,
                        completed_chunks = summary.total_chunk_count,
                        duration_sec = elapsed_secs_f64,
                    );

                    if show_result {
                        progress_text.set_style(template_style("{msg}"));
                        progress_text.finish_with_message(format!(
                            "deleted {:>3} objects | {:>3} objects/sec,  failed {} objects,  retried {} requests,  duration {}",
                            summary.total_delete_count,
                            HumanCount(objects_per_sec),
                            summary.total_error_count,
                            summary.total_retry_count,
                            HumanDuration(elapsed),
                        ));

                        println!();
                        let _ = io::stdout().flush();
                    }

                    return summary;
                }

                tokio::time::sleep(std::time::Duration::from_secs_f32(0.05)).await;
            }

            ma_deleted_count.add_sample(period_count);

            if show_progress {
                progress_text.set_message(format!(
                    "{}: listed {} objects,  deleted {:>3} objects | {:>3} objects/sec,  failed {} objects,  retried {} requests",
                    phase_label(phase),
                    HumanCount(summary.total_listed_count),
                    summary.total_delete_count,
                    HumanCount(ma_deleted_count.get_average()),
                    summary.total_error_count,
                    summary.total_retry_count,
                ));
            }
        }
    })
}
