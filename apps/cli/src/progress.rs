//! Terminal progress bars driven by upload events.

use std::collections::HashMap;
use std::time::Duration;

use indicatif::{
    HumanBytes, HumanDuration, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle,
};
use simpleupload_protocol::UploadStatus;
use simpleupload_uploader::UploadEvent;
use tokio::sync::mpsc;

const BAR_TEMPLATE: &str = "{prefix:>20.cyan.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} {msg}";

const BAR_CHARS: &str = "█▓▒░  ";

/// Rate and time left as reported by the engine, e.g. `1.50 MiB/s, 3 seconds left`.
fn rate_message(transferred: u64, total: u64, bytes_per_second: f64) -> String {
    if bytes_per_second <= 0.0 {
        return String::new();
    }
    let rate = HumanBytes(bytes_per_second as u64);
    let remaining = total.saturating_sub(transferred) as f64 / bytes_per_second;
    match Duration::try_from_secs_f64(remaining) {
        Ok(left) => format!("{rate}/s, {} left", HumanDuration(left)),
        Err(_) => format!("{rate}/s"),
    }
}

fn bar_style() -> ProgressStyle {
    match ProgressStyle::with_template(BAR_TEMPLATE) {
        Ok(style) => style.progress_chars(BAR_CHARS),
        Err(_) => ProgressStyle::default_bar(),
    }
}

/// Consumes events until the batch finishes or the sender goes away.
pub async fn render(mut events: mpsc::Receiver<UploadEvent>, visible: bool) {
    let multi = MultiProgress::new();
    if !visible {
        multi.set_draw_target(ProgressDrawTarget::hidden());
    }
    let mut bars: HashMap<String, ProgressBar> = HashMap::new();

    while let Some(event) = events.recv().await {
        match event {
            UploadEvent::FileStarted {
                file_name,
                total_bytes,
                ..
            } => {
                let bar = multi.add(ProgressBar::new(total_bytes));
                bar.set_style(bar_style());
                bar.set_prefix(file_name.clone());
                bars.insert(file_name, bar);
            }
            UploadEvent::Progress {
                file_name,
                transferred_bytes,
                total_bytes,
                bytes_per_second,
                ..
            } => {
                if let Some(bar) = bars.get(&file_name) {
                    bar.set_position(transferred_bytes);
                    bar.set_message(rate_message(
                        transferred_bytes,
                        total_bytes,
                        bytes_per_second,
                    ));
                }
            }
            UploadEvent::ChunkRetry {
                file_name,
                chunk_index,
                attempt,
                error,
            } => {
                if let Some(bar) = bars.get(&file_name) {
                    bar.set_message(format!("chunk {chunk_index} retry {attempt}: {error}"));
                }
            }
            UploadEvent::FileFinished {
                file_name,
                status,
                error,
            } => {
                let Some(bar) = bars.remove(&file_name) else {
                    continue;
                };
                match status {
                    UploadStatus::Succeeded => {
                        if let Some(len) = bar.length() {
                            bar.set_position(len);
                        }
                        bar.finish_with_message("done");
                    }
                    _ => bar.abandon_with_message(error.unwrap_or_default()),
                }
            }
            UploadEvent::BatchFinished { .. } => break,
        }
    }
}
