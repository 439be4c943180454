//! Terminal rendering of participant messages and wait progress.

use ensemble_orchestrator::{DisplaySink, ObservedMessage, ProgressSink, ProgressUpdate};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

const SPINNER: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
const SEPARATOR: &str = "------------------------------------------------------------";

/// Prints each observed participant message to stdout.
pub struct ConsoleDisplay;

impl DisplaySink for ConsoleDisplay {
    fn on_message(&self, message: &ObservedMessage) {
        println!(
            "\n**{}** (response #{}, {:.1}s)",
            message.source_participant, message.sequence_number, message.elapsed_seconds
        );
        println!("{}", message.content);
        println!("{SEPARATOR}");
    }

    fn on_budget_exhausted(&self, max_iterations: u32) {
        println!(
            "\nReached the response display limit ({max_iterations}); \
             waiting for the final result..."
        );
        println!("{SEPARATOR}");
    }
}

/// Single-line spinner with elapsed and remaining time.
#[derive(Default)]
pub struct ConsoleProgress {
    frame: AtomicUsize,
}

impl ProgressSink for ConsoleProgress {
    fn on_progress(&self, update: &ProgressUpdate<'_>) {
        let frame = self.frame.fetch_add(1, Ordering::Relaxed);
        print!(
            "\r{} {}... (elapsed {:.1}s, remaining {:.1}s)",
            SPINNER[frame % SPINNER.len()],
            update.label,
            update.elapsed.as_secs_f64(),
            update.remaining.as_secs_f64()
        );
        let _ = std::io::stdout().flush();
    }

    fn on_complete(&self, _label: &str) {
        print!("\r{:width$}\r", "", width = 100);
        let _ = std::io::stdout().flush();
    }
}
