//! Side-channel user notifications (retry notices, file-change analysis).
//! They bypass the request/response path and are printed as they happen.

use std::io::Write;
use std::sync::{Arc, Mutex};

pub type Notifier = Arc<dyn Fn(&str) + Send + Sync>;

/// Input marker of the interactive loop.
pub const PROMPT_MARKER: &str = "> ";

/// Write one notice. With `reprompt`, the notice starts on a fresh line and
/// the marker is printed again after it, since the reader is idle at a prompt.
fn write_notice(out: &mut impl Write, msg: &str, reprompt: Option<&str>) -> std::io::Result<()> {
    match reprompt {
        Some(marker) => write!(out, "\n{msg}\n{marker}")?,
        None => writeln!(out, "{msg}")?,
    }
    out.flush()
}

/// Prints each notice on its own line on stdout.
pub fn stdout_notifier() -> Notifier {
    Arc::new(|msg: &str| {
        let _ = write_notice(&mut std::io::stdout().lock(), msg, None);
    })
}

/// Like [`stdout_notifier`], for notices that land while the interactive
/// loop waits at [`PROMPT_MARKER`].
pub fn prompting_notifier() -> Notifier {
    Arc::new(|msg: &str| {
        let _ = write_notice(&mut std::io::stdout().lock(), msg, Some(PROMPT_MARKER));
    })
}

pub fn silent_notifier() -> Notifier {
    Arc::new(|_: &str| {})
}

/// Collects notices in memory; handy for one-shot runs and tests.
pub fn collecting_notifier() -> (Notifier, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let notifier: Notifier = Arc::new(move |msg: &str| {
        if let Ok(mut v) = sink.lock() {
            v.push(msg.to_string());
        }
    });
    (notifier, seen)
}
