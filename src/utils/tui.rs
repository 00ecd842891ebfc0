use std::borrow::Cow;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const TICK: Duration = Duration::from_millis(80);

/// Await `task` with a spinner on stderr, cleared once it settles.
///
/// indicatif hides the spinner when stderr is not a terminal, so piped
/// output stays clean.
pub async fn with_spinner<F: Future>(message: impl Into<Cow<'static, str>>, task: F) -> F::Output {
    let style = ProgressStyle::with_template("{msg} {spinner}")
        .map(|s| s.tick_strings(&["-", "\\", "|", "/"]))
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let spinner = ProgressBar::new_spinner()
        .with_style(style)
        .with_message(message);
    spinner.enable_steady_tick(TICK);

    let output = task.await;
    spinner.finish_and_clear();
    output
}
