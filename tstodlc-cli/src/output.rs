//! Console output for CLI commands.
//!
//! Commands write through the [`Output`] trait so handlers stay independent
//! of the terminal. [`ConsoleOutput`] styles text with `console`;
//! [`ProgressOutput`] drives an `indicatif` bar during packaging runs.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tstodlc::index::ServerUpdate;
use tstodlc::pack::{PackEvent, PackProgress};

/// Output sink for command handlers.
pub trait Output {
    /// Print a section header.
    fn header(&self, text: &str);

    /// Print a smaller header.
    fn subheader(&self, text: &str);

    /// Print a line.
    fn println(&self, text: &str);

    /// Print a line indented by two spaces.
    fn indented(&self, text: &str) {
        self.println(&format!("  {}", text));
    }

    /// Print an empty line.
    fn newline(&self) {
        self.println("");
    }

    /// Print a success line.
    fn success(&self, text: &str);

    /// Print a warning line.
    fn warning(&self, text: &str);
}

/// Styled output on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn new() -> Self {
        Self
    }
}

impl Output for ConsoleOutput {
    fn header(&self, text: &str) {
        println!("{}", style(text).bold().underlined());
    }

    fn subheader(&self, text: &str) {
        println!("{}", style(text).bold());
    }

    fn println(&self, text: &str) {
        println!("{}", text);
    }

    fn success(&self, text: &str) {
        println!("{} {}", style("✓").green().bold(), text);
    }

    fn warning(&self, text: &str) {
        println!("{} {}", style("!").yellow().bold(), style(text).yellow());
    }
}

const BAR_TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Progress bar over the subdirectories of a packaging run.
///
/// Messages are printed above the bar, or to stderr when it is hidden.
pub struct ProgressOutput {
    bar: ProgressBar,
}

impl ProgressOutput {
    pub fn new() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn note(&self, text: String) {
        if self.bar.is_hidden() {
            eprintln!("{}", text);
        } else {
            self.bar.println(text);
        }
    }
}

impl Default for ProgressOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl PackProgress for ProgressOutput {
    fn begin(&mut self, total: usize) {
        let bar = ProgressBar::new(total as u64);
        let bar_style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(bar_style);
        self.bar = bar;
    }

    fn event(&mut self, event: &PackEvent) {
        match event {
            PackEvent::InputStarted { input, target } => {
                self.note(format!(
                    "{} {} -> {}",
                    style("Packing").bold(),
                    input.display(),
                    target.display()
                ));
            }
            PackEvent::NotADirectory(path) => {
                self.note(format!(
                    "{} {} is not a directory, skipped",
                    style("!").yellow().bold(),
                    path.display()
                ));
            }
            PackEvent::StaleEntriesRemoved { count } => {
                self.note(format!("  removed {} stale index entries", count));
            }
            PackEvent::Unchanged { name } => {
                self.bar.set_message(format!("{} unchanged", name));
            }
            PackEvent::Empty { name } => {
                self.note(format!("  {} {} is empty", style("-").dim(), name));
            }
            PackEvent::Packed { name, path } => {
                self.bar.set_message(name.clone());
                self.note(format!(
                    "  {} {} -> {}",
                    style("✓").green(),
                    name,
                    path.display()
                ));
            }
            PackEvent::LocalIndexWritten(path) => {
                self.note(format!("  local index {}", path.display()));
            }
            PackEvent::ServerIndex(ServerUpdate::NotFound) => {
                self.note(format!(
                    "  {}",
                    style("server index not found, not updated").yellow()
                ));
            }
            PackEvent::ServerIndex(ServerUpdate::Updated { path, report }) => {
                self.note(format!(
                    "  server index {} ({} records)",
                    path.display(),
                    report.packages.len()
                ));
            }
        }
        if event.is_unit() {
            self.bar.inc(1);
        }
    }
}
