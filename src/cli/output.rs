//! Terminal output for user-facing progress.
//!
//! Status lines go to stdout; warnings and errors go to stderr. Styling is
//! dropped automatically when the stream is not a terminal.

use console::{Style, Term};

/// Styled terminal reporter with verbose and quiet modes.
#[derive(Debug, Clone)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
}

impl OutputManager {
    /// Creates a reporter. `quiet` wins over `verbose`, except for errors.
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    /// Whether verbose output is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }

    fn out(&self, line: String) {
        if !self.quiet {
            let _ = Term::stdout().write_line(&line);
        }
    }

    fn err(&self, line: String) {
        let _ = Term::stderr().write_line(&line);
    }

    /// Plain informational line.
    pub fn info(&self, message: &str) {
        self.out(message.to_string());
    }

    /// Dimmed line, only in verbose mode.
    pub fn verbose(&self, message: &str) {
        if self.is_verbose() {
            self.out(Style::new().dim().apply_to(message).to_string());
        }
    }

    /// Step in progress.
    pub fn progress(&self, message: &str) {
        self.out(format!("{} {}", Style::new().cyan().bold().apply_to("→"), message));
    }

    /// Completed step.
    pub fn success(&self, message: &str) {
        self.out(format!("{} {}", Style::new().green().bold().apply_to("✓"), message));
    }

    /// Non-fatal problem.
    pub fn warn(&self, message: &str) {
        if !self.quiet {
            self.err(format!("{} {}", Style::new().yellow().bold().apply_to("warning:"), message));
        }
    }

    /// Fatal problem. Printed even in quiet mode.
    pub fn error(&self, message: &str) {
        self.err(format!("{} {}", Style::new().red().bold().apply_to("error:"), message));
    }

    /// Recovery hint following an error. Printed even in quiet mode.
    pub fn hint(&self, message: &str) {
        self.err(format!("    {} {}", Style::new().cyan().apply_to("hint:"), message));
    }

    /// Section heading.
    pub fn section(&self, title: &str) {
        self.out(String::new());
        self.out(Style::new().bold().underlined().apply_to(title).to_string());
    }

    /// Indented line, used for streamed build output and listings.
    pub fn indent(&self, message: &str) {
        self.out(format!("    {}", message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_overrides_verbose() {
        assert!(!OutputManager::new(true, true).is_verbose());
        assert!(OutputManager::new(true, false).is_verbose());
        assert!(!OutputManager::new(false, false).is_verbose());
    }
}
