//! User-facing progress output.
//!
//! This is separate from `tracing`: diagnostics go to stderr through the
//! subscriber, while the reporter prints the stage-by-stage story the person
//! running the installer reads.

use std::io::IsTerminal;

use anstyle::{AnsiColor, Effects, Style};

use crate::core::machine::Stage;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Status {
    Ok,
    Note,
    Warn,
    Error,
}

impl Status {
    fn badge(self) -> &'static str {
        match self {
            Self::Ok => "[OK]",
            Self::Note => "[..]",
            Self::Warn => "[WARN]",
            Self::Error => "[ERR]",
        }
    }

    fn style(self) -> Style {
        let color = match self {
            Self::Ok => AnsiColor::Green,
            Self::Note => AnsiColor::Cyan,
            Self::Warn => AnsiColor::Yellow,
            Self::Error => AnsiColor::Red,
        };
        Style::new().fg_color(Some(color.into())).effects(Effects::BOLD)
    }
}

pub trait Reporter {
    /// A stage is starting.
    fn stage(&mut self, stage: Stage);
    fn ok(&mut self, message: &str);
    /// Informational; expected conditions such as an absent service supervisor.
    fn note(&mut self, message: &str);
    /// A convenience feature degraded. The install is still valid.
    fn warn(&mut self, message: &str);
}

pub fn resolve_output_style(stdout_is_tty: bool, no_color: bool) -> OutputStyle {
    if stdout_is_tty && !no_color {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

/// Status line without colour codes. Plain output stays unadorned.
pub fn render_status_line(style: OutputStyle, status: Status, message: &str) -> String {
    match style {
        OutputStyle::Plain => match status {
            Status::Warn => format!("warning: {message}"),
            Status::Error => format!("error: {message}"),
            Status::Ok | Status::Note => message.to_string(),
        },
        OutputStyle::Rich => format!("{} {message}", status.badge()),
    }
}

pub fn render_stage_header(style: OutputStyle, stage: Stage) -> String {
    match style {
        OutputStyle::Plain => format!("{}...", stage.title()),
        OutputStyle::Rich => format!("== {} ==", stage.title()),
    }
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

/// Reporter that writes to the terminal.
#[derive(Copy, Clone, Debug)]
pub struct Console {
    style: OutputStyle,
}

impl Console {
    pub fn new(style: OutputStyle) -> Self {
        Self { style }
    }

    /// Pick the style from the real stdout and `NO_COLOR`.
    pub fn detect() -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
        Self::new(resolve_output_style(std::io::stdout().is_terminal(), no_color))
    }

    fn status_line(self, status: Status, message: &str) -> String {
        match self.style {
            OutputStyle::Plain => render_status_line(self.style, status, message),
            OutputStyle::Rich => format!("{} {message}", colorize(status.style(), status.badge())),
        }
    }

    /// Fatal diagnosis, printed to stderr.
    pub fn error(self, message: &str, remedy: Option<&str>) {
        eprintln!("{}", self.status_line(Status::Error, message));
        if let Some(remedy) = remedy {
            eprintln!("hint: {remedy}");
        }
    }
}

impl Reporter for Console {
    fn stage(&mut self, stage: Stage) {
        let header = render_stage_header(self.style, stage);
        match self.style {
            OutputStyle::Plain => println!("{header}"),
            OutputStyle::Rich => {
                let section = Style::new()
                    .fg_color(Some(AnsiColor::Blue.into()))
                    .effects(Effects::BOLD);
                println!();
                println!("{}", colorize(section, &header));
            }
        }
    }

    fn ok(&mut self, message: &str) {
        println!("{}", self.status_line(Status::Ok, message));
    }

    fn note(&mut self, message: &str) {
        println!("{}", self.status_line(Status::Note, message));
    }

    fn warn(&mut self, message: &str) {
        println!("{}", self.status_line(Status::Warn, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rich_only_on_tty_without_no_color() {
        assert_eq!(resolve_output_style(true, false), OutputStyle::Rich);
        assert_eq!(resolve_output_style(true, true), OutputStyle::Plain);
        assert_eq!(resolve_output_style(false, false), OutputStyle::Plain);
    }

    #[test]
    fn plain_status_lines() {
        assert_eq!(
            render_status_line(OutputStyle::Plain, Status::Ok, "wrapper written"),
            "wrapper written"
        );
        assert_eq!(
            render_status_line(OutputStyle::Plain, Status::Warn, "link not published"),
            "warning: link not published"
        );
    }

    #[test]
    fn rich_status_lines_carry_badges() {
        assert_eq!(
            render_status_line(OutputStyle::Rich, Status::Ok, "wrapper written"),
            "[OK] wrapper written"
        );
        assert_eq!(
            render_status_line(OutputStyle::Rich, Status::Note, "no supervisor"),
            "[..] no supervisor"
        );
    }

    #[test]
    fn stage_headers() {
        assert_eq!(
            render_stage_header(OutputStyle::Plain, Stage::Syncing),
            "Synchronizing repository..."
        );
        assert_eq!(
            render_stage_header(OutputStyle::Rich, Stage::Probing),
            "== Probing host =="
        );
    }
}
