//! Style constants and clap help styling configuration.

use anstyle::{AnsiColor, Effects, Style};

/// Green: passing templates.
pub(crate) const SUCCESS: Style =
    Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Green)));

/// Red: compile, load and render failures.
pub(crate) const ERROR: Style = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Red)));

/// Bold: section headers.
pub(crate) const HEADER: Style = Style::new().effects(Effects::BOLD);

/// Dimmed: instruction listings.
pub(crate) const DIM: Style = Style::new().effects(Effects::DIMMED);

/// Custom clap styles for help output.
pub(crate) fn clap_styles() -> clap::builder::Styles {
    let accent = Style::new()
        .fg_color(Some(anstyle::Color::Ansi(AnsiColor::Green)))
        .effects(Effects::BOLD);
    clap::builder::Styles::styled()
        .header(accent)
        .usage(accent)
        .literal(Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Cyan))))
        .placeholder(Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Cyan))))
        .error(
            Style::new()
                .fg_color(Some(anstyle::Color::Ansi(AnsiColor::Red)))
                .effects(Effects::BOLD),
        )
}
