use anstyle::{AnsiColor, Color, Style};
use beancount_import::console::{Console, Line, Tone};
use std::io::{IsTerminal as _, Write as _};

pub fn style(tone: Tone) -> Style {
    let color = |color: AnsiColor| Style::new().fg_color(Some(Color::Ansi(color)));
    match tone {
        Tone::Plain => Style::new(),
        Tone::Number => color(AnsiColor::Cyan),
        Tone::Date => color(AnsiColor::Yellow),
        Tone::Flag => color(AnsiColor::Magenta),
        Tone::Error => color(AnsiColor::Red),
        Tone::File => color(AnsiColor::BrightBlack),
        Tone::Text | Tone::Credit => color(AnsiColor::Green),
        Tone::Warning => color(AnsiColor::BrightYellow),
        Tone::Answer => color(AnsiColor::Blue),
        Tone::Debit => color(AnsiColor::BrightRed),
    }
}

/// Writes lines to stdout, styled when stdout is a terminal.
pub struct StyledConsole {
    styled: bool,
}

impl StyledConsole {
    pub fn stdout() -> Self {
        StyledConsole {
            styled: std::io::stdout().is_terminal(),
        }
    }

    pub fn render(&self, line: &Line) -> String {
        if !self.styled {
            return line.to_string();
        }
        line.spans
            .iter()
            .map(|span| {
                let style = style(span.tone);
                format!("{style}{}{style:#}", span.text)
            })
            .collect()
    }
}

impl Console for StyledConsole {
    fn print(&mut self, line: Line) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", self.render(&line));
        let _ = stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_when_not_styled() {
        let console = StyledConsole { styled: false };
        let line = Line::plain("Found ").push(Tone::Number, "3");
        assert_eq!(console.render(&line), "Found 3");
    }

    #[test]
    fn styled_spans_are_reset() {
        let console = StyledConsole { styled: true };
        let line = Line::styled(Tone::Error, "boom");
        let rendered = console.render(&line);
        assert!(rendered.starts_with("\u{1b}[31m"));
        assert!(rendered.ends_with("boom\u{1b}[0m"));
    }
}
