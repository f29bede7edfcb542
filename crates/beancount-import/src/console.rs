use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Number,
    Date,
    Flag,
    Error,
    File,
    Text,
    Warning,
    Answer,
    Credit,
    Debit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub tone: Tone,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    pub fn new() -> Self {
        Line::default()
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Line::new().push(Tone::Plain, text)
    }

    pub fn styled(tone: Tone, text: impl Into<String>) -> Self {
        Line::new().push(tone, text)
    }

    pub fn push(mut self, tone: Tone, text: impl Into<String>) -> Self {
        self.spans.push(Span {
            tone,
            text: text.into(),
        });
        self
    }

    pub fn append(mut self, other: Line) -> Self {
        self.spans.extend(other.spans);
        self
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for span in &self.spans {
            f.write_str(&span.text)?;
        }
        Ok(())
    }
}

pub trait Console {
    fn print(&mut self, line: Line);
}

#[derive(Debug, Default)]
pub struct BufferConsole {
    pub lines: Vec<String>,
}

impl Console for BufferConsole {
    fn print(&mut self, line: Line) {
        self.lines.push(line.to_string());
    }
}

impl BufferConsole {
    pub fn contents(&self) -> String {
        self.lines.join("\n")
    }
}
