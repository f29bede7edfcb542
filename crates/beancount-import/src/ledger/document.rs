//! The ledger file as top-level blocks that concatenate back to the original text.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Starts with a date: transactions, `open`, `balance`, ...
    Directive,
    Option,
    Include,
    Comment,
    Blank,
    /// `plugin`, `pushtag` and anything else we pass through untouched.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    blocks: Vec<Block>,
}

impl Document {
    pub fn parse(source: &str) -> Document {
        let mut blocks: Vec<Block> = Vec::new();
        let mut in_string = false;

        for (index, line) in source.split_inclusive('\n').enumerate() {
            let continues = match blocks.last() {
                Some(_) if in_string => !starts_with_date(line),
                Some(block) => accepts_continuation(block.kind) && is_indented(line),
                None => false,
            };

            match blocks.last_mut() {
                Some(block) if continues => block.text.push_str(line),
                _ => {
                    in_string = false;
                    blocks.push(Block {
                        kind: classify(line),
                        line: index + 1,
                        text: line.to_owned(),
                    });
                }
            }

            if blocks
                .last()
                .is_some_and(|block| accepts_continuation(block.kind))
            {
                in_string = scan_line(line, in_string).in_string;
            }
        }

        Document { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn render(&self) -> String {
        self.blocks.iter().map(|block| block.text.as_str()).collect()
    }

    /// Swap the text of one block and renumber the blocks after it.
    /// Returns `false` if there is no such block.
    pub fn replace(&mut self, index: usize, text: String) -> bool {
        let Some(block) = self.blocks.get_mut(index) else {
            return false;
        };
        block.text = text;

        let mut line = block.line;
        for block in &mut self.blocks[index..] {
            block.line = line;
            line += block.text.split_inclusive('\n').count();
        }
        true
    }
}

fn classify(line: &str) -> BlockKind {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        BlockKind::Blank
    } else if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        BlockKind::Directive
    } else if trimmed.starts_with("option") {
        BlockKind::Option
    } else if trimmed.starts_with("include") {
        BlockKind::Include
    } else if trimmed.starts_with([';', '#', '*', '%']) {
        BlockKind::Comment
    } else {
        BlockKind::Other
    }
}

fn accepts_continuation(kind: BlockKind) -> bool {
    matches!(
        kind,
        BlockKind::Directive | BlockKind::Option | BlockKind::Include | BlockKind::Other
    )
}

/// A string left open does not swallow the next dated directive.
fn starts_with_date(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && matches!(bytes[4], b'-' | b'/')
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == bytes[4]
        && bytes[8..10].iter().all(u8::is_ascii_digit)
}

fn is_indented(line: &str) -> bool {
    line.starts_with([' ', '\t']) && !line.trim().is_empty()
}

pub(crate) struct LineScan {
    pub in_string: bool,
    pub has_comment: bool,
}

pub(crate) fn scan_line(line: &str, mut in_string: bool) -> LineScan {
    let mut escaped = false;
    for c in line.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else if c == '"' {
            in_string = true;
        } else if c == ';' {
            return LineScan {
                in_string,
                has_comment: true,
            };
        }
    }
    LineScan {
        in_string,
        has_comment: false,
    }
}

pub(crate) fn has_comment(text: &str) -> bool {
    let mut in_string = false;
    for line in text.split_inclusive('\n') {
        let scan = scan_line(line, in_string);
        if scan.has_comment {
            return true;
        }
        in_string = scan.in_string;
    }
    false
}
