use crate::console::StyledConsole;
use anstyle::Style;
use beancount_import::compose::{ComposePrompts, Edit, PostingRequest};
use beancount_import::console::{Console, Line, Tone};
use beancount_import::money::format_amount;
use beancount_import::session::{Resolution, SessionPrompts};
use beancount_import::{Decimal, Flag, ImportedTransaction, Ledger, LedgerEntry, PostingInput};
use beancount_import::{expr, validate};
use crossterm::cursor::{MoveToColumn, MoveUp};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{QueueableCommand as _, queue};
use std::io::{self, BufRead as _, IsTerminal as _, Write as _};

const CANCEL_TOOLBAR: &str = "[c-x] to Cancel";
const CONFIRM_TOOLBAR: &str = "[Y]es  [N]o";
const RESOLVE_TOOLBAR: &str = "[R]econcile  [I]nsert  [S]kip  [Q]uit";
const EDIT_TOOLBAR: &str =
    "[D]ate  [F]lag  [P]ayee  [N]arration  [T]ags  [L]inks  P[O]stings  [S]ave  [c-x] Cancel";

#[derive(Debug, Default)]
struct LineBuffer {
    chars: Vec<char>,
    cursor: usize,
    completion: Option<Completion>,
}

#[derive(Debug)]
struct Completion {
    candidates: Vec<String>,
    index: usize,
}

impl LineBuffer {
    fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        LineBuffer {
            cursor: chars.len(),
            chars,
            completion: None,
        }
    }

    fn text(&self) -> String {
        self.chars.iter().collect()
    }

    fn set_text(&mut self, text: &str) {
        self.chars = text.chars().collect();
        self.cursor = self.chars.len();
    }

    fn insert(&mut self, c: char) {
        self.completion = None;
        self.chars.insert(self.cursor, c);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        self.completion = None;
        if self.cursor > 0 {
            self.cursor -= 1;
            self.chars.remove(self.cursor);
        }
    }

    fn delete(&mut self) {
        self.completion = None;
        if self.cursor < self.chars.len() {
            self.chars.remove(self.cursor);
        }
    }

    fn clear_before_cursor(&mut self) {
        self.completion = None;
        self.chars.drain(..self.cursor);
        self.cursor = 0;
    }

    fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.chars.len());
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.chars.len();
    }

    /// Replace the text with the next completion of what was typed before the first Tab.
    fn complete(&mut self, candidates: &[String]) {
        let next = match &mut self.completion {
            Some(completion) => {
                completion.index = (completion.index + 1) % completion.candidates.len();
                completion.candidates[completion.index].clone()
            }
            None => {
                let matches = fuzzy_matches(&self.text(), candidates);
                let Some(first) = matches.first().cloned() else {
                    return;
                };
                self.completion = Some(Completion {
                    candidates: matches,
                    index: 0,
                });
                first
            }
        };
        self.set_text(&next);
    }
}

/// Candidates containing every character of `query` in order, ignoring case.
/// Candidates containing `query` as a whole come first.
fn fuzzy_matches(query: &str, candidates: &[String]) -> Vec<String> {
    let query = query.to_lowercase();
    let mut contains = Vec::new();
    let mut scattered = Vec::new();
    for candidate in candidates {
        let lower = candidate.to_lowercase();
        if lower.contains(&query) {
            contains.push(candidate.clone());
        } else {
            let mut rest = lower.chars();
            if query.chars().all(|c| rest.any(|r| r == c)) {
                scattered.push(candidate.clone());
            }
        }
    }
    contains.extend(scattered);
    contains
}

struct Prompt<'a> {
    label: Line,
    default: String,
    toolbar: &'a str,
    completions: &'a [String],
}

impl<'a> Prompt<'a> {
    fn new(label: impl Into<String>, toolbar: &'a str) -> Self {
        Prompt {
            label: Line::plain(label),
            default: String::new(),
            toolbar,
            completions: &[],
        }
    }

    fn prefill(mut self, default: impl Into<String>) -> Self {
        self.default = default.into();
        self
    }

    fn completions(mut self, completions: &'a [String]) -> Self {
        self.completions = completions;
        self
    }
}

struct RawMode;

impl RawMode {
    fn enable() -> io::Result<RawMode> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// `Ok(None)` when cancelled. Ctrl-C gives an `Interrupted` error.
fn read_line(console: &StyledConsole, prompt: &Prompt<'_>) -> io::Result<Option<String>> {
    let label = console.render(&prompt.label);
    if !io::stdin().is_terminal() {
        return read_piped_line(&label, &prompt.default);
    }

    let label_width = prompt.label.to_string().chars().count();
    let mut out = io::stdout();
    let mut buffer = LineBuffer::new(&prompt.default);
    let _raw = RawMode::enable()?;

    loop {
        draw(&mut out, &label, label_width, &buffer, prompt.toolbar)?;
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if control => {
                finish(&mut out, &label, &buffer.text())?;
                return Err(io::ErrorKind::Interrupted.into());
            }
            KeyCode::Char('x') if control => {
                finish(&mut out, &label, &buffer.text())?;
                write!(out, "...Canceling\r\n")?;
                return Ok(None);
            }
            KeyCode::Esc => {
                finish(&mut out, &label, &buffer.text())?;
                write!(out, "...Canceling\r\n")?;
                return Ok(None);
            }
            KeyCode::Enter => {
                finish(&mut out, &label, &buffer.text())?;
                return Ok(Some(buffer.text()));
            }
            KeyCode::Char('u') if control => buffer.clear_before_cursor(),
            KeyCode::Char('a') if control => buffer.move_home(),
            KeyCode::Char('e') if control => buffer.move_end(),
            KeyCode::Char(c) if !control => buffer.insert(c),
            KeyCode::Backspace => buffer.backspace(),
            KeyCode::Delete => buffer.delete(),
            KeyCode::Left => buffer.move_left(),
            KeyCode::Right => buffer.move_right(),
            KeyCode::Home => buffer.move_home(),
            KeyCode::End => buffer.move_end(),
            KeyCode::Tab => buffer.complete(prompt.completions),
            _ => {}
        }
    }
}

fn read_piped_line(label: &str, default: &str) -> io::Result<Option<String>> {
    let mut out = io::stdout();
    write!(out, "{label}")?;
    out.flush()?;

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer)? == 0 {
        writeln!(out)?;
        return Ok(None);
    }
    let answer = answer.trim_end_matches(['\r', '\n']);
    writeln!(out, "{answer}")?;
    let answer = if answer.is_empty() { default } else { answer };
    Ok(Some(answer.to_owned()))
}

fn draw(
    out: &mut impl io::Write,
    label: &str,
    label_width: usize,
    buffer: &LineBuffer,
    toolbar: &str,
) -> io::Result<()> {
    let hint = Style::new().dimmed();
    let column = u16::try_from(label_width + buffer.cursor).unwrap_or(u16::MAX);
    queue!(
        out,
        MoveToColumn(0),
        Clear(ClearType::FromCursorDown),
        Print(label),
        Print(buffer.text()),
        Print("\r\n"),
        Print(format!("{hint}{toolbar}{hint:#}")),
        MoveUp(1),
        MoveToColumn(column),
    )?;
    out.flush()
}

fn finish(out: &mut impl io::Write, label: &str, text: &str) -> io::Result<()> {
    out.queue(MoveToColumn(0))?
        .queue(Clear(ClearType::FromCursorDown))?
        .queue(Print(format!("{label}{text}\r\n")))?;
    out.flush()
}

fn ask<T>(
    console: &mut StyledConsole,
    mut prompt: Prompt<'_>,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Option<T> {
    loop {
        let text = match read_line(console, &prompt) {
            Ok(text) => text?,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {
                tracing::debug!("interrupted at prompt");
                std::process::exit(130);
            }
            Err(error) => {
                console.print(Line::styled(Tone::Error, format!("...{error}")));
                return None;
            }
        };
        match parse(&text) {
            Ok(value) => return Some(value),
            Err(message) => {
                console.print(Line::styled(Tone::Error, format!("...{message}")));
                prompt.default = text;
            }
        }
    }
}

fn parse_amount(text: &str) -> Result<Decimal, String> {
    expr::evaluate(text).map_err(|error| format!("Not a valid number or expression: {error}"))
}

fn parse_required(text: &str) -> Result<String, String> {
    match text.trim() {
        "" => Err("Please enter a response".to_owned()),
        text => Ok(text.to_owned()),
    }
}

fn parse_resolution(text: &str) -> Result<Resolution, String> {
    match text.trim().to_lowercase().as_str() {
        "r" | "reconcile" => Ok(Resolution::Reconcile),
        "i" | "insert" => Ok(Resolution::Insert),
        "s" | "skip" => Ok(Resolution::Skip),
        "q" | "quit" => Ok(Resolution::Quit),
        "" => Err("Please enter a response".to_owned()),
        _ => Err("Please enter a valid response".to_owned()),
    }
}

fn parse_confirm(text: &str) -> Result<bool, String> {
    match text.trim().to_lowercase().as_str() {
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        _ => Err("Please enter a valid response".to_owned()),
    }
}

fn parse_choice(text: &str, count: usize) -> Result<usize, String> {
    match text.trim().parse::<usize>() {
        Ok(choice) if choice < count => Ok(choice),
        _ => Err("Please enter a valid response".to_owned()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditChoice {
    Date,
    Flag,
    Payee,
    Narration,
    Tags,
    Links,
    Postings,
    Save,
}

fn parse_edit_choice(text: &str) -> Result<EditChoice, String> {
    match text.trim().to_lowercase().as_str() {
        "d" | "date" => Ok(EditChoice::Date),
        "f" | "flag" => Ok(EditChoice::Flag),
        "p" | "payee" => Ok(EditChoice::Payee),
        "n" | "narration" => Ok(EditChoice::Narration),
        "t" | "tags" => Ok(EditChoice::Tags),
        "l" | "links" => Ok(EditChoice::Links),
        "o" | "postings" => Ok(EditChoice::Postings),
        "" | "s" | "save" => Ok(EditChoice::Save),
        _ => Err("Please enter a valid response".to_owned()),
    }
}

pub struct TerminalPrompts {
    console: StyledConsole,
    accounts: Vec<String>,
    tags: Vec<String>,
    links: Vec<String>,
    payees: Vec<String>,
}

impl TerminalPrompts {
    pub fn new() -> Self {
        TerminalPrompts {
            console: StyledConsole::stdout(),
            accounts: Vec::new(),
            tags: Vec::new(),
            links: Vec::new(),
            payees: Vec::new(),
        }
    }

    /// The edit menu, returning to it when a field prompt is cancelled.
    fn edit_menu(&mut self, entry: &LedgerEntry) -> Option<Edit> {
        loop {
            let prompt = Prompt::new("...Edit transaction? > ", EDIT_TOOLBAR);
            let choice = ask(&mut self.console, prompt, parse_edit_choice)?;

            let edit = match choice {
                EditChoice::Save => return Some(Edit::Save),
                EditChoice::Postings => return Some(Edit::Postings),
                EditChoice::Date => {
                    let prompt = Prompt::new("...Enter a new date (YYYY-MM-DD) > ", CANCEL_TOOLBAR);
                    ask(&mut self.console, prompt, |text| {
                        validate::parse_date(text).map_err(|e| e.to_string())
                    })
                    .map(Edit::Date)
                }
                EditChoice::Flag => {
                    let prompt = Prompt::new("...Enter a new flag [!/*] > ", CANCEL_TOOLBAR);
                    ask(&mut self.console, prompt, |text| {
                        text.parse::<Flag>().map_err(|e| e.to_string())
                    })
                    .map(Edit::Flag)
                }
                EditChoice::Payee => {
                    let prompt = Prompt::new("...Enter new payee > ", CANCEL_TOOLBAR)
                        .prefill(entry.payee.clone().unwrap_or_default())
                        .completions(&self.payees);
                    ask(&mut self.console, prompt, parse_required).map(Edit::Payee)
                }
                EditChoice::Narration => {
                    let prompt = Prompt::new("...Enter new narration > ", CANCEL_TOOLBAR)
                        .prefill(entry.narration.clone().unwrap_or_default());
                    ask(&mut self.console, prompt, parse_required).map(Edit::Narration)
                }
                EditChoice::Tags => {
                    let current: Vec<&str> = entry.tags.iter().map(String::as_str).collect();
                    let prompt = Prompt::new(
                        "...Enter a list of tags separated by spaces > ",
                        CANCEL_TOOLBAR,
                    )
                    .prefill(current.join(" "))
                    .completions(&self.tags);
                    ask(&mut self.console, prompt, |text| {
                        validate::parse_tags(text).map_err(|e| e.to_string())
                    })
                    .map(Edit::Tags)
                }
                EditChoice::Links => {
                    let current: Vec<&str> = entry.links.iter().map(String::as_str).collect();
                    let prompt = Prompt::new(
                        "...Enter a list of links separated by spaces > ",
                        CANCEL_TOOLBAR,
                    )
                    .prefill(current.join(" "))
                    .completions(&self.links);
                    ask(&mut self.console, prompt, |text| {
                        validate::parse_tags(text).map_err(|e| e.to_string())
                    })
                    .map(Edit::Links)
                }
            };
            if edit.is_some() {
                return edit;
            }
        }
    }
}

impl Default for TerminalPrompts {
    fn default() -> Self {
        TerminalPrompts::new()
    }
}

impl ComposePrompts for TerminalPrompts {
    fn total(&mut self, default: Decimal) -> Option<Decimal> {
        let prompt =
            Prompt::new("...Update total amount? > ", CANCEL_TOOLBAR).prefill(format_amount(default));
        ask(&mut self.console, prompt, parse_amount)
    }

    fn posting(&mut self, request: &PostingRequest) -> Option<PostingInput> {
        let toolbar = format!(
            "({}) left  {CANCEL_TOOLBAR}",
            format_amount(request.default_amount)
        );
        let label = |field: &str| {
            Line::plain("...")
                .push(request.side.tone(), request.side.label())
                .push(Tone::Plain, format!(" {field} > "))
        };

        let prompt = Prompt {
            label: label("account"),
            default: request.default_account.clone().unwrap_or_default(),
            toolbar: &toolbar,
            completions: &self.accounts,
        };
        let account = ask(&mut self.console, prompt, |text| {
            validate::parse_account(text).map_err(|e| e.to_string())
        })?;

        let prompt = Prompt {
            label: label("amount"),
            default: format_amount(request.default_amount),
            toolbar: &toolbar,
            completions: &[],
        };
        let amount = ask(&mut self.console, prompt, parse_amount)?;

        let currency = if request.ask_currency {
            let prompt = Prompt {
                label: label("currency"),
                default: request.default_currency.clone(),
                toolbar: &toolbar,
                completions: &[],
            };
            ask(&mut self.console, prompt, parse_required)?
        } else {
            request.default_currency.clone()
        };

        Some(PostingInput {
            account,
            amount,
            currency,
        })
    }

    fn edit(&mut self, entry: &LedgerEntry) -> Option<Edit> {
        self.edit_menu(entry)
    }
}

impl SessionPrompts for TerminalPrompts {
    fn ledger_loaded(&mut self, ledger: &Ledger) {
        self.accounts = ledger.accounts.clone();
        self.tags = ledger.tags.iter().cloned().collect();
        self.links = ledger.links.iter().cloned().collect();
        self.payees = ledger.payees.iter().cloned().collect();
    }

    fn account(&mut self, accounts: &[String]) -> Option<String> {
        let prompt = Prompt::new("Beancount account transactions belong to > ", CANCEL_TOOLBAR)
            .completions(accounts);
        ask(&mut self.console, prompt, |text| {
            validate::parse_account(text).map_err(|e| e.to_string())
        })
    }

    fn choose(&mut self, question: &str, count: usize) -> Option<usize> {
        let prompt = Prompt::new(format!("...{question} > "), CANCEL_TOOLBAR).prefill("0");
        ask(&mut self.console, prompt, |text| parse_choice(text, count))
    }

    fn resolve(&mut self, _txn: &ImportedTransaction) -> Resolution {
        let prompt = Prompt::new("...Reconcile, Insert or Skip? > ", RESOLVE_TOOLBAR);
        ask(&mut self.console, prompt, parse_resolution).unwrap_or(Resolution::Skip)
    }

    fn confirm(&mut self, question: &str, default: bool) -> bool {
        let (options, answer) = if default { ("[Y/n]", "y") } else { ("[y/N]", "n") };
        let prompt = Prompt::new(format!("{question} {options} > "), CONFIRM_TOOLBAR).prefill(answer);
        ask(&mut self.console, prompt, parse_confirm).unwrap_or(default)
    }

    fn payee(&mut self, raw: &str, known: &[String]) -> Option<String> {
        let prompt =
            Prompt::new(format!("...Replace '{raw}'? > "), CANCEL_TOOLBAR).completions(known);
        ask(&mut self.console, prompt, |text| Ok(text.trim().to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn editing_keys() {
        let mut buffer = LineBuffer::new("12.50");
        buffer.move_left();
        buffer.move_left();
        buffer.backspace();
        buffer.insert('9');
        assert_eq!(buffer.text(), "1950");
        buffer.move_home();
        buffer.delete();
        assert_eq!((buffer.text().as_str(), buffer.cursor), ("950", 0));
        buffer.move_end();
        buffer.clear_before_cursor();
        assert_eq!(buffer.text(), "");
        buffer.backspace();
        buffer.move_left();
        assert_eq!(buffer.cursor, 0);
    }

    #[test]
    fn tab_cycles_through_fuzzy_matches() {
        let accounts = strings(&[
            "Assets:Checking",
            "Expenses:Food:Groceries",
            "Expenses:Food",
            "Income:Salary",
        ]);
        let mut buffer = LineBuffer::new("food");
        buffer.complete(&accounts);
        assert_eq!(buffer.text(), "Expenses:Food:Groceries");
        buffer.complete(&accounts);
        assert_eq!(buffer.text(), "Expenses:Food");
        buffer.complete(&accounts);
        assert_eq!(buffer.text(), "Expenses:Food:Groceries");

        buffer.insert(':');
        buffer.complete(&accounts);
        assert_eq!(buffer.text(), "Expenses:Food:Groceries:");

        let mut buffer = LineBuffer::new("zzz");
        buffer.complete(&accounts);
        assert_eq!(buffer.text(), "zzz");
    }

    #[test]
    fn fuzzy_prefers_whole_substrings() {
        let candidates = strings(&["Expenses:Home", "Expenses:Food", "Assets:Checking"]);
        assert_eq!(
            fuzzy_matches("ehm", &candidates),
            ["Expenses:Home"]
        );
        assert_eq!(
            fuzzy_matches("es:", &candidates),
            ["Expenses:Home", "Expenses:Food", "Assets:Checking"]
        );
        assert_eq!(fuzzy_matches("", &candidates).len(), 3);
    }

    #[test]
    fn option_answers() {
        assert_eq!(parse_resolution("R"), Ok(Resolution::Reconcile));
        assert_eq!(parse_resolution(" quit "), Ok(Resolution::Quit));
        assert!(parse_resolution("").is_err());
        assert!(parse_resolution("x").is_err());

        assert_eq!(parse_confirm("Y"), Ok(true));
        assert_eq!(parse_confirm("no"), Ok(false));
        assert!(parse_confirm("maybe").is_err());

        assert_eq!(parse_choice("1", 2), Ok(1));
        assert!(parse_choice("2", 2).is_err());
        assert!(parse_choice("-1", 2).is_err());

        assert_eq!(parse_edit_choice(""), Ok(EditChoice::Save));
        assert_eq!(parse_edit_choice("o"), Ok(EditChoice::Postings));
        assert_eq!(parse_edit_choice("Narration"), Ok(EditChoice::Narration));
        assert!(parse_edit_choice("x").is_err());
    }

    #[test]
    fn amounts_accept_expressions() {
        assert_eq!(parse_amount("10/3"), Ok("3.33".parse().unwrap()));
        assert!(parse_amount("1/0").is_err());
        assert_eq!(parse_required("  EUR "), Ok("EUR".to_owned()));
        assert!(parse_required(" ").is_err());
    }
}
