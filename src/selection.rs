use std::fmt;
use std::io::{BufRead, Write};

use colored::Colorize;
use error_stack::{IntoReport, Report, ResultExt};

#[derive(Debug)]
pub struct SelectionError;

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Selection error")
    }
}

impl std::error::Error for SelectionError {}

pub type SelectionResult<T> = error_stack::Result<T, SelectionError>;

/// What to do after reading one line of input.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionStep {
    /// 0-based index of the chosen entry.
    Selected(usize),
    Retry(String),
    Abort,
}

/// Picks one of `count` entries numbered from 1.
#[derive(Debug, Clone, Copy)]
pub struct Selector {
    count: usize,
}

impl Selector {
    pub fn new(count: usize) -> Self {
        Self { count }
    }

    /// `None` means the input ended.
    pub fn step(&self, line: Option<&str>) -> SelectionStep {
        let Some(line) = line else {
            return SelectionStep::Abort;
        };
        match line.trim().parse::<usize>() {
            Ok(number) if (1..=self.count).contains(&number) => {
                SelectionStep::Selected(number - 1)
            }
            Ok(_) => SelectionStep::Retry(format!(
                "Please enter a number between 1 and {}.",
                self.count
            )),
            Err(_) => SelectionStep::Retry("Please enter a valid number.".to_string()),
        }
    }
}

/// How `export --playlist-id` refers to a playlist.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaylistRef {
    /// 1-based position in the playlist listing.
    Index(usize),
    Id(String),
}

impl PlaylistRef {
    pub fn parse(value: &str) -> Self {
        let is_number = !value.is_empty() && value.chars().all(|c| c.is_ascii_digit());
        if !is_number {
            return PlaylistRef::Id(value.to_string());
        }
        // too many digits for usize is still a number, just out of range
        PlaylistRef::Index(value.parse::<usize>().unwrap_or(usize::MAX))
    }

    /// 0-based index into a listing of `count` playlists.
    pub fn resolve_index(index: usize, count: usize) -> SelectionResult<usize> {
        if index == 0 || index > count {
            return Err(Report::new(SelectionError)
                .attach_printable(format!("number {index} out of range (1-{count})")));
        }
        Ok(index - 1)
    }
}

/// Prompts on `output` until `input` yields a valid choice. End of input aborts.
pub fn prompt_for_selection<I, O>(
    selector: Selector,
    mut input: I,
    mut output: O,
) -> SelectionResult<usize>
where
    I: BufRead,
    O: Write,
{
    loop {
        write!(output, "Select a playlist number: ")
            .and_then(|_| output.flush())
            .into_report()
            .change_context(SelectionError)?;

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .into_report()
            .change_context(SelectionError)?;
        let line = (read > 0).then_some(line.as_str());

        match selector.step(line) {
            SelectionStep::Selected(index) => return Ok(index),
            SelectionStep::Retry(message) => {
                writeln!(output, "{}", message.yellow())
                    .into_report()
                    .change_context(SelectionError)?;
            }
            SelectionStep::Abort => {
                writeln!(output).into_report().change_context(SelectionError)?;
                return Err(Report::new(SelectionError).attach_printable("No playlist selected"));
            }
        }
    }
}
