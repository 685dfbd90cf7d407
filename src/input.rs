//! Typed line commands.
//!
//! Stand-in for the presentation layer: each line is one user gesture,
//! addressed by category and 0-based position. Sections after the name are
//! separated by `|`:
//!
//! ```text
//! add todo Buy milk | semi-skimmed | 2024-01-03 | shop,errand
//! edit todo 0 Buy oat milk | | 2024-01-04
//! edit todo 0 Buy oat milk | - | | -
//! toggle todo 0
//! move backlog 3 0
//! rm request 1
//! sweep [category]
//! list | save | quit
//! ```
//!
//! An empty section means "not given": today / blank on add, unchanged on edit.
//! A lone `-` in the details or labels section clears it.

use crate::board::{Board, Category, Command, ParseCategoryError, TaskFields, TaskRecord};
use chrono::NaiveDate;

const DATE_FORMAT: &str = "%Y-%m-%d";
const CLEAR: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    List,
    Save,
    Quit,
    Add { category: Category, fields: FieldArgs },
    Edit { category: Category, index: usize, fields: FieldArgs },
    Toggle { category: Category, index: usize },
    Move { category: Category, from: usize, to: usize },
    Remove { category: Category, index: usize },
    Sweep { category: Option<Category> },
}

/// Name plus whichever optional sections were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldArgs {
    pub name: String,
    pub details: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("unknown command {0:?} (try: list, add, edit, toggle, move, rm, sweep, save, quit)")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Category(#[from] ParseCategoryError),
    #[error("not a position: {0:?}")]
    BadIndex(String),
    #[error("not a yyyy-mm-dd date: {0:?}")]
    BadDate(String),
    #[error("no task at {category} {index}")]
    NoSuchTask { category: Category, index: usize },
}

const ADD_USAGE: &str = "add <category> <name> [| details | yyyy-mm-dd | label,label]";
const EDIT_USAGE: &str =
    "edit <category> <n> <name> [| details | yyyy-mm-dd | label,label] (empty keeps, - clears)";
const TOGGLE_USAGE: &str = "toggle <category> <n>";
const MOVE_USAGE: &str = "move <category> <from> <to>";
const RM_USAGE: &str = "rm <category> <n>";
const SWEEP_USAGE: &str = "sweep [category]";

/// Parse one line. Blank lines are `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<Input>, InputError> {
    let (verb, rest) = split_word(line);

    let input = match verb.to_ascii_lowercase().as_str() {
        "" => return Ok(None),
        "list" | "ls" => Input::List,
        "save" => Input::Save,
        "quit" | "exit" => Input::Quit,
        "add" => {
            let (category, rest) = category_arg(rest, ADD_USAGE)?;
            Input::Add { category, fields: parse_fields(rest, ADD_USAGE)? }
        }
        "edit" => {
            let (category, rest) = category_arg(rest, EDIT_USAGE)?;
            let (index, rest) = index_arg(rest, EDIT_USAGE)?;
            Input::Edit { category, index, fields: parse_fields(rest, EDIT_USAGE)? }
        }
        "toggle" | "done" => {
            let (category, rest) = category_arg(rest, TOGGLE_USAGE)?;
            let (index, rest) = index_arg(rest, TOGGLE_USAGE)?;
            no_more(rest, TOGGLE_USAGE)?;
            Input::Toggle { category, index }
        }
        "move" | "mv" => {
            let (category, rest) = category_arg(rest, MOVE_USAGE)?;
            let (from, rest) = index_arg(rest, MOVE_USAGE)?;
            let (to, rest) = index_arg(rest, MOVE_USAGE)?;
            no_more(rest, MOVE_USAGE)?;
            Input::Move { category, from, to }
        }
        "rm" | "remove" => {
            let (category, rest) = category_arg(rest, RM_USAGE)?;
            let (index, rest) = index_arg(rest, RM_USAGE)?;
            no_more(rest, RM_USAGE)?;
            Input::Remove { category, index }
        }
        "sweep" => {
            let (word, rest) = split_word(rest);
            no_more(rest, SWEEP_USAGE)?;
            let category = if word.is_empty() { None } else { Some(word.parse()?) };
            Input::Sweep { category }
        }
        other => return Err(InputError::UnknownCommand(other.to_string())),
    };
    Ok(Some(input))
}

impl Input {
    /// Turn a positional request into a board command. `None` for inputs the
    /// session handles itself (list, save, quit).
    pub fn to_command(&self, board: &Board) -> Result<Option<Command>, InputError> {
        let cmd = match self {
            Input::List | Input::Save | Input::Quit => return Ok(None),
            Input::Add { category, fields } => Command::AddTask {
                category: *category,
                name: fields.name.clone(),
                details: fields.details.clone().unwrap_or_default(),
                due_date: fields.due_date,
                labels: fields.labels.clone().unwrap_or_default(),
            },
            Input::Edit { category, index, fields } => {
                let task = task_at(board, *category, *index)?;
                Command::EditTask {
                    task_id: task.id,
                    fields: TaskFields {
                        name: fields.name.clone(),
                        details: fields.details.clone().unwrap_or_else(|| task.details.clone()),
                        due_date: fields.due_date.unwrap_or(task.due_date),
                        labels: fields.labels.clone().unwrap_or_else(|| task.labels.clone()),
                    },
                }
            }
            Input::Toggle { category, index } => Command::ToggleCompleted {
                task_id: task_at(board, *category, *index)?.id,
            },
            Input::Move { category, from, to } => Command::MoveTask {
                category: *category,
                from: *from,
                to: *to,
            },
            Input::Remove { category, index } => Command::RemoveTask {
                task_id: task_at(board, *category, *index)?.id,
            },
            Input::Sweep { category } => Command::RemoveCompleted { category: *category },
        };
        Ok(Some(cmd))
    }
}

fn task_at(board: &Board, category: Category, index: usize) -> Result<&TaskRecord, InputError> {
    board
        .tasks(category)
        .get(index)
        .ok_or(InputError::NoSuchTask { category, index })
}

// ── Tokenizing ─────────────────────────────────────────────────

/// First whitespace-delimited word and the trimmed remainder.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn category_arg<'a>(s: &'a str, usage: &'static str) -> Result<(Category, &'a str), InputError> {
    let (word, rest) = split_word(s);
    if word.is_empty() {
        return Err(InputError::Usage(usage));
    }
    Ok((word.parse()?, rest))
}

fn index_arg<'a>(s: &'a str, usage: &'static str) -> Result<(usize, &'a str), InputError> {
    let (word, rest) = split_word(s);
    if word.is_empty() {
        return Err(InputError::Usage(usage));
    }
    let index = word
        .parse()
        .map_err(|_| InputError::BadIndex(word.to_string()))?;
    Ok((index, rest))
}

fn no_more(rest: &str, usage: &'static str) -> Result<(), InputError> {
    if rest.trim().is_empty() {
        Ok(())
    } else {
        Err(InputError::Usage(usage))
    }
}

/// `name | details | date | labels`, trailing sections optional.
fn parse_fields(s: &str, usage: &'static str) -> Result<FieldArgs, InputError> {
    let sections: Vec<&str> = s.split('|').map(str::trim).collect();
    if sections.len() > 4 {
        return Err(InputError::Usage(usage));
    }
    let given = |i: usize| sections.get(i).copied().filter(|s| !s.is_empty());

    let due_date = given(2)
        .map(|s| {
            NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| InputError::BadDate(s.to_string()))
        })
        .transpose()?;

    Ok(FieldArgs {
        name: sections[0].to_string(),
        details: given(1).map(|s| if s == CLEAR { String::new() } else { s.to_string() }),
        due_date,
        labels: given(3).map(|s| match s {
            CLEAR => Vec::new(),
            s => s.split(',').map(|l| l.trim().to_string()).collect(),
        }),
    })
}
