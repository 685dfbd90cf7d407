use crate::clock::Clock;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Labels kept per task; anything past this is dropped.
pub const MAX_LABELS: usize = 3;

// ── Entity types ──────────────────────────────────────────────

/// A tab on the board. Ordering follows the tab strip: ToDo, Request, Backlog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    ToDo,
    Request,
    Backlog,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::ToDo, Category::Request, Category::Backlog];

    /// The exact key used in the save file.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::ToDo => "ToDo",
            Category::Request => "Request",
            Category::Backlog => "Backlog",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0:?}")]
pub struct ParseCategoryError(pub String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    /// Case-insensitive, for typed input. The save file matches `as_str` exactly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

/// A single task. Plain data: the board owns it, presentation only reads it.
///
/// `id` lives in memory only. Records loaded from disk get fresh ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: Uuid,
    pub name: String,
    pub details: String,
    pub due_date: NaiveDate,
    pub labels: Vec<String>,
    pub completed: bool,
}

impl TaskRecord {
    /// Build an open record from user-supplied fields.
    pub fn from_fields(fields: TaskFields) -> Result<Self, BoardError> {
        let fields = fields.normalized()?;
        Ok(TaskRecord {
            id: Uuid::new_v4(),
            name: fields.name,
            details: fields.details,
            due_date: fields.due_date,
            labels: fields.labels,
            completed: false,
        })
    }
}

/// The editable field set of a task, as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFields {
    pub name: String,
    pub details: String,
    pub due_date: NaiveDate,
    pub labels: Vec<String>,
}

impl TaskFields {
    /// Blank details, no labels, due on `today`.
    pub fn named(name: impl Into<String>, today: NaiveDate) -> Self {
        TaskFields {
            name: name.into(),
            details: String::new(),
            due_date: today,
            labels: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = due_date;
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Trim the name (rejecting blanks) and clean up the labels.
    fn normalized(self) -> Result<Self, BoardError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(BoardError::EmptyName);
        }
        Ok(TaskFields {
            name: name.to_string(),
            details: self.details,
            due_date: self.due_date,
            labels: normalize_labels(&self.labels),
        })
    }
}

/// Trim each label, drop empties, keep the first `MAX_LABELS`.
/// Duplicates are left alone.
pub fn normalize_labels<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    labels
        .iter()
        .map(|l| l.as_ref().trim())
        .filter(|l| !l.is_empty())
        .take(MAX_LABELS)
        .map(str::to_string)
        .collect()
}

// ── Commands (presentation → board) ───────────────────────────

/// Something the user wants to happen. Validated by `Board::apply`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddTask {
        category: Category,
        name: String,
        details: String,
        /// None = due today.
        due_date: Option<NaiveDate>,
        labels: Vec<String>,
    },
    EditTask {
        task_id: Uuid,
        fields: TaskFields,
    },
    ToggleCompleted {
        task_id: Uuid,
    },
    MoveTask {
        category: Category,
        from: usize,
        to: usize,
    },
    RemoveTask {
        task_id: Uuid,
    },
    /// None sweeps every category.
    RemoveCompleted {
        category: Option<Category>,
    },
}

// ── Events (board → presentation) ─────────────────────────────

/// What actually happened. Carries the revision it was applied at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    TaskAdded {
        revision: u64,
        category: Category,
        task: TaskRecord,
    },
    TaskEdited {
        revision: u64,
        task_id: Uuid,
    },
    TaskToggled {
        revision: u64,
        task_id: Uuid,
        completed: bool,
    },
    TaskMoved {
        revision: u64,
        category: Category,
        from: usize,
        to: usize,
    },
    TaskRemoved {
        revision: u64,
        category: Category,
        task: TaskRecord,
    },
    CompletedRemoved {
        revision: u64,
        category: Option<Category>,
        removed: usize,
    },
}

impl Event {
    pub fn revision(&self) -> u64 {
        match self {
            Event::TaskAdded { revision, .. }
            | Event::TaskEdited { revision, .. }
            | Event::TaskToggled { revision, .. }
            | Event::TaskMoved { revision, .. }
            | Event::TaskRemoved { revision, .. }
            | Event::CompletedRemoved { revision, .. } => *revision,
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("task name must not be empty")]
    EmptyName,
    #[error("index out of range (from {from}, to {to}, len {len})")]
    IndexOutOfRange { from: usize, to: usize, len: usize },
    #[error("task not found")]
    TaskNotFound,
    #[error("category {0} is not on this board")]
    UnknownCategory(Category),
}

// ── The Board ──────────────────────────────────────────────────

/// Ordered task lists, one per configured category. Lives in memory and is
/// the source of truth between saves. Failed operations leave it untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    lists: BTreeMap<Category, Vec<TaskRecord>>,
    /// Bumped on every effective mutation. Compare against the value at the
    /// last save to know whether there is anything to write.
    pub revision: u64,
}

impl Board {
    /// An empty board with one list per category.
    pub fn new(categories: &[Category]) -> Self {
        Board {
            lists: categories.iter().map(|c| (*c, Vec::new())).collect(),
            revision: 0,
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.lists.keys().copied()
    }

    pub fn has_category(&self, category: Category) -> bool {
        self.lists.contains_key(&category)
    }

    /// Tasks in display order. Empty for a category the board doesn't have.
    pub fn tasks(&self, category: Category) -> &[TaskRecord] {
        self.lists.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of tasks across all categories.
    pub fn len(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, task_id: Uuid) -> Option<&TaskRecord> {
        self.lists.values().flatten().find(|t| t.id == task_id)
    }

    /// Category and position of a task (linear scan, lists are short).
    pub fn locate(&self, task_id: Uuid) -> Option<(Category, usize)> {
        self.lists.iter().find_map(|(category, tasks)| {
            tasks
                .iter()
                .position(|t| t.id == task_id)
                .map(|index| (*category, index))
        })
    }

    /// Apply a command. This is the single mutation codepath used by the host;
    /// the named operations below are what it dispatches to.
    pub fn apply(&mut self, cmd: Command, clock: &dyn Clock) -> Result<Event, BoardError> {
        match cmd {
            Command::AddTask { category, name, details, due_date, labels } => {
                let fields = TaskFields::named(name, due_date.unwrap_or_else(|| clock.today()))
                    .with_details(details)
                    .with_labels(labels);
                self.add(category, fields)
            }
            Command::EditTask { task_id, fields } => self.edit(task_id, fields),
            Command::ToggleCompleted { task_id } => self.toggle_completed(task_id),
            Command::MoveTask { category, from, to } => self.reorder(category, from, to),
            Command::RemoveTask { task_id } => self.remove(task_id),
            Command::RemoveCompleted { category: Some(category) } => self.remove_completed(category),
            Command::RemoveCompleted { category: None } => Ok(self.remove_completed_all()),
        }
    }

    /// Append a new open task to the end of `category`.
    pub fn add(&mut self, category: Category, fields: TaskFields) -> Result<Event, BoardError> {
        let task = TaskRecord::from_fields(fields)?;
        self.list_mut(category)?.push(task.clone());

        let revision = self.bump();
        Ok(Event::TaskAdded { revision, category, task })
    }

    /// Replace every editable field at once, or none of them.
    pub fn edit(&mut self, task_id: Uuid, fields: TaskFields) -> Result<Event, BoardError> {
        let fields = fields.normalized()?;
        let task = self.task_mut(task_id)?;

        task.name = fields.name;
        task.details = fields.details;
        task.due_date = fields.due_date;
        task.labels = fields.labels;

        let revision = self.bump();
        Ok(Event::TaskEdited { revision, task_id })
    }

    pub fn toggle_completed(&mut self, task_id: Uuid) -> Result<Event, BoardError> {
        let task = self.task_mut(task_id)?;
        task.completed = !task.completed;
        let completed = task.completed;

        let revision = self.bump();
        Ok(Event::TaskToggled { revision, task_id, completed })
    }

    /// Move the task at `from` so it ends up at `to`, shifting the ones between.
    pub fn reorder(&mut self, category: Category, from: usize, to: usize) -> Result<Event, BoardError> {
        let list = self.list_mut(category)?;
        let len = list.len();
        if from >= len || to >= len {
            return Err(BoardError::IndexOutOfRange { from, to, len });
        }

        let task = list.remove(from);
        list.insert(to, task);

        let revision = self.bump();
        Ok(Event::TaskMoved { revision, category, from, to })
    }

    pub fn remove(&mut self, task_id: Uuid) -> Result<Event, BoardError> {
        let (category, index) = self.locate(task_id).ok_or(BoardError::TaskNotFound)?;
        let task = self.list_mut(category)?.remove(index);

        let revision = self.bump();
        Ok(Event::TaskRemoved { revision, category, task })
    }

    /// Drop every completed task in `category`, keeping the order of the rest.
    /// Removing nothing leaves the revision alone.
    pub fn remove_completed(&mut self, category: Category) -> Result<Event, BoardError> {
        let removed = sweep(self.list_mut(category)?);
        let revision = if removed > 0 { self.bump() } else { self.revision };
        Ok(Event::CompletedRemoved { revision, category: Some(category), removed })
    }

    pub fn remove_completed_all(&mut self) -> Event {
        let removed: usize = self.lists.values_mut().map(sweep).sum();
        let revision = if removed > 0 { self.bump() } else { self.revision };
        Event::CompletedRemoved { revision, category: None, removed }
    }

    /// Install a list read from disk. Does not count as a mutation.
    pub(crate) fn restore(&mut self, category: Category, tasks: Vec<TaskRecord>) {
        if let Some(list) = self.lists.get_mut(&category) {
            *list = tasks;
        }
    }

    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn list_mut(&mut self, category: Category) -> Result<&mut Vec<TaskRecord>, BoardError> {
        self.lists
            .get_mut(&category)
            .ok_or(BoardError::UnknownCategory(category))
    }

    fn task_mut(&mut self, task_id: Uuid) -> Result<&mut TaskRecord, BoardError> {
        self.lists
            .values_mut()
            .flatten()
            .find(|t| t.id == task_id)
            .ok_or(BoardError::TaskNotFound)
    }
}

fn sweep(tasks: &mut Vec<TaskRecord>) -> usize {
    let before = tasks.len();
    tasks.retain(|t| !t.completed);
    before - tasks.len()
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_board() -> Board {
        Board::new(&Category::ALL)
    }

    fn add_task(b: &mut Board, category: Category, name: &str) -> Uuid {
        match b.add(category, TaskFields::named(name, day(2024, 1, 1))).unwrap() {
            Event::TaskAdded { task, .. } => task.id,
            _ => panic!("expected TaskAdded"),
        }
    }

    fn names(b: &Board, category: Category) -> Vec<&str> {
        b.tasks(category).iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn add_appends_open_task() {
        let mut b = test_board();
        add_task(&mut b, Category::ToDo, "First");
        let id = add_task(&mut b, Category::ToDo, "  Second  ");

        assert_eq!(names(&b, Category::ToDo), ["First", "Second"]);
        let task = b.get(id).unwrap();
        assert!(!task.completed);
        assert_eq!(task.details, "");
        assert!(task.labels.is_empty());
        assert_eq!(b.revision, 2);
    }

    #[test]
    fn add_rejects_empty_name() {
        let mut b = test_board();
        add_task(&mut b, Category::ToDo, "Keep");

        for name in ["", "   "] {
            let result = b.add(Category::ToDo, TaskFields::named(name, day(2024, 1, 1)));
            assert_eq!(result.unwrap_err(), BoardError::EmptyName);
        }
        assert_eq!(names(&b, Category::ToDo), ["Keep"]);
        assert_eq!(b.revision, 1);
    }

    #[test]
    fn add_to_missing_category_rejected() {
        let mut b = Board::new(&[Category::ToDo, Category::Backlog]);
        let result = b.add(Category::Request, TaskFields::named("Ask", day(2024, 1, 1)));
        assert_eq!(result.unwrap_err(), BoardError::UnknownCategory(Category::Request));
        assert!(b.is_empty());
    }

    #[test]
    fn labels_truncated_to_first_three_non_empty() {
        let mut b = test_board();
        let fields = TaskFields::named("Tagged", day(2024, 1, 1))
            .with_labels(["", "a", " b ", "a", "c", "d"]);
        let event = b.add(Category::Backlog, fields).unwrap();

        match event {
            Event::TaskAdded { task, .. } => assert_eq!(task.labels, ["a", "b", "a"]),
            _ => panic!("expected TaskAdded"),
        }
    }

    #[test]
    fn apply_add_defaults_due_date_to_today() {
        let mut b = test_board();
        let clock = ManualClock::new(day(2024, 3, 15));
        let event = b
            .apply(
                Command::AddTask {
                    category: Category::ToDo,
                    name: "Call mum".into(),
                    details: String::new(),
                    due_date: None,
                    labels: vec![],
                },
                &clock,
            )
            .unwrap();

        match event {
            Event::TaskAdded { task, revision, .. } => {
                assert_eq!(task.due_date, day(2024, 3, 15));
                assert_eq!(revision, 1);
            }
            _ => panic!("expected TaskAdded"),
        }
    }

    #[test]
    fn edit_replaces_all_fields() {
        let mut b = test_board();
        let id = add_task(&mut b, Category::ToDo, "Buy milk");

        let fields = TaskFields::named("Buy oat milk", day(2024, 2, 2))
            .with_details("the barista one")
            .with_labels(["shop"]);
        b.edit(id, fields).unwrap();

        let task = b.get(id).unwrap();
        assert_eq!(task.name, "Buy oat milk");
        assert_eq!(task.details, "the barista one");
        assert_eq!(task.due_date, day(2024, 2, 2));
        assert_eq!(task.labels, ["shop"]);
    }

    #[test]
    fn edit_with_empty_name_keeps_prior_state() {
        let mut b = test_board();
        let id = add_task(&mut b, Category::ToDo, "Buy milk");
        let before = b.get(id).unwrap().clone();

        let fields = TaskFields::named("", day(2030, 1, 1))
            .with_details("changed")
            .with_labels(["x"]);
        assert_eq!(b.edit(id, fields).unwrap_err(), BoardError::EmptyName);

        assert_eq!(b.get(id).unwrap(), &before);
        assert_eq!(b.revision, 1);
    }

    #[test]
    fn edit_unknown_task() {
        let mut b = test_board();
        let result = b.edit(Uuid::new_v4(), TaskFields::named("x", day(2024, 1, 1)));
        assert_eq!(result.unwrap_err(), BoardError::TaskNotFound);
    }

    #[test]
    fn toggle_flips_only_completed() {
        let mut b = test_board();
        let id = add_task(&mut b, Category::Request, "Review PR");
        let before = b.get(id).unwrap().clone();

        let event = b.toggle_completed(id).unwrap();
        assert!(matches!(event, Event::TaskToggled { completed: true, .. }));
        let after = b.get(id).unwrap();
        assert!(after.completed);
        assert_eq!(after.name, before.name);
        assert_eq!(after.due_date, before.due_date);

        b.toggle_completed(id).unwrap();
        assert!(!b.get(id).unwrap().completed);
    }

    #[test]
    fn reorder_moves_and_shifts() {
        let mut b = test_board();
        for name in ["a", "b", "c", "d"] {
            add_task(&mut b, Category::ToDo, name);
        }

        b.reorder(Category::ToDo, 0, 2).unwrap();
        assert_eq!(names(&b, Category::ToDo), ["b", "c", "a", "d"]);

        b.reorder(Category::ToDo, 3, 0).unwrap();
        assert_eq!(names(&b, Category::ToDo), ["d", "b", "c", "a"]);
    }

    #[test]
    fn reorder_is_a_permutation() {
        let mut b = test_board();
        for name in ["a", "b", "c", "d", "e"] {
            add_task(&mut b, Category::Backlog, name);
        }
        let mut original: Vec<Uuid> = b.tasks(Category::Backlog).iter().map(|t| t.id).collect();
        original.sort();

        for from in 0..5 {
            for to in 0..5 {
                b.reorder(Category::Backlog, from, to).unwrap();
                let mut ids: Vec<Uuid> = b.tasks(Category::Backlog).iter().map(|t| t.id).collect();
                ids.sort();
                assert_eq!(ids, original);
            }
        }
    }

    #[test]
    fn reorder_out_of_range_rejected() {
        let mut b = test_board();
        add_task(&mut b, Category::ToDo, "a");
        add_task(&mut b, Category::ToDo, "b");
        let rev_before = b.revision;

        let r = b.reorder(Category::ToDo, 2, 0);
        assert_eq!(r.unwrap_err(), BoardError::IndexOutOfRange { from: 2, to: 0, len: 2 });
        let r = b.reorder(Category::ToDo, 0, 5);
        assert_eq!(r.unwrap_err(), BoardError::IndexOutOfRange { from: 0, to: 5, len: 2 });

        assert_eq!(names(&b, Category::ToDo), ["a", "b"]);
        assert_eq!(b.revision, rev_before);
    }

    #[test]
    fn remove_task() {
        let mut b = test_board();
        let id = add_task(&mut b, Category::ToDo, "Doomed");
        add_task(&mut b, Category::ToDo, "Survivor");

        let event = b.remove(id).unwrap();
        assert!(matches!(event, Event::TaskRemoved { category: Category::ToDo, .. }));
        assert_eq!(names(&b, Category::ToDo), ["Survivor"]);

        assert_eq!(b.remove(id).unwrap_err(), BoardError::TaskNotFound);
    }

    #[test]
    fn remove_completed_keeps_order_and_is_idempotent() {
        let mut b = test_board();
        let ids: Vec<Uuid> = ["a", "b", "c", "d"]
            .iter()
            .map(|n| add_task(&mut b, Category::ToDo, n))
            .collect();
        b.toggle_completed(ids[0]).unwrap();
        b.toggle_completed(ids[2]).unwrap();

        let event = b.remove_completed(Category::ToDo).unwrap();
        assert!(matches!(event, Event::CompletedRemoved { removed: 2, .. }));
        assert_eq!(names(&b, Category::ToDo), ["b", "d"]);

        let once = b.clone();
        let event = b.remove_completed(Category::ToDo).unwrap();
        assert!(matches!(event, Event::CompletedRemoved { removed: 0, .. }));
        assert_eq!(b, once);
    }

    #[test]
    fn remove_completed_all_sweeps_every_category() {
        let mut b = test_board();
        let todo = add_task(&mut b, Category::ToDo, "done todo");
        add_task(&mut b, Category::ToDo, "open todo");
        let backlog = add_task(&mut b, Category::Backlog, "done backlog");
        add_task(&mut b, Category::Request, "open request");
        b.toggle_completed(todo).unwrap();
        b.toggle_completed(backlog).unwrap();

        let event = b.remove_completed_all();
        assert!(matches!(event, Event::CompletedRemoved { category: None, removed: 2, .. }));
        assert_eq!(names(&b, Category::ToDo), ["open todo"]);
        assert!(b.tasks(Category::Backlog).is_empty());
        assert_eq!(names(&b, Category::Request), ["open request"]);
    }

    #[test]
    fn failed_commands_dont_change_state() {
        let mut b = test_board();
        add_task(&mut b, Category::ToDo, "a");
        let before = b.clone();
        let clock = ManualClock::new(day(2024, 1, 1));

        let _ = b.apply(Command::RemoveTask { task_id: Uuid::new_v4() }, &clock);
        let _ = b.apply(Command::MoveTask { category: Category::ToDo, from: 0, to: 1 }, &clock);
        let _ = b.apply(
            Command::AddTask {
                category: Category::ToDo,
                name: " ".into(),
                details: String::new(),
                due_date: None,
                labels: vec![],
            },
            &clock,
        );

        assert_eq!(b, before);
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("todo".parse::<Category>().unwrap(), Category::ToDo);
        assert_eq!("Backlog".parse::<Category>().unwrap(), Category::Backlog);
        assert!("Someday".parse::<Category>().is_err());
    }
}
