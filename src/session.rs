//! The host loop.
//!
//! One task, one thread: user input, the rollover ticker and shutdown are
//! multiplexed with `select!`, so the board is owned here and never locked.
//!
//! - Input lines are parsed (input.rs), applied to the board, answered
//! - Every tick runs the rollover check
//! - Quit, end of input or the shutdown signal end the loop; the board is
//!   saved exactly once on the way out

use crate::board::{Board, Event};
use crate::clock::Clock;
use crate::input::{self, Input};
use crate::persist::{SaveFileError, TaskFile};
use crate::rollover::Rollover;
use std::fmt::Write as _;
use std::future::Future;
use std::io;
use std::str::Utf8Error;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Shortest rollover polling period; `tokio::time::interval` rejects zero.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("save failed: {0}")]
    Save(#[from] SaveFileError),
}

pub struct Session<C: Clock> {
    board: Board,
    file: TaskFile,
    clock: C,
    rollover: Rollover,
    tick_interval: Duration,
}

impl<C: Clock> Session<C> {
    /// The rollover baseline is the clock's date right now. `tick_interval`
    /// is raised to at least `MIN_TICK_INTERVAL`.
    pub fn new(board: Board, file: TaskFile, clock: C, tick_interval: Duration) -> Self {
        let rollover = Rollover::new(&clock);
        let tick_interval = tick_interval.max(MIN_TICK_INTERVAL);
        Session { board, file, clock, rollover, tick_interval }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Drive the session until quit, end of input, or `shutdown` resolves.
    /// Saves once before returning, even when reading input or writing a
    /// reply failed; that failure is returned after the save.
    pub async fn run<R, W, S>(&mut self, input: R, output: &mut W, shutdown: S) -> Result<(), SessionError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        S: Future<Output = ()>,
    {
        let mut lines = input.split(b'\n');
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the baseline is already set.
        ticker.tick().await;
        tokio::pin!(shutdown);

        info!(interval_secs = self.tick_interval.as_secs(), "session started");

        let outcome: Result<(), SessionError> = loop {
            tokio::select! {
                segment = lines.next_segment() => {
                    let segment = match segment {
                        Ok(Some(segment)) => segment,
                        Ok(None) => {
                            info!("input closed");
                            break Ok(());
                        }
                        Err(e) => {
                            warn!("cannot read input: {e}");
                            break Err(e.into());
                        }
                    };
                    let (flow, reply) = match decode_line(&segment) {
                        Ok(line) => self.handle_line(line),
                        Err(e) => {
                            warn!("bad input: {e}");
                            (Flow::Continue, Some("error: input is not valid UTF-8".to_string()))
                        }
                    };
                    if let Some(reply) = reply {
                        if let Err(e) = write_reply(output, &reply).await {
                            warn!("cannot write reply: {e}");
                            break Err(e.into());
                        }
                    }
                    if flow == Flow::Quit {
                        break Ok(());
                    }
                }
                _ = ticker.tick() => {
                    self.tick();
                }
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break Ok(());
                }
            }
        };

        let saved = self.save();
        match (outcome, saved) {
            (Err(e), Err(save)) => {
                error!("save failed: {save}");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), saved) => saved.map_err(Into::into),
        }
    }

    /// Run the rollover check once.
    pub fn tick(&mut self) -> Option<usize> {
        self.rollover.tick(&mut self.board, &self.clock)
    }

    pub fn save(&self) -> Result<(), SaveFileError> {
        self.file.save_board(&self.board)
    }

    /// Parse and apply one line. Errors are answered, never fatal.
    pub fn handle_line(&mut self, line: &str) -> (Flow, Option<String>) {
        let input = match input::parse_line(line) {
            Ok(Some(input)) => input,
            Ok(None) => return (Flow::Continue, None),
            Err(e) => {
                warn!(line, "bad input: {e}");
                return (Flow::Continue, Some(format!("error: {e}")));
            }
        };

        match input {
            Input::Quit => return (Flow::Quit, None),
            Input::List => return (Flow::Continue, Some(render_board(&self.board))),
            Input::Save => {
                let reply = match self.save() {
                    Ok(()) => "saved".to_string(),
                    Err(e) => {
                        warn!("save failed: {e}");
                        format!("error: {e}")
                    }
                };
                return (Flow::Continue, Some(reply));
            }
            _ => {}
        }

        let cmd = match input.to_command(&self.board) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => return (Flow::Continue, None),
            Err(e) => {
                warn!(line, "bad input: {e}");
                return (Flow::Continue, Some(format!("error: {e}")));
            }
        };

        match self.board.apply(cmd, &self.clock) {
            Ok(event) => {
                debug!(revision = event.revision(), ?event, "applied");
                (Flow::Continue, Some(describe(&event)))
            }
            Err(e) => {
                warn!("command rejected: {e}");
                (Flow::Continue, Some(format!("error: {e}")))
            }
        }
    }
}

/// One input line without its terminator (`\n` already split off, `\r` here).
fn decode_line(segment: &[u8]) -> Result<&str, Utf8Error> {
    std::str::from_utf8(segment.strip_suffix(b"\r").unwrap_or(segment))
}

async fn write_reply<W: AsyncWrite + Unpin>(output: &mut W, reply: &str) -> io::Result<()> {
    output.write_all(reply.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}

/// One-line confirmation for an applied event.
fn describe(event: &Event) -> String {
    match event {
        Event::TaskAdded { category, task, .. } => format!("added {:?} to {category}", task.name),
        Event::TaskEdited { .. } => "updated".to_string(),
        Event::TaskToggled { completed: true, .. } => "done".to_string(),
        Event::TaskToggled { completed: false, .. } => "reopened".to_string(),
        Event::TaskMoved { category, from, to, .. } => format!("moved {category} {from} -> {to}"),
        Event::TaskRemoved { task, .. } => format!("removed {:?}", task.name),
        Event::CompletedRemoved { removed, .. } => format!("cleared {removed} completed"),
    }
}

/// Plain-text listing, one block per category.
///
/// ```text
/// ToDo
///   0 [x] Buy milk  (due 2024-01-03) #shop
///         semi-skimmed
/// ```
pub fn render_board(board: &Board) -> String {
    let mut out = String::new();
    for category in board.categories() {
        let _ = writeln!(out, "{category}");
        let tasks = board.tasks(category);
        if tasks.is_empty() {
            let _ = writeln!(out, "  (empty)");
        }
        for (index, task) in tasks.iter().enumerate() {
            let mark = if task.completed { 'x' } else { ' ' };
            let _ = write!(out, "  {index} [{mark}] {}  (due {})", task.name, task.due_date);
            for label in &task.labels {
                let _ = write!(out, " #{label}");
            }
            out.push('\n');
            if !task.details.is_empty() {
                let _ = writeln!(out, "        {}", task.details);
            }
        }
    }
    out.truncate(out.trim_end().len());
    out
}
