//! Console rendering of ingested items.
//!
//! Presentation only: the stored body is never wrapped.

use std::io::Write;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::feed::Item;

/// Separator printed after each echoed item.
pub const SEPARATOR: &str = "-----------------------------------------------------------";

/// Greedy word wrap. Whitespace runs collapse to single spaces and words
/// longer than `width` are split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > width {
            if line_len > 0 {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        if line_len > 0 && line_len + 1 + word.len() > width {
            lines.push(std::mem::take(&mut line));
            line_len = 0;
        }
        if line_len > 0 {
            line.push(' ');
            line_len += 1;
        }
        line_len += word.len();
        line.extend(word);
    }

    if line_len > 0 {
        lines.push(line);
    }
    lines
}

/// Render one item the way it is echoed to the console.
pub fn render(item: &Item, width: usize) -> String {
    let author = item.author.as_deref().unwrap_or("[deleted]");
    let body = item.body.as_deref().map(|b| wrap(b, width).join("\n")).unwrap_or_default();
    format!("u/{author}:\n{body}\n{SEPARATOR}")
}

/// Rendered items buffered between the loop and the console writer.
pub const ECHO_BUFFER: usize = 256;

/// Echoes items to the console without blocking the caller.
///
/// Rendering happens on the caller's side; writing happens on a blocking task
/// fed through a bounded channel. When the buffer is full (a stalled pipe) the
/// item is not echoed, and ingestion carries on.
#[derive(Debug)]
pub struct Echo {
    tx: Option<mpsc::Sender<String>>,
    writer: Option<JoinHandle<()>>,
    width: usize,
}

impl Echo {
    /// An echo that prints nothing (quiet mode).
    pub fn disabled() -> Self {
        Self {
            tx: None,
            writer: None,
            width: 0,
        }
    }

    /// Echo to stdout. Must be called inside a Tokio runtime.
    pub fn stdout(width: usize) -> Self {
        Self::spawn(std::io::stdout(), width, ECHO_BUFFER)
    }

    /// Echo to `out` through a buffer of `capacity` items.
    pub fn spawn<W>(mut out: W, width: usize, capacity: usize) -> Self
    where
        W: Write + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<String>(capacity.max(1));
        let writer = tokio::task::spawn_blocking(move || {
            while let Some(text) = rx.blocking_recv() {
                if writeln!(out, "{text}").and_then(|()| out.flush()).is_err() {
                    // Closed pipe: stop echoing, keep ingesting.
                    break;
                }
            }
        });

        Self {
            tx: Some(tx),
            writer: Some(writer),
            width,
        }
    }

    /// Queue `item` for printing. Never waits on the console.
    pub fn print(&self, item: &Item) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(render(item, self.width)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!(item_id = %item.id, "Console is not keeping up, item not echoed");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Flush what is buffered and stop the writer.
    pub async fn finish(mut self) {
        drop(self.tx.take());
        if let Some(writer) = self.writer.take() {
            let _ = writer.await;
        }
    }
}
