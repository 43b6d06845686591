//! Character-by-character view of the target text annotated with what the
//! user typed.
//!
//! The overlay is recomputed from scratch on every call. The text is a few
//! hundred characters at most, and a full pass stays correct under any edit,
//! including backspace removing characters in the middle of the view.

use crate::engine::{Clock, TestEngine};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LINE_WIDTH: usize = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Correct,
    Incorrect,
    Cursor,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayItem {
    Char { ch: char, class: CharClass },
    LineBreak,
}

/// Which typed text the overlay lines up against the target
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OverlayStyle {
    /// The full keystroke stream compared index by index with the joined text
    #[default]
    Stream,
    /// Each typed word compared with its own target word
    Word,
}

/// Classified characters plus soft line breaks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlay {
    items: Vec<OverlayItem>,
}

/// A classified char before line wrapping. `target` marks chars taken from the
/// target text, the only ones a wrap may be placed in front of.
#[derive(Debug, Clone, Copy)]
struct Cell {
    ch: char,
    class: CharClass,
    target: bool,
}

impl Overlay {
    /// Classifies `target` against `typed` index by index
    pub fn render(target: &str, typed: &str, width: usize) -> Self {
        Self::wrap(classify(target, typed), width)
    }

    /// Builds the overlay for an engine in the given style. `stream` is the
    /// raw typed text kept by the caller; the word style ignores it and reads
    /// the engine's per-word buffers instead.
    pub fn from_engine<C: Clock>(
        engine: &TestEngine<C>,
        style: OverlayStyle,
        stream: &str,
        width: usize,
    ) -> Self {
        match style {
            OverlayStyle::Stream => {
                Self::render(&engine.target_words().iter().join(" "), stream, width)
            }
            OverlayStyle::Word => Self::wrap(
                classify_words(
                    engine.target_words(),
                    engine.committed_words(),
                    engine.current_typed_text(),
                ),
                width,
            ),
        }
    }

    fn wrap(cells: Vec<Cell>, width: usize) -> Self {
        let mut items = Vec::with_capacity(cells.len() + cells.len() / width.max(1));
        let mut column = 0;

        for cell in cells {
            // only break in front of a space from the target, never mid-word
            if cell.target && cell.ch == ' ' && column >= width {
                items.push(OverlayItem::LineBreak);
                column = 0;
            }
            items.push(OverlayItem::Char {
                ch: cell.ch,
                class: cell.class,
            });
            column += 1;
        }

        Self { items }
    }

    pub fn items(&self) -> &[OverlayItem] {
        &self.items
    }

    /// Classified chars only, line breaks dropped
    pub fn classes(&self) -> Vec<(char, CharClass)> {
        self.items
            .iter()
            .filter_map(|item| match *item {
                OverlayItem::Char { ch, class } => Some((ch, class)),
                OverlayItem::LineBreak => None,
            })
            .collect()
    }

    /// Rows as split by the soft wraps
    pub fn lines(&self) -> Vec<Vec<(char, CharClass)>> {
        let mut lines = vec![Vec::new()];
        for item in &self.items {
            match *item {
                OverlayItem::Char { ch, class } => {
                    if let Some(line) = lines.last_mut() {
                        line.push((ch, class));
                    }
                }
                OverlayItem::LineBreak => lines.push(Vec::new()),
            }
        }
        lines
    }
}

fn classify(target: &str, typed: &str) -> Vec<Cell> {
    let typed: Vec<char> = typed.chars().collect();
    let mut cells: Vec<Cell> = target
        .chars()
        .enumerate()
        .map(|(i, ch)| Cell {
            ch,
            class: match typed.get(i) {
                Some(&t) if t == ch => CharClass::Correct,
                Some(_) => CharClass::Incorrect,
                None if i == typed.len() => CharClass::Cursor,
                None => CharClass::Pending,
            },
            target: true,
        })
        .collect();

    let target_len = cells.len();
    cells.extend(typed.iter().skip(target_len).map(|&ch| Cell {
        ch,
        class: CharClass::Incorrect,
        target: false,
    }));
    cells
}

fn classify_words(targets: &[String], committed: &[String], current: &str) -> Vec<Cell> {
    let mut cells = Vec::new();

    for (i, word) in targets.iter().enumerate() {
        if i > 0 {
            let class = if i <= committed.len() {
                CharClass::Correct
            } else if i == committed.len() + 1
                && current.chars().count() >= targets[i - 1].chars().count()
            {
                // current word typed out (or overrun), the separating space is next
                CharClass::Cursor
            } else {
                CharClass::Pending
            };
            cells.push(Cell {
                ch: ' ',
                class,
                target: true,
            });
        }

        match i.cmp(&committed.len()) {
            std::cmp::Ordering::Less => {
                // missing chars are wrong, overflow was already counted and is hidden
                let typed: Vec<char> = committed[i].chars().collect();
                cells.extend(word.chars().enumerate().map(|(j, ch)| Cell {
                    ch,
                    class: if typed.get(j) == Some(&ch) {
                        CharClass::Correct
                    } else {
                        CharClass::Incorrect
                    },
                    target: true,
                }));
            }
            std::cmp::Ordering::Equal => cells.extend(classify(word, current)),
            std::cmp::Ordering::Greater => cells.extend(word.chars().map(|ch| Cell {
                ch,
                class: CharClass::Pending,
                target: true,
            })),
        }
    }

    cells
}
