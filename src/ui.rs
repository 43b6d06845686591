use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::engine::{Clock, TestResult};
use crate::overlay::{CharClass, Overlay};
use crate::session::Session;
use crate::storage::{recent, HistorySummary};
use crate::util::format_secs;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;
const RECENT_TESTS: usize = 8;

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn class_style(class: CharClass) -> Style {
    let dim_bold = bold().add_modifier(Modifier::DIM);
    match class {
        CharClass::Correct => bold().fg(Color::Green),
        CharClass::Incorrect => bold().fg(Color::Red),
        CharClass::Cursor => dim_bold.add_modifier(Modifier::UNDERLINED | Modifier::REVERSED),
        CharClass::Pending => dim_bold,
    }
}

/// Turns overlay rows into styled lines, one span per run of equal class
pub fn overlay_lines(overlay: &Overlay) -> Vec<Line<'static>> {
    overlay
        .lines()
        .into_iter()
        .map(|row| {
            let spans: Vec<Span<'static>> = row
                .into_iter()
                .chunk_by(|(_, class)| *class)
                .into_iter()
                .map(|(class, run)| {
                    let text: String = run
                        .map(|(ch, _)| match (ch, class) {
                            // a mistyped space would be invisible
                            (' ', CharClass::Incorrect) => '·',
                            (ch, _) => ch,
                        })
                        .collect();
                    Span::styled(text, class_style(class))
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

/// First overlay row to draw so the cursor row stays within `visible` rows.
/// Past the end of the text there is no cursor; the last typed row is kept instead.
fn scroll_offset(rows: &[Vec<(char, CharClass)>], visible: usize) -> usize {
    let cursor_row = rows
        .iter()
        .position(|row| row.iter().any(|(_, class)| *class == CharClass::Cursor))
        .or_else(|| {
            rows.iter()
                .rposition(|row| row.iter().any(|(_, class)| *class != CharClass::Pending))
        })
        .unwrap_or(0);
    (cursor_row + 1).saturating_sub(visible.max(1))
}

/// Live view while a test runs: stats on top, overlay below
pub struct TypingView<'a, C: Clock> {
    pub session: &'a Session<C>,
}

impl<C: Clock> Widget for &TypingView<'_, C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let overlay = self.session.overlay();
        let rows = overlay.lines();
        let lines = overlay_lines(&overlay);
        let text_height = (lines.len() as u16).saturating_add(2);
        let inner_width = area.width.saturating_sub(HORIZONTAL_MARGIN * 2 + 2) as usize;
        let fits_one_line = rows.len() == 1
            && rows[0]
                .iter()
                .map(|(ch, _)| ch)
                .collect::<String>()
                .width()
                <= inner_width;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(text_height.min(area.height.saturating_sub(6))),
                Constraint::Length(3),
            ])
            .split(area);

        Paragraph::new(Span::styled(self.session.stats_line(), bold()))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(" Typing Test "))
            .render(chunks[0], buf);

        let visible_rows = chunks[1].height.saturating_sub(2) as usize;
        let scroll = u16::try_from(scroll_offset(&rows, visible_rows)).unwrap_or(u16::MAX);

        Paragraph::new(lines)
            .scroll((scroll, 0))
            // a short prompt sits centered, anything longer reads left to right
            .alignment(if fits_one_line {
                Alignment::Center
            } else {
                Alignment::Left
            })
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Type this text "),
            )
            .render(chunks[1], buf);

        Paragraph::new(Span::styled(
            "type to start / (backspace) correct / (esc) abort",
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);
    }
}

/// Final numbers for a finished test
pub struct ResultsView<'a> {
    pub result: &'a TestResult,
    /// Outcome of persisting the result, shown under the numbers
    pub save_message: &'a str,
}

impl Widget for &ResultsView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let r = self.result;
        let lines = vec![
            Line::from(Span::styled(
                format!("{:.2} wpm   {:.2}% acc", r.wpm, r.accuracy),
                bold(),
            )),
            Line::from(format!(
                "time {}   words {}   errors {}   chars {}",
                format_secs(r.elapsed.as_secs_f64()),
                r.total_words,
                r.errors,
                r.total_chars
            )),
            Line::from(""),
            Line::from(Span::styled(
                self.save_message.to_string(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "(space) new test / (h)istory / (esc)ape",
                Style::default().add_modifier(Modifier::ITALIC),
            )),
        ];

        let height = lines.len() as u16 + 2;
        let top = area.height.saturating_sub(height) / 2;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(top),
                Constraint::Length(height),
                Constraint::Min(0),
            ])
            .split(area);

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Test Complete "),
            )
            .render(chunks[1], buf);
    }
}

/// Aggregates and the most recent tests from the result log
pub struct HistoryView<'a> {
    pub results: &'a [TestResult],
}

impl Widget for &HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(7),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(area);

        let summary = match HistorySummary::from_results(self.results) {
            Some(s) => vec![
                Line::from(format!("Total tests: {}", s.total_tests)),
                Line::from(format!("Average WPM: {:.2}", s.average_wpm)),
                Line::from(format!("Best WPM: {:.2}", s.best_wpm)),
                Line::from(format!("WPM std dev: {:.2}", s.wpm_std_dev)),
                Line::from(format!("Average Accuracy: {:.2}%", s.average_accuracy)),
            ],
            None => vec![
                Line::from(Span::styled("No test results found.", bold())),
                Line::from("Complete a typing test to see your statistics here!"),
            ],
        };
        Paragraph::new(summary)
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Your Statistics "),
            )
            .render(chunks[0], buf);

        let rows: Vec<Line> = recent(self.results, RECENT_TESTS)
            .iter()
            .rev()
            .map(|r| {
                Line::from(vec![
                    Span::styled(
                        format!("{}: ", r.timestamp.format("%b %e %H:%M")),
                        Style::default().add_modifier(Modifier::DIM),
                    ),
                    Span::raw(format!("{:.2} WPM, {:.2}% accuracy", r.wpm, r.accuracy)),
                ])
            })
            .collect();
        Paragraph::new(rows)
            .block(Block::default().borders(Borders::ALL).title(" Recent Tests "))
            .render(chunks[1], buf);

        Paragraph::new(Span::styled(
            "(esc) back",
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);
    }
}
