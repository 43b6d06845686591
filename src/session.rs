use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::config::Config;
use crate::engine::{Clock, Status, SystemClock, TestEngine};
use crate::overlay::{Overlay, OverlayStyle};
use crate::runtime::TypingEvent;

/// Keystrokes kept for the stream overlay
pub const MAX_INPUT_BUFFER: usize = 1600;

/// A key press after mapping from the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Char(char),
    Backspace,
    Abort,
}

impl Input {
    pub fn from_key(key: KeyEvent) -> Option<Self> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => Some(Input::Abort),
            KeyCode::Char('c') | KeyCode::Char('d') if ctrl => Some(Input::Abort),
            KeyCode::Backspace => Some(Input::Backspace),
            KeyCode::Char(_) if ctrl || key.modifiers.contains(KeyModifiers::ALT) => None,
            KeyCode::Char(c) if !c.is_control() => Some(Input::Char(c)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Finished,
    /// The user walked away from the test; nothing should be saved
    Aborted,
}

/// One typing test: the engine plus the raw keystroke stream the overlay
/// is drawn from. Every event goes through `handle`, so the engine only
/// ever sees one caller.
#[derive(Debug)]
pub struct Session<C: Clock = SystemClock> {
    engine: TestEngine<C>,
    typed: String,
    typed_len: usize,
    style: OverlayStyle,
    line_width: usize,
    allow_backspace: bool,
}

impl Session<SystemClock> {
    pub fn new(words: Vec<String>, config: &Config) -> Self {
        Self::with_engine(TestEngine::new(words, config.duration()), config)
    }
}

impl<C: Clock> Session<C> {
    pub fn with_engine(engine: TestEngine<C>, config: &Config) -> Self {
        Self {
            engine,
            typed: String::new(),
            typed_len: 0,
            style: config.overlay,
            line_width: config.line_width,
            allow_backspace: config.allow_backspace,
        }
    }

    pub fn handle(&mut self, event: &TypingEvent) -> Flow {
        match event {
            TypingEvent::Tick => self.tick(),
            TypingEvent::Resize => self.flow(),
            TypingEvent::Key(key) => match Input::from_key(*key) {
                Some(input) => self.apply(input),
                None => self.flow(),
            },
        }
    }

    pub fn tick(&mut self) -> Flow {
        self.engine.on_tick();
        self.flow()
    }

    pub fn apply(&mut self, input: Input) -> Flow {
        match input {
            Input::Abort => {
                log::info!("test aborted at word {}", self.engine.current_word_index());
                return Flow::Aborted;
            }
            Input::Char(c) => self.write(c),
            Input::Backspace => self.backspace(),
        }
        self.flow()
    }

    fn write(&mut self, c: char) {
        // the clock starts with the first keystroke
        if self.engine.status() == Status::Idle {
            self.engine.start();
        }
        if self.typed_len >= MAX_INPUT_BUFFER - 1 {
            return;
        }

        let before = self.engine.total_chars_typed();
        self.engine.process_char(c);
        if self.engine.total_chars_typed() > before {
            self.typed.push(c);
            self.typed_len += 1;
        }
    }

    fn backspace(&mut self) {
        if !self.allow_backspace || self.engine.status() != Status::Running {
            return;
        }
        // the stream follows the engine, which never reopens a finished word
        if self.engine.current_typed_text().is_empty() {
            return;
        }
        self.engine.backspace();
        if self.typed.pop().is_some() {
            self.typed_len -= 1;
        }
    }

    fn flow(&self) -> Flow {
        if self.engine.has_finished() {
            Flow::Finished
        } else {
            Flow::Continue
        }
    }

    pub fn engine(&self) -> &TestEngine<C> {
        &self.engine
    }

    pub fn typed_text(&self) -> &str {
        &self.typed
    }

    pub fn style(&self) -> OverlayStyle {
        self.style
    }

    pub fn overlay(&self) -> Overlay {
        Overlay::from_engine(&self.engine, self.style, &self.typed, self.line_width)
    }

    pub fn stats_line(&self) -> String {
        format!(
            "Time: {:.1}s | WPM: {:.1} | Accuracy: {:.1}% | Errors: {} | Progress: {:.1}%",
            self.engine.remaining().as_secs_f64(),
            self.engine.wpm(),
            self.engine.accuracy(),
            self.engine.error_count(),
            self.engine.progress(),
        )
    }
}
