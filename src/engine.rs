use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

/// Source of the current instant, swappable so elapsed-time behavior can be
/// driven deterministically
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Running,
    Finished,
}

/// Snapshot of a test, detached from the engine that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub timestamp: DateTime<Local>,
    pub wpm: f64,
    pub accuracy: f64,
    pub elapsed: Duration,
    pub total_words: usize,
    pub errors: usize,
    pub total_chars: usize,
}

/// represents one typing test against a fixed word sequence
#[derive(Debug)]
pub struct TestEngine<C: Clock = SystemClock> {
    clock: C,
    target_words: Vec<String>,
    current_word_index: usize,
    current_char_index: usize,
    current_typed_text: String,
    committed_words: Vec<String>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    duration: Duration,
    total_chars_typed: usize,
    correct_chars_typed: usize,
    error_count: usize,
    status: Status,
}

impl TestEngine<SystemClock> {
    pub fn new(target_words: Vec<String>, duration: Duration) -> Self {
        Self::with_clock(target_words, duration, SystemClock)
    }
}

impl<C: Clock> TestEngine<C> {
    pub fn with_clock(target_words: Vec<String>, duration: Duration, clock: C) -> Self {
        Self {
            clock,
            target_words,
            current_word_index: 0,
            current_char_index: 0,
            current_typed_text: String::new(),
            committed_words: Vec::new(),
            started_at: None,
            finished_at: None,
            duration,
            total_chars_typed: 0,
            correct_chars_typed: 0,
            error_count: 0,
            status: Status::Idle,
        }
    }

    /// Idle -> Running. Later calls leave the start time alone.
    pub fn start(&mut self) {
        if self.status != Status::Idle {
            return;
        }
        self.started_at = Some(self.clock.now());
        self.status = Status::Running;
        log::debug!(
            "test started: {} words, {:?}",
            self.target_words.len(),
            self.duration
        );
    }

    pub fn finish(&mut self) {
        if self.status == Status::Finished {
            return;
        }
        self.finished_at = Some(self.clock.now());
        self.status = Status::Finished;
        log::debug!(
            "test finished at word {}/{}: {} chars, {} errors",
            self.current_word_index,
            self.target_words.len(),
            self.total_chars_typed,
            self.error_count
        );
    }

    /// Deadline check for the periodic tick
    pub fn on_tick(&mut self) {
        if self.status == Status::Running && self.is_time_up() {
            self.finish();
        }
    }

    pub fn process_char(&mut self, c: char) {
        if self.status != Status::Running {
            return;
        }

        // the deadline is only observed here and on tick; the late char is dropped
        if self.is_time_up() {
            self.finish();
            return;
        }

        if self.current_word_index >= self.target_words.len() {
            return;
        }

        match c {
            ' ' => self.process_space(),
            c => self.process_typed_char(c),
        }
    }

    fn process_space(&mut self) {
        // a space always ends the word and always counts as correct
        self.total_chars_typed += 1;
        self.correct_chars_typed += 1;
        self.next_word();
    }

    fn process_typed_char(&mut self, c: char) {
        let expected = self.target_words[self.current_word_index]
            .chars()
            .nth(self.current_char_index);

        self.current_typed_text.push(c);
        self.total_chars_typed += 1;

        match expected {
            Some(expected) => {
                self.current_char_index += 1;
                if c == expected {
                    self.correct_chars_typed += 1;
                } else {
                    self.error_count += 1;
                }
            }
            // overflow: the cursor stays pinned at the end of the word
            None => self.error_count += 1,
        }
    }

    fn next_word(&mut self) {
        self.committed_words
            .push(std::mem::take(&mut self.current_typed_text));
        self.current_word_index += 1;
        self.current_char_index = 0;

        if self.current_word_index >= self.target_words.len() {
            self.finish();
        }
    }

    /// Removes the last char typed for the current word. The counters are a
    /// ledger of every keystroke and are not rolled back.
    pub fn backspace(&mut self) {
        if self.status != Status::Running {
            return;
        }
        if self.current_typed_text.pop().is_none() {
            return;
        }

        let word_len = self.current_word().chars().count();
        self.current_char_index = self.current_typed_text.chars().count().min(word_len);
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn has_finished(&self) -> bool {
        self.status == Status::Finished
    }

    pub fn target_words(&self) -> &[String] {
        &self.target_words
    }

    pub fn current_word_index(&self) -> usize {
        self.current_word_index
    }

    pub fn current_char_index(&self) -> usize {
        self.current_char_index
    }

    pub fn current_typed_text(&self) -> &str {
        &self.current_typed_text
    }

    /// What was typed for each word already ended with a space
    pub fn committed_words(&self) -> &[String] {
        &self.committed_words
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn total_chars_typed(&self) -> usize {
        self.total_chars_typed
    }

    pub fn correct_chars_typed(&self) -> usize {
        self.correct_chars_typed
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn current_word(&self) -> &str {
        self.target_words
            .get(self.current_word_index)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Frozen at the moment the test finished
    pub fn elapsed(&self) -> Duration {
        match (self.started_at, self.finished_at) {
            (None, _) => Duration::ZERO,
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            (Some(start), None) => self.clock.now().saturating_duration_since(start),
        }
    }

    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.elapsed())
    }

    pub fn is_time_up(&self) -> bool {
        self.elapsed() >= self.duration
    }

    /// Words per minute from correct chars. The whole-word truncation
    /// (`correct / 5` in integer math) keeps results comparable with stored ones.
    pub fn wpm(&self) -> f64 {
        let minutes = self.elapsed().as_secs_f64() / 60.0;
        if minutes == 0.0 {
            return 0.0;
        }
        (self.correct_chars_typed / 5) as f64 / minutes
    }

    pub fn accuracy(&self) -> f64 {
        if self.total_chars_typed == 0 {
            return 100.0;
        }
        self.correct_chars_typed as f64 / self.total_chars_typed as f64 * 100.0
    }

    pub fn progress(&self) -> f64 {
        if self.target_words.is_empty() {
            return 0.0;
        }
        self.current_word_index as f64 / self.target_words.len() as f64 * 100.0
    }

    pub fn result(&self) -> TestResult {
        TestResult {
            timestamp: Local::now(),
            wpm: self.wpm(),
            accuracy: self.accuracy(),
            elapsed: self.elapsed(),
            total_words: self.current_word_index,
            errors: self.error_count,
            total_chars: self.total_chars_typed,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Clock that only moves when told to
    #[derive(Debug, Clone)]
    pub(crate) struct ManualClock {
        base: Instant,
        offset: Rc<Cell<Duration>>,
    }

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self {
                base: Instant::now(),
                offset: Rc::new(Cell::new(Duration::ZERO)),
            }
        }

        pub(crate) fn advance(&self, by: Duration) {
            self.offset.set(self.offset.get() + by);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + self.offset.get()
        }
    }

    fn words(ws: &[&str]) -> Vec<String> {
        ws.iter().map(|w| w.to_string()).collect()
    }

    fn running(ws: &[&str]) -> (TestEngine<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let mut engine =
            TestEngine::with_clock(words(ws), Duration::from_secs(60), clock.clone());
        engine.start();
        (engine, clock)
    }

    fn type_str<C: Clock>(engine: &mut TestEngine<C>, s: &str) {
        for c in s.chars() {
            engine.process_char(c);
        }
    }

    #[test]
    fn test_new_engine_is_idle() {
        let engine = TestEngine::new(words(&["hello", "world"]), Duration::from_secs(30));

        assert_eq!(engine.status(), Status::Idle);
        assert!(!engine.has_started());
        assert_eq!(engine.elapsed(), Duration::ZERO);
        assert_eq!(engine.current_word(), "hello");
        assert_eq!(engine.wpm(), 0.0);
        assert_eq!(engine.accuracy(), 100.0);
    }

    #[test]
    fn test_chars_ignored_before_start() {
        let mut engine = TestEngine::new(words(&["ab"]), Duration::from_secs(30));
        engine.process_char('a');

        assert_eq!(engine.total_chars_typed(), 0);
        assert_eq!(engine.current_typed_text(), "");
    }

    #[test]
    fn test_start_twice_keeps_start_time() {
        let (mut engine, clock) = running(&["ab"]);
        clock.advance(Duration::from_secs(5));
        engine.start();

        assert_eq!(engine.elapsed(), Duration::from_secs(5));
    }

    #[test]
    fn test_word_scenario() {
        let (mut engine, _clock) = running(&["ab", "cd"]);

        type_str(&mut engine, "ab");
        assert_eq!(engine.total_chars_typed(), 2);
        assert_eq!(engine.correct_chars_typed(), 2);
        assert_eq!(engine.error_count(), 0);
        assert_eq!(engine.current_word_index(), 0);

        engine.process_char(' ');
        assert_eq!(engine.total_chars_typed(), 3);
        assert_eq!(engine.correct_chars_typed(), 3);
        assert_eq!(engine.current_word_index(), 1);
        assert_eq!(engine.current_char_index(), 0);
        assert_eq!(engine.current_typed_text(), "");

        engine.process_char('x');
        assert_eq!(engine.total_chars_typed(), 4);
        assert_eq!(engine.correct_chars_typed(), 3);
        assert_eq!(engine.error_count(), 1);
    }

    #[test]
    fn test_counters_balance_without_backspace() {
        let (mut engine, _clock) = running(&["quick", "brown", "fox"]);

        for c in "qiuck brwn foxes".chars() {
            let before = engine.total_chars_typed();
            engine.process_char(c);
            assert_eq!(engine.total_chars_typed(), before + 1);
            assert_eq!(
                engine.correct_chars_typed() + engine.error_count(),
                engine.total_chars_typed()
            );
        }
    }

    #[test]
    fn test_space_mid_word_advances_and_counts_correct() {
        let (mut engine, _clock) = running(&["hello", "there"]);

        type_str(&mut engine, "he ");

        assert_eq!(engine.current_word_index(), 1);
        assert_eq!(engine.correct_chars_typed(), 3);
        assert_eq!(engine.error_count(), 0);
        assert_eq!(engine.committed_words(), &["he".to_string()]);
    }

    #[test]
    fn test_overflow_typing() {
        let (mut engine, _clock) = running(&["ab", "cd"]);

        type_str(&mut engine, "abxy");

        assert_eq!(engine.current_word_index(), 0);
        assert_eq!(engine.current_char_index(), 2);
        assert_eq!(engine.current_typed_text(), "abxy");
        assert_eq!(engine.total_chars_typed(), 4);
        assert_eq!(engine.error_count(), 2);
    }

    #[test]
    fn test_backspace_keeps_counters() {
        let (mut engine, _clock) = running(&["abc"]);

        type_str(&mut engine, "ax");
        engine.backspace();

        assert_eq!(engine.current_typed_text(), "a");
        assert_eq!(engine.current_char_index(), 1);
        assert_eq!(engine.total_chars_typed(), 2);
        assert_eq!(engine.correct_chars_typed(), 1);
        assert_eq!(engine.error_count(), 1);

        engine.process_char('b');
        assert_eq!(engine.correct_chars_typed(), 2);
        assert_eq!(engine.total_chars_typed(), 3);
    }

    #[test]
    fn test_backspace_through_overflow() {
        let (mut engine, _clock) = running(&["ab"]);

        type_str(&mut engine, "abzz");
        engine.backspace();
        assert_eq!(engine.current_char_index(), 2);
        engine.backspace();
        engine.backspace();
        assert_eq!(engine.current_typed_text(), "a");
        assert_eq!(engine.current_char_index(), 1);
    }

    #[test]
    fn test_backspace_does_not_cross_word_boundary() {
        let (mut engine, _clock) = running(&["ab", "cd"]);

        type_str(&mut engine, "ab ");
        engine.backspace();

        assert_eq!(engine.current_word_index(), 1);
        assert_eq!(engine.current_typed_text(), "");
        assert_eq!(engine.total_chars_typed(), 3);
    }

    #[test]
    fn test_finishes_after_last_word() {
        let (mut engine, _clock) = running(&["ab", "cd"]);

        type_str(&mut engine, "ab cd ");

        assert!(engine.has_finished());
        assert_eq!(engine.current_word_index(), 2);
        assert_eq!(engine.current_word(), "");
        assert_eq!(engine.progress(), 100.0);

        engine.process_char('x');
        assert_eq!(engine.total_chars_typed(), 6);
    }

    #[test]
    fn test_past_end_cursor_is_noop() {
        let (mut engine, _clock) = running(&["a"]);
        engine.current_word_index = 1;

        engine.process_char('a');

        assert_eq!(engine.current_word(), "");
        assert_eq!(engine.total_chars_typed(), 0);
        assert_eq!(engine.status(), Status::Running);
    }

    #[test]
    fn test_time_up_drops_char_and_finishes() {
        let (mut engine, clock) = running(&["abc"]);
        engine.process_char('a');

        clock.advance(Duration::from_secs(60));
        engine.process_char('b');

        assert!(engine.has_finished());
        assert_eq!(engine.total_chars_typed(), 1);
        assert_eq!(engine.current_typed_text(), "a");
    }

    #[test]
    fn test_tick_finishes_when_time_is_up() {
        let (mut engine, clock) = running(&["abc"]);

        clock.advance(Duration::from_secs(59));
        engine.on_tick();
        assert_eq!(engine.status(), Status::Running);
        assert_eq!(engine.remaining(), Duration::from_secs(1));

        clock.advance(Duration::from_secs(1));
        engine.on_tick();
        assert!(engine.has_finished());
        assert_eq!(engine.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_elapsed_frozen_after_finish() {
        let (mut engine, clock) = running(&["abc"]);

        clock.advance(Duration::from_secs(12));
        engine.finish();
        clock.advance(Duration::from_secs(30));

        assert_eq!(engine.elapsed(), Duration::from_secs(12));
    }

    #[test]
    fn test_wpm_truncates_correct_chars() {
        let (mut engine, clock) = running(&["abcdefghij"]);

        // 9 correct chars count as one whole word
        type_str(&mut engine, "abcdefghi");
        clock.advance(Duration::from_secs(30));

        assert_eq!(engine.wpm(), 2.0);
    }

    #[test]
    fn test_wpm_zero_without_elapsed_time() {
        let (mut engine, _clock) = running(&["hello"]);
        type_str(&mut engine, "hello");

        assert_eq!(engine.elapsed(), Duration::ZERO);
        assert_eq!(engine.wpm(), 0.0);
    }

    #[test]
    fn test_accuracy() {
        let (mut engine, _clock) = running(&["test"]);
        type_str(&mut engine, "txst");

        assert_eq!(engine.accuracy(), 75.0);
    }

    #[test]
    fn test_progress_empty_words() {
        let engine = TestEngine::new(Vec::new(), Duration::from_secs(1));
        assert_eq!(engine.progress(), 0.0);
    }

    #[test]
    fn test_result_snapshot() {
        let (mut engine, clock) = running(&["hello", "world"]);

        type_str(&mut engine, "hello wprld");
        clock.advance(Duration::from_secs(6));
        engine.finish();

        let result = engine.result();
        assert_eq!(result.total_words, 1);
        assert_eq!(result.errors, 1);
        assert_eq!(result.total_chars, 11);
        assert_eq!(result.elapsed, Duration::from_secs(6));
        assert_eq!(result.wpm, 20.0);
        assert!((result.accuracy - 1000.0 / 11.0).abs() < 1e-9);
    }
}
