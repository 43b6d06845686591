use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use rand::{rngs::StdRng, SeedableRng};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::OpenOptions,
    io::{self, stdin},
    path::PathBuf,
};
use typr::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    engine::TestResult,
    overlay::OverlayStyle,
    runtime::{CrosstermEventSource, EventSource, FixedTicker, Runner, TypingEvent},
    sampler::WordSampler,
    session::{Flow, Session},
    storage::{CsvResultStore, ResultStore},
    ui::{HistoryView, ResultsView, TypingView},
};

/// terminal typing-speed test
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    /// number of seconds to run the test
    #[clap(short = 's', long, value_parser = clap::value_parser!(u64).range(1..))]
    secs: Option<u64>,

    /// number of words to draw for the test
    #[clap(short = 'w', long, value_parser = clap::value_parser!(u64).range(1..))]
    words: Option<u64>,

    /// word table to sample from (two-column csv: word,weight)
    #[clap(long)]
    word_file: Option<PathBuf>,

    /// column after which the text wraps at the next space
    #[clap(long, value_parser = clap::value_parser!(u64).range(1..))]
    width: Option<u64>,

    /// how typed text is lined up against the target
    #[clap(long, value_enum)]
    overlay: Option<OverlayStyle>,

    /// ignore backspace, no corrections allowed
    #[clap(long)]
    no_backspace: bool,

    /// seed for the word sampler, for repeatable tests
    #[clap(long)]
    seed: Option<u64>,

    /// show past results instead of starting a test
    #[clap(long)]
    history: bool,

    /// persist the effective settings as the new defaults
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    fn apply(&self, mut config: Config) -> Config {
        if let Some(secs) = self.secs {
            config.number_of_secs = secs;
        }
        if let Some(words) = self.words {
            config.number_of_words = usize::try_from(words).unwrap_or(usize::MAX);
        }
        if let Some(ref path) = self.word_file {
            config.word_file = Some(path.clone());
        }
        if let Some(width) = self.width {
            config.line_width = usize::try_from(width).unwrap_or(usize::MAX);
        }
        if let Some(overlay) = self.overlay {
            config.overlay = overlay;
        }
        if self.no_backspace {
            config.allow_backspace = false;
        }
        config
    }
}

enum Screen {
    Typing(Session),
    Results { result: TestResult, message: String },
    History { back: Option<(TestResult, String)> },
}

struct App {
    config: Config,
    sampler: WordSampler,
    rng: StdRng,
    store: CsvResultStore,
    screen: Screen,
    history: Vec<TestResult>,
}

impl App {
    fn new(config: Config, sampler: WordSampler, rng: StdRng, store: CsvResultStore) -> Self {
        let mut app = Self {
            config,
            sampler,
            rng,
            store,
            screen: Screen::History { back: None },
            history: Vec::new(),
        };
        app.new_test();
        app
    }

    fn new_test(&mut self) {
        let words = self
            .sampler
            .sample_sequence(self.config.number_of_words, &mut self.rng);
        self.screen = Screen::Typing(Session::new(words, &self.config));
    }

    fn show_history(&mut self, back: Option<(TestResult, String)>) {
        self.history = match self.store.load_all() {
            Ok(results) => results,
            Err(err) => {
                log::error!("failed to load history: {}", err);
                Vec::new()
            }
        };
        self.screen = Screen::History { back };
    }

    fn finish_test(&mut self, result: TestResult) {
        let message = match self.store.append(&result) {
            Ok(()) => "Results saved!".to_string(),
            Err(err) => {
                log::error!("failed to save result: {}", err);
                format!("Error saving results: {}", err)
            }
        };
        self.screen = Screen::Results { result, message };
    }
}

fn init_logging() {
    let path = AppDirs::log_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    // stderr would draw over the alternate screen
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(_) => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    let _ = builder.try_init();
}

fn load_sampler(config: &Config) -> WordSampler {
    match config.word_file {
        Some(ref path) => match WordSampler::from_path(path) {
            Ok(sampler) => sampler,
            Err(err) => {
                log::warn!("{}; using built-in words", err);
                eprintln!("{}; using built-in words", err);
                WordSampler::builtin()
            }
        },
        None => WordSampler::builtin(),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config_store = FileConfigStore::new();
    let config = cli.apply(config_store.load());
    if cli.save_config {
        config_store.save(&config)?;
    }

    let sampler = load_sampler(&config);
    if sampler.is_empty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::InvalidValue, "word table has no usable entries")
            .exit();
    }

    let rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let store = CsvResultStore::with_path(AppDirs::results_path());
    let mut app = App::new(config, sampler, rng, store);
    if cli.history {
        app.show_history(None);
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(app.config.tick_rate()),
    );
    let outcome = start_tui(&mut terminal, &mut runner, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    outcome
}

fn is_quit(key: &KeyEvent) -> bool {
    key.kind == KeyEventKind::Press
        && (matches!(key.code, KeyCode::Esc | KeyCode::Char('q'))
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')))
}

fn start_tui<B: Backend, E: EventSource>(
    terminal: &mut Terminal<B>,
    runner: &mut Runner<E, FixedTicker>,
    app: &mut App,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| match app.screen {
            Screen::Typing(ref session) => f.render_widget(&TypingView { session }, f.area()),
            Screen::Results {
                ref result,
                ref message,
            } => f.render_widget(
                &ResultsView {
                    result,
                    save_message: message,
                },
                f.area(),
            ),
            Screen::History { .. } => f.render_widget(
                &HistoryView {
                    results: &app.history,
                },
                f.area(),
            ),
        })?;

        let event = runner.step();

        match app.screen {
            Screen::Typing(ref mut session) => match session.handle(&event) {
                Flow::Continue => {}
                Flow::Finished => {
                    let result = session.engine().result();
                    app.finish_test(result);
                }
                Flow::Aborted => return Ok(()),
            },
            Screen::Results {
                ref result,
                ref message,
            } => {
                let TypingEvent::Key(key) = event else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char(' ') | KeyCode::Enter => app.new_test(),
                    KeyCode::Char('h') => {
                        let back = Some((result.clone(), message.clone()));
                        app.show_history(back);
                    }
                    _ if is_quit(&key) => return Ok(()),
                    _ => {}
                }
            }
            Screen::History { ref mut back } => {
                let TypingEvent::Key(key) = event else {
                    continue;
                };
                if !is_quit(&key) {
                    continue;
                }
                app.screen = match back.take() {
                    Some((result, message)) => Screen::Results { result, message },
                    None => return Ok(()),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sizes_are_rejected_on_the_command_line() {
        for flag in ["--secs", "--words", "--width"] {
            let err = Cli::try_parse_from(["typr", flag, "0"]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValueValidation, "{flag}");
        }
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "typr",
            "-s",
            "30",
            "-w",
            "25",
            "--width",
            "40",
            "--overlay",
            "word",
            "--no-backspace",
        ])
        .unwrap();

        let config = cli.apply(Config::default());
        assert_eq!(config.number_of_secs, 30);
        assert_eq!(config.number_of_words, 25);
        assert_eq!(config.line_width, 40);
        assert_eq!(config.overlay, OverlayStyle::Word);
        assert!(!config.allow_backspace);
    }
}
