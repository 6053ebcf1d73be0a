use ansi_term::Style;
use basic::lang::Error;
use basic::mach::{compile_with, Config, Event, Listing, Runtime};
use clap::Parser;
use linefeed::{DefaultTerminal, Interface, ReadResult};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Cycles run between checks for Ctrl-C.
const SLICE: usize = 5000;

#[derive(Parser, Debug)]
#[command(name = "basic")]
#[command(about = "Compile and run small BASIC programs", long_about = None)]
struct Args {
    /// Bytes shared by the image and the compiler
    #[arg(long, default_value_t = Config::default().arena_size)]
    arena_size: usize,

    /// Operand stack size in words
    #[arg(long, default_value_t = Config::default().stack_size)]
    stack_size: usize,

    /// Print the disassembled program before running it
    #[arg(long)]
    listing: bool,

    /// Program to run. Without one, lines are typed in at the prompt.
    file: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            arena_size: self.arena_size,
            stack_size: self.stack_size,
            ..Config::default()
        }
    }
}

pub fn main() {
    let args = Args::parse();
    init_logging();

    let interrupted = Arc::new(AtomicBool::new(false));
    let int_moved = interrupted.clone();
    if let Err(error) = ctrlc::set_handler(move || {
        int_moved.store(true, Ordering::SeqCst);
    }) {
        warn!(%error, "Ctrl-C handler not installed");
    }

    let result = match &args.file {
        Some(path) => run_file(&args, path, &interrupted),
        None => main_loop(&args, &interrupted).map(|_| true),
    };
    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(error) => {
            eprintln!("{}", error);
            std::process::exit(2);
        }
    }
}

/// Log level comes from `BASIC_LOG`, e.g. `BASIC_LOG=debug`.
fn init_logging() {
    let filter = EnvFilter::try_from_env("BASIC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Where a running program prints to and reads from.
trait Console {
    fn print(&self, s: &str) -> io::Result<()>;
    /// One line without its newline, `None` at end of input.
    fn input(&self) -> io::Result<Option<String>>;
}

struct Stdio;

impl Console for Stdio {
    fn print(&self, s: &str) -> io::Result<()> {
        let mut out = io::stdout();
        out.write_all(s.as_bytes())?;
        out.flush()
    }

    fn input(&self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let len = line.trim_end_matches(&['\r', '\n'][..]).len();
        line.truncate(len);
        Ok(Some(line))
    }
}

impl Console for Interface<DefaultTerminal> {
    fn print(&self, s: &str) -> io::Result<()> {
        self.write_fmt(format_args!("{}", s))
    }

    fn input(&self) -> io::Result<Option<String>> {
        self.set_prompt("? ")?;
        let result = self.read_line();
        self.set_prompt("] ")?;
        match result? {
            ReadResult::Input(string) => Ok(Some(string)),
            ReadResult::Signal(_) | ReadResult::Eof => Ok(None),
        }
    }
}

fn show_error(console: &dyn Console, error: &Error) -> io::Result<()> {
    console.print(&format!("{}\n", Style::new().bold().paint(error.to_string())))
}

/// Compile and run one program. False when it did not finish cleanly.
fn run_source(
    args: &Args,
    source: &str,
    console: &dyn Console,
    interrupted: &AtomicBool,
) -> io::Result<bool> {
    let program = match compile_with(&args.config(), source) {
        Ok(program) => program,
        Err(error) => {
            show_error(console, &error)?;
            return Ok(false);
        }
    };
    if args.listing {
        console.print(&Listing::new(&program).to_string())?;
    }
    let mut runtime = Runtime::new(program);
    interrupted.store(false, Ordering::SeqCst);
    let mut clean = true;
    loop {
        if interrupted.swap(false, Ordering::SeqCst) {
            runtime.interrupt();
        }
        match runtime.execute(SLICE) {
            Event::Stopped => break,
            Event::Running => {}
            Event::Print(s) => console.print(&s)?,
            Event::Input => match console.input()? {
                Some(line) => runtime.enter(&line),
                None => runtime.close_input(),
            },
            Event::Errors(error) => {
                clean = false;
                show_error(console, &error)?;
            }
        }
    }
    debug!(clean, "program ended");
    Ok(clean)
}

fn run_file(args: &Args, path: &Path, interrupted: &AtomicBool) -> io::Result<bool> {
    let source = std::fs::read_to_string(path)?;
    run_source(args, &source, &Stdio, interrupted)
}

/// Type a program in line by line. `RUN`, `LIST`, `NEW` and `BYE` are
/// commands, everything else is program text.
fn main_loop(args: &Args, interrupted: &AtomicBool) -> io::Result<()> {
    let command = Interface::new("BASIC")?;
    command.set_prompt("] ")?;
    let mut lines: Vec<String> = vec![];

    loop {
        let string = match command.read_line()? {
            ReadResult::Input(string) => string,
            ReadResult::Signal(_) | ReadResult::Eof => break,
        };
        match string.trim().to_ascii_uppercase().as_str() {
            "RUN" => {
                run_source(args, &lines.join("\n"), &command, interrupted)?;
            }
            "LIST" => {
                for (num, line) in lines.iter().enumerate() {
                    command.write_fmt(format_args!("{:>5} {}\n", num + 1, line))?;
                }
            }
            "NEW" => lines.clear(),
            "BYE" => break,
            _ => {
                if !string.trim().is_empty() {
                    command.add_history_unique(string.clone());
                }
                lines.push(string);
            }
        }
    }
    Ok(())
}
