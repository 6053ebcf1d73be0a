use basic::mach::{compile, Event, Runtime};
use tracing_subscriber::{fmt, EnvFilter};

/// Route `tracing` output through the test harness. `RUST_LOG` picks
/// the level.
pub fn init_test_logging() {
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn exec(runtime: &mut Runtime) -> String {
    exec_with_input(runtime, &[])
}

/// Run to completion. Errors are appended to the output one per line.
/// Input lines are fed on demand, then input is closed.
pub fn exec_with_input(runtime: &mut Runtime, lines: &[&str]) -> String {
    let mut s = String::new();
    let mut lines = lines.iter();
    let mut slices = 0;
    loop {
        match runtime.execute(5000) {
            Event::Stopped => break,
            Event::Errors(error) => s.push_str(&format!("{}\n", error)),
            Event::Running => {
                slices += 1;
                if slices > 1000 {
                    s.push_str("\nExecution cycles exceeded.\n");
                    break;
                }
            }
            Event::Print(ps) => s.push_str(&ps),
            Event::Input => match lines.next() {
                Some(line) => runtime.enter(line),
                None => runtime.close_input(),
            },
        }
    }
    s
}

pub fn runtime(source: &str) -> Runtime {
    init_test_logging();
    match compile(source) {
        Ok(program) => Runtime::new(program),
        Err(error) => panic!("{}\n{}", error, source),
    }
}

pub fn run(source: &str) -> String {
    exec(&mut runtime(source))
}
