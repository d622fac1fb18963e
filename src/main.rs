use mlox::{
    diagnostics,
    driver::{run_source, RunError},
    repl,
    runtime::Interpreter,
};
use std::{env, fs, path::Path, process};
use tracing_subscriber::EnvFilter;

const EXIT_USAGE: i32 = 64;
const EXIT_SYNTAX: i32 = 65;
const EXIT_NO_INPUT: i32 = 66;
const EXIT_RUNTIME: i32 = 70;

fn main() {
    init_logging();
    let args: Vec<String> = env::args().collect();

    match args.as_slice() {
        [_] => start_repl(),
        [_, command] if command == "repl" => start_repl(),
        [_, command, filename] if command == "run" => run_file(filename),
        _ => usage(),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("MLOX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn usage() -> ! {
    eprintln!("Usage: mlox [run <filename.lox> | repl]");
    process::exit(EXIT_USAGE);
}

fn start_repl() {
    if let Err(err) = repl::run_repl() {
        eprintln!("REPL failed: {}", err);
        process::exit(EXIT_NO_INPUT);
    }
}

fn run_file(filename: &str) {
    if !filename.ends_with(".lox") {
        eprintln!("Invalid file extension. Only .lox files are allowed.");
        process::exit(EXIT_USAGE);
    }

    let path = Path::new(filename);
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            diagnostics::report_io_error(path, &err);
            process::exit(EXIT_NO_INPUT);
        }
    };

    tracing::info!(file = filename, bytes = source.len(), "running script");
    let mut interpreter = Interpreter::new();
    match run_source(&mut interpreter, &source) {
        Ok(()) => {}
        Err(RunError::Syntax(errors)) => {
            diagnostics::emit_syntax_errors(filename, &source, &errors);
            process::exit(EXIT_SYNTAX);
        }
        Err(RunError::Runtime(err)) => {
            diagnostics::report_runtime_error(&err);
            process::exit(EXIT_RUNTIME);
        }
    }
}
