use clap::Parser as _;
use parsik::{Error, Grammar, Options, Parser, TableTracer};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::{fs, io};
use tracing_subscriber::EnvFilter;

/// Parse input with a grammar written in the parsik notation.
#[derive(clap::Parser, Debug)]
#[command(name = "parsik", version)]
struct Cli {
    /// Grammar file
    grammar: PathBuf,

    /// Rule to start parsing at
    rule: String,

    /// Input text; read from --file or stdin when absent
    input: Option<String>,

    /// Read the input from this file
    #[arg(short, long, conflicts_with = "input")]
    file: Option<PathBuf>,

    /// Accept a match that stops before the end of the input
    #[arg(long)]
    partial: bool,

    /// Print the evaluation trace to stderr
    #[arg(long)]
    trace: bool,

    /// Print the output as JSON
    #[arg(long)]
    json: bool,

    /// Print the grammar as loaded and exit
    #[arg(long)]
    print_grammar: bool,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("cannot read {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error(transparent)]
    Parsik(#[from] Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("PARSIK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    // a second initialisation is harmless; the first subscriber wins
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .try_init();
}

fn read_file(path: &PathBuf) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn read_input(cli: &Cli) -> Result<String, CliError> {
    if let Some(input) = &cli.input {
        return Ok(input.clone());
    }

    if let Some(path) = &cli.file {
        return read_file(path);
    }

    let mut input = String::new();

    io::stdin()
        .read_to_string(&mut input)
        .map_err(|source| CliError::Read {
            path: String::from("stdin"),
            source,
        })?;

    Ok(input)
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let src = read_file(&cli.grammar)?;
    let grammar = Grammar::from_notation(&src)?;

    if cli.print_grammar {
        print!("{}", grammar);
        return Ok(());
    }

    let input = read_input(cli)?;

    let parser = Parser::with_options(
        &grammar,
        Options {
            require_eof: !cli.partial,
            trace: false,
        },
    );

    let res = if cli.trace {
        let mut table = TableTracer::new().with_width(30);
        let res = parser.parse_with(&cli.rule, &input, &mut table);
        eprint!("{}", table);
        res
    } else {
        parser.parse(&cli.rule, &input)
    };

    let value = res?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", value);
    }

    Ok(())
}

fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("parsik: {}", err);
            ExitCode::FAILURE
        }
    }
}
