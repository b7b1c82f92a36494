use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::interpreter::Config;
use rox::parser::Parser;
use rox::scanner::{scan_tokens, Scanner};
use rox::session::{Lox, EXIT_STATIC_ERROR};

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Option<Commands>,

    /// Enable logging to rox.log
    #[arg(long, global = true)]
    log: bool,

    /// Nested calls allowed before a stack overflow is reported
    #[arg(long, global = true, default_value_t = Config::default().max_call_depth)]
    max_call_depth: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs a file as a Lox program
    Run { filename: PathBuf },

    /// Starts an interactive prompt (the default)
    Repl,

    /// Tokenizes a file, printing each token
    Tokenize { filename: PathBuf },

    /// Parses a file and prints its syntax tree
    Parse {
        filename: PathBuf,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Reads a whole file as UTF‑8 text.
fn read_file(filename: &PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).with_context(|| format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .with_context(|| format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    String::from_utf8(buf).with_context(|| format!("{:?} is not valid UTF-8", filename))
}

fn init_logger() -> Result<()> {
    let log_file = File::create("rox.log").context("Failed to create rox.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "{} [{}:{}] - {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized, writing to rox.log");
    Ok(())
}

fn run_file(filename: &PathBuf, config: Config) -> Result<i32> {
    let source = read_file(filename)?;
    let mut lox = Lox::with_config(io::stdout(), io::stderr(), config);

    lox.run(&source);

    Ok(lox.exit_code())
}

fn run_prompt(config: Config) -> Result<i32> {
    let mut lox = Lox::with_config(io::stdout(), io::stderr(), config);
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush prompt")?;

        line.clear();
        if input.read_line(&mut line).context("Failed to read input")? == 0 {
            break;
        }

        let outcome = lox.run(&line);
        debug!("REPL line finished: {:?}", outcome);

        lox.reset_error();
    }

    println!();
    Ok(0)
}

fn tokenize(filename: &PathBuf) -> Result<i32> {
    let source = read_file(filename)?;
    let mut tokenized = true;

    for token in Scanner::new(&source) {
        match token {
            Ok(token) => println!("{}", token),
            Err(e) => {
                tokenized = false;
                eprintln!("{}", e);
            }
        }
    }

    Ok(if tokenized { 0 } else { EXIT_STATIC_ERROR })
}

fn parse(filename: &PathBuf, json: bool) -> Result<i32> {
    let source = read_file(filename)?;
    let (tokens, scan_errors) = scan_tokens(&source);

    for e in &scan_errors {
        eprintln!("{}", e);
    }

    let statements = match Parser::new(tokens).parse() {
        Ok(statements) => statements,
        Err(errors) => {
            for e in &errors {
                eprintln!("{}", e);
            }
            return Ok(EXIT_STATIC_ERROR);
        }
    };

    if json {
        let rendered =
            serde_json::to_string_pretty(&statements).context("Failed to serialize syntax tree")?;
        println!("{}", rendered);
    } else {
        for stmt in &statements {
            println!("{}", AstPrinter::print_stmt(stmt));
        }
    }

    Ok(if scan_errors.is_empty() { 0 } else { EXIT_STATIC_ERROR })
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();
    }

    info!("CLI arguments: {:?}", args);

    let config = Config {
        max_call_depth: args.max_call_depth,
    };

    let code = match args.commands {
        Some(Commands::Run { filename }) => run_file(&filename, config)?,
        Some(Commands::Repl) | None => run_prompt(config)?,
        Some(Commands::Tokenize { filename }) => tokenize(&filename)?,
        Some(Commands::Parse { filename, json }) => parse(&filename, json)?,
    };

    info!("Exiting with code {}", code);

    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
