use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::{Args, Subcommand};
use env_logger::Builder;
use log::{debug, info};

use expr_compiler as ec;

use ec::compiler::ExpressionCompiler;
use ec::number::Number;
use ec::options::ParserOptions;
use ec::printer::to_source;
use ec::tokenizer::Tokenizer;
use ec::value::Value;

#[derive(ClapParser, Debug)]
#[command(version, about = "Typed expression compiler", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to exprc.log
    #[arg(long, global = true)]
    log: bool,

    /// JSON file with parser options (parameters, static type, namespaces, ...)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct Input {
    /// File holding the expression text
    filename: Option<PathBuf>,

    /// Expression text given inline instead of a file
    #[arg(short, long, conflicts_with = "filename")]
    expr: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes the input, printing each token
    Tokenize(Input),

    /// Parses the input into a typed lambda and prints it
    Parse {
        #[command(flatten)]
        input: Input,

        /// Print the token stream as JSON instead of the expression
        #[arg(long)]
        json: bool,
    },

    /// Parses and simplifies the input, printing the result
    Simplify(Input),

    /// Compiles the input and invokes it with the given arguments
    Evaluate {
        #[command(flatten)]
        input: Input,

        /// Positional argument values, one per lambda parameter
        #[arg(long = "arg")]
        args: Vec<String>,
    },
}

/// Reads the contents of a file into a String
fn read_file(filename: PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(&filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = String::new();

    let bytes = reader
        .read_to_string(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

/// Expression text from `--expr` or the file; `None` when neither was given.
fn read_input(input: Input) -> Result<Option<String>> {
    match (input.expr, input.filename) {
        (Some(text), _) => Ok(Some(text)),
        (None, Some(filename)) => read_file(filename).map(Some),
        (None, None) => Ok(None),
    }
}

fn init_logger() -> Result<()> {
    let log_file = File::create("exprc.log").context("Failed to create exprc.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("expr_compiler::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .init();

    info!("Logger initialized, writing to exprc.log");
    Ok(())
}

/// `true`/`false`, a number (narrowest width holding it), or a string.
fn parse_arg(text: &str) -> Value {
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => match text.parse::<f64>() {
            Ok(n) => Value::Number(Number::narrowest(n)),
            Err(_) => Value::from(text),
        },
    }
}

fn no_input() -> ! {
    println!("No input was provided. Exiting...");
    std::process::exit(0);
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let options = match &args.config {
        Some(path) => ParserOptions::from_file(path).context(format!("Failed to load config {:?}", path))?,
        None => ParserOptions::default(),
    };

    match args.commands {
        Commands::Tokenize(input) => {
            let Some(text) = read_input(input)? else { no_input() };
            info!("Running Tokenize subcommand");

            let mut tokenizer = Tokenizer::new(&text);
            loop {
                match tokenizer.read_token() {
                    Ok(token) => {
                        debug!("Read token: {}", token);

                        println!("{}", token);
                        if token.is_eof() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("Tokenization failed: {}", e);
                        eprintln!("{}", e);
                        std::process::exit(65);
                    }
                }
            }

            info!("Tokenization completed successfully");
        }

        Commands::Parse { input, json } => {
            let Some(text) = read_input(input)? else { no_input() };
            info!("Running Parse subcommand");

            if json {
                let mut tokenizer = Tokenizer::new(&text);
                let mut tokens = Vec::new();
                loop {
                    match tokenizer.read_token() {
                        Ok(token) if token.is_eof() => break,
                        Ok(token) => tokens.push(token),
                        Err(e) => {
                            eprintln!("{}", e);
                            std::process::exit(65);
                        }
                    }
                }
                println!("{}", serde_json::to_string_pretty(&tokens)?);
                return Ok(());
            }

            let compiler = ExpressionCompiler::with_options(options);
            match compiler.parse(&text) {
                Ok(lambda) => {
                    let rendered = to_source(&ec::expr::Expr::lambda(lambda));

                    debug!("Parsed: {}", rendered);
                    println!("{}", rendered);
                }
                Err(e) => {
                    debug!("Parse failed: {}", e);
                    eprintln!("{}", e);
                    std::process::exit(65);
                }
            }
        }

        Commands::Simplify(input) => {
            let Some(text) = read_input(input)? else { no_input() };
            info!("Running Simplify subcommand");

            let compiler = ExpressionCompiler::with_options(options);
            match compiler.parse_simplified(&text) {
                Ok(lambda) => println!("{}", to_source(&ec::expr::Expr::lambda(lambda))),
                Err(e) => {
                    debug!("Simplify failed: {}", e);
                    eprintln!("{}", e);
                    std::process::exit(65);
                }
            }
        }

        Commands::Evaluate { input, args: values } => {
            let Some(text) = read_input(input)? else { no_input() };
            info!("Running Evaluate subcommand");

            let compiler = ExpressionCompiler::with_options(options);
            let lambda = match compiler.parse_simplified(&text) {
                Ok(lambda) => lambda,
                Err(e) => {
                    debug!("Compile failed: {}", e);
                    eprintln!("{}", e);
                    std::process::exit(65);
                }
            };

            let values: Vec<Value> = values.iter().map(|v| parse_arg(v)).collect();
            match compiler.compile(lambda).invoke(&values) {
                Ok(value) => {
                    debug!("Evaluated to: {}", value);
                    println!("{}", value);
                }
                Err(e) => {
                    debug!("Evaluation failed: {}", e);
                    eprintln!("{}", e);
                    std::process::exit(70);
                }
            }
        }
    }

    Ok(())
}
