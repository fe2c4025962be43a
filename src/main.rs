use blockpy_codegen::{check_python, generate_with, GenerateError, GenerateOptions, Workspace};
use clap::{Args, Parser, Subcommand};
use log::{debug, info};
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "blockpy")]
#[command(about = "blockpy - generate Python from block programs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate Python from workspace .json files
    Generate {
        /// Path to a workspace .json file or a directory of them
        #[arg(required_unless_present = "stdin")]
        file: Option<PathBuf>,

        /// Read a workspace from stdin
        #[arg(long)]
        stdin: bool,

        /// Output as JSON with block mappings
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        flags: GenerateFlags,
    },
    /// Check that a Python file parses
    Check {
        /// Path to a .py file
        file: PathBuf,
    },
}

#[derive(Args)]
struct GenerateFlags {
    /// Emit `name = None` for every workspace variable
    #[arg(long)]
    declare_variables: bool,

    /// Leave block comments out of the output
    #[arg(long)]
    no_comments: bool,

    /// Parse the generated code and fail on syntax errors
    #[arg(long)]
    verify: bool,

    /// Maximum block nesting depth
    #[arg(long, default_value_t = 200)]
    max_depth: usize,
}

impl GenerateFlags {
    fn options(&self) -> GenerateOptions {
        GenerateOptions {
            max_depth: self.max_depth,
            declare_variables: self.declare_variables,
            emit_comments: !self.no_comments,
            verify_syntax: self.verify,
            ..GenerateOptions::default()
        }
    }
}

/// Why a workspace file produced no code
enum Failure {
    Io(io::Error),
    Json(serde_json::Error),
    Generate(GenerateError),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { file, stdin, json, flags } => {
            let options = flags.options();
            if stdin {
                generate_stdin(json, &options);
            } else if let Some(path) = file {
                generate_path(&path, &options);
            } else {
                eprintln!("Error: provide a file/directory or use --stdin");
                process::exit(1);
            }
        }
        Commands::Check { file } => check_file(&file),
    }
}

fn generate_stdin(json_output: bool, options: &GenerateOptions) {
    let mut source = String::new();
    if let Err(err) = io::stdin().read_to_string(&mut source) {
        eprintln!("Error: failed to read stdin: {}", err);
        process::exit(1);
    }

    match generate_source(&source, options) {
        Ok(result) if json_output => match serde_json::to_string(&result) {
            Ok(json) => println!("{}", json),
            Err(err) => {
                eprintln!("Error: {}", err);
                process::exit(1);
            }
        },
        Ok(result) => print!("{}", result.code),
        Err(failure) => {
            report("<stdin>", &failure);
            process::exit(1);
        }
    }
}

fn generate_path(path: &Path, options: &GenerateOptions) {
    if path.is_file() {
        if path.extension().is_none_or(|ext| ext != "json") {
            eprintln!("Error: {} is not a .json workspace", path.display());
            process::exit(1);
        }
        let start = Instant::now();
        if let Err(failure) = generate_file(path, options) {
            report(&path.display().to_string(), &failure);
            process::exit(1);
        }
        print_summary(1, 0, start.elapsed());
    } else if path.is_dir() {
        generate_directory(path, options);
    } else {
        eprintln!("Error: {} does not exist", path.display());
        process::exit(1);
    }
}

fn generate_directory(dir: &Path, options: &GenerateOptions) {
    let start = Instant::now();
    let mut generated = 0;
    let mut failed = 0;

    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
    {
        let path = entry.path();
        match generate_file(path, options) {
            Ok(()) => generated += 1,
            Err(failure) => {
                report(&path.display().to_string(), &failure);
                failed += 1;
            }
        }
    }

    if generated + failed == 0 {
        eprintln!("No .json workspaces found in {}", dir.display());
        process::exit(1);
    }

    print_summary(generated, failed, start.elapsed());
    if failed > 0 {
        process::exit(1);
    }
}

fn generate_file(path: &Path, options: &GenerateOptions) -> Result<(), Failure> {
    debug!("generating {}", path.display());
    let source = fs::read_to_string(path).map_err(Failure::Io)?;
    let result = generate_source(&source, options)?;

    let output = path.with_extension("py");
    fs::write(&output, &result.code).map_err(Failure::Io)?;
    print_generated(&output.display().to_string());
    Ok(())
}

fn generate_source(source: &str, options: &GenerateOptions) -> Result<blockpy_codegen::GenerateResult, Failure> {
    let workspace = Workspace::from_json(source).map_err(Failure::Json)?;
    info!(
        "workspace with {} top-level chain(s), {} variable(s)",
        workspace.roots().len(),
        workspace.variables.len()
    );
    generate_with(&workspace, options).map_err(Failure::Generate)
}

fn check_file(path: &Path) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Error: failed to read {}: {}", path.display(), err);
            process::exit(1);
        }
    };
    if let Err(err) = check_python(&source) {
        report(&path.display().to_string(), &Failure::Generate(err.into()));
        process::exit(1);
    }
    print_generated(&path.display().to_string());
}

fn report(filename: &str, failure: &Failure) {
    match failure {
        Failure::Io(err) => eprintln!("Error: {}: {}", filename, err),
        Failure::Json(err) => eprintln!("Error: {} is not a valid workspace: {}", filename, err),
        Failure::Generate(err) => {
            if io::stderr().is_terminal() {
                eprint!("{}", err.render_color(filename));
            } else {
                eprint!("{}", err.render(filename));
            }
        }
    }
}

fn print_generated(path: &str) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("  \x1b[32m✓\x1b[0m {}", path);
    } else {
        eprintln!("  ✓ {}", path);
    }
}

fn print_summary(count: usize, failed: usize, elapsed: std::time::Duration) {
    let is_tty = io::stderr().is_terminal();
    let time_str = format_duration(elapsed);
    let files_word = if count == 1 { "file" } else { "files" };
    let failures = if failed > 0 { format!(", {} failed", failed) } else { String::new() };

    if is_tty {
        eprintln!("\n\x1b[1m✨ Generated {} {}{} in {}\x1b[0m", count, files_word, failures, time_str);
    } else {
        eprintln!("\n✨ Generated {} {}{} in {}", count, files_word, failures, time_str);
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let micros = d.as_micros();
    if micros < 1000 {
        format!("{}μs", micros)
    } else if micros < 1_000_000 {
        format!("{:.1}ms", micros as f64 / 1000.0)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}
