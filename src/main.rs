use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sieve_dom::store::config_store;
use sieve_dom::{Document, EngineConfig, Registry};

#[derive(Parser)]
#[command(name = "sieve-dom")]
#[command(about = "Check, inspect and fix SIEVE scripts without reformatting them")]
struct Args {
    /// Engine config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output; repeat for trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse scripts and report syntax errors and require mismatches
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the node tree of a script as JSON
    Outline {
        file: PathBuf,
        /// Keep whitespace and comment nodes
        #[arg(long)]
        whitespace: bool,
    },
    /// Rewrite the require preamble to match the extensions in use
    Sync {
        file: PathBuf,
        /// Write the result back instead of printing it
        #[arg(long)]
        write: bool,
    },
}

struct Engine {
    registry: Arc<Registry>,
    config: EngineConfig,
}

impl Engine {
    fn load(path: Option<&Path>) -> sieve_dom::Result<Self> {
        let config = match path {
            Some(path) => config_store::load_config_from(path)?,
            None => config_store::load_config(),
        };
        let registry = Arc::new(Registry::from_config(&config)?);
        Ok(Self { registry, config })
    }

    fn parse(&self, path: &Path) -> sieve_dom::Result<Document> {
        let text = fs::read_to_string(path)?;
        let doc = Document::parse_with(Arc::clone(&self.registry), &text)?;
        Ok(doc.with_line_ending(self.config.line_ending))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let engine = match Engine::load(args.config.as_deref()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let ok = match args.command {
        Command::Check { files } => files.iter().fold(true, |ok, f| check(&engine, f) && ok),
        Command::Outline { file, whitespace } => report(outline(&engine, &file, whitespace), &file),
        Command::Sync { file, write } => report(sync(&engine, &file, write), &file),
    };
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn report(result: sieve_dom::Result<()>, file: &Path) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            eprintln!("{}: {e}", file.display());
            false
        }
    }
}

fn check(engine: &Engine, file: &Path) -> bool {
    let doc = match engine.parse(file) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("{}: {e}", file.display());
            return false;
        }
    };
    for warning in doc.check_capabilities() {
        println!("{}: warning: {warning}", file.display());
    }
    println!("{}: ok", file.display());
    true
}

fn outline(engine: &Engine, file: &Path, whitespace: bool) -> sieve_dom::Result<()> {
    let doc = engine.parse(file)?;
    let mut outline = doc.outline();
    if !whitespace {
        outline = outline
            .iter()
            .filter(|n| n.kind != "whitespace")
            .map(|n| n.without_whitespace())
            .collect();
    }
    println!("{}", serde_json::to_string_pretty(&outline)?);
    Ok(())
}

fn sync(engine: &Engine, file: &Path, write: bool) -> sieve_dom::Result<()> {
    let mut doc = engine.parse(file)?;
    let changed = doc.sync_require();
    if write {
        if changed {
            fs::write(file, doc.to_script())?;
            eprintln!("{}: require updated", file.display());
        }
    } else {
        print!("{}", doc.to_script());
    }
    Ok(())
}
