use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use macropp_directives::Recognizer;
use macropp_expander::{Expander, Harvester, MacroTable};
use macropp_foundation::errors::StderrSink;
use macropp_lexer::{Lexer, PieceSource};
use tracing::{debug, metadata::LevelFilter};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Expand macro calls to their definitions.
#[derive(Debug, Parser)]
struct Args {
    /// Input file to process. Reads standard input if absent.
    file: Option<PathBuf>,

    /// Write output to this file instead of standard output.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Print the lexer's piece stream, one piece per line, and exit.
    #[arg(long)]
    debug_tokenize: bool,

    /// Print the directive recognizer's item stream, one item per line, and exit.
    #[arg(long)]
    debug_matched: bool,
}

fn open_input(args: &Args) -> Result<Lexer> {
    match &args.file {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("cannot open input file '{}'", path.display()))?;
            Ok(Lexer::new(
                Some(path.display().to_string()),
                Box::new(BufReader::new(file)),
            ))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("cannot read standard input")?;
            Ok(Lexer::new(None, Box::new(io::Cursor::new(buf))))
        }
    }
}

fn base_dir(args: &Args) -> PathBuf {
    args.file
        .as_ref()
        .and_then(|path| path.parent())
        .map(|dir| dir.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn write_output(args: &Args, text: &str) -> Result<()> {
    match &args.output {
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("cannot create output file '{}'", path.display()))?;
            file.write_all(text.as_bytes())
                .with_context(|| format!("cannot write output file '{}'", path.display()))
        }
        None => io::stdout()
            .write_all(text.as_bytes())
            .context("cannot write standard output"),
    }
}

fn fallible_main(args: Args) -> Result<()> {
    let lexer = open_input(&args)?;

    if args.debug_tokenize {
        debug!("tokenizing only, no expansion will run");
        let mut lexer = lexer;
        loop {
            let piece = lexer.next_piece();
            let is_eof = piece.kind == macropp_lexer::PieceKind::EndOfFile;
            println!("{:?} {:?} {:?}", piece.kind, piece.position, piece.text);
            if is_eof {
                break;
            }
        }
        return Ok(());
    }

    if args.debug_matched {
        debug!("printing recognized directive stream, no expansion will run");
        let mut recognizer = Recognizer::new(lexer);
        let mut sink = StderrSink::new();
        while let Some(item) = recognizer.next(&mut sink) {
            println!("{item:?}");
        }
        return Ok(());
    }

    let recognizer = Recognizer::new(lexer);
    let harvester = Harvester::new(recognizer, base_dir(&args));
    let expander = Expander::new(harvester, MacroTable::new());

    let mut sink = StderrSink::new();
    let output = expander.expand_to_string(&mut sink);
    write_output(&args, &output)?;

    Ok(())
}

fn main() {
    let subscriber = tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        );
    tracing::subscriber::set_global_default(subscriber)
        .expect("cannot set default tracing subscriber");

    let args = Args::parse();

    if let Err(error) = fallible_main(args) {
        tracing::error!("{error:?}");
        std::process::exit(1);
    }
}
