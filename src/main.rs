use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use lib::lox::Lox;
use lib::lox::LoxOptions;
use lib::lox::LoxParseError;
use lib::lox::LoxResolveError;
use lib::lox::LoxRuntimeError;
use lib::lox::LoxScanError;
use rustyline::error::ReadlineError;
use rustyline::Editor;
use std::fs;

/// Tree-walking Lox interpreter
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Script to run; starts a REPL when omitted
    #[clap()]
    script: Vec<String>,

    #[clap(flatten)]
    opts: LoxOptions,
}

fn run_file(script_path: &str, opts: LoxOptions) -> Result<()> {
    let mut l = Lox::new(opts);
    let data = fs::read_to_string(script_path)
        .with_context(|| format!("could not read script '{}'", script_path))?;
    l.run(&data, false)
}

// Errors from the pipeline have already been reported on stderr; anything
// else (I/O, readline) still needs to surface.
fn is_reported(err: &anyhow::Error) -> bool {
    err.downcast_ref::<LoxScanError>().is_some()
        || err.downcast_ref::<LoxParseError>().is_some()
        || err.downcast_ref::<LoxResolveError>().is_some()
        || err.downcast_ref::<LoxRuntimeError>().is_some()
}

fn run_prompt(opts: LoxOptions) -> Result<()> {
    let mut rl = Editor::<()>::new()?;
    let mut l = Lox::new(opts);
    loop {
        match rl.readline("> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str());
                let mut source = line.trim_end().to_owned();
                // Let bare expressions through without the trailing ';'.
                if !source.is_empty() && !source.ends_with(';') && !source.ends_with('}') {
                    source.push(';');
                }
                if let Err(err) = l.run(&source, true) {
                    if !is_reported(&err) {
                        return Err(err);
                    }
                }
                l.reset();
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.script.len() > 1 {
        println!("Usage: pylox [script]");
        ::std::process::exit(64);
    }
    let rv = match args.script.first() {
        None => run_prompt(args.opts),
        Some(script) => run_file(script, args.opts),
    };
    if let Err(e) = &rv {
        if e.downcast_ref::<LoxScanError>().is_some()
            || e.downcast_ref::<LoxParseError>().is_some()
            || e.downcast_ref::<LoxResolveError>().is_some()
        {
            ::std::process::exit(65);
        } else if e.downcast_ref::<LoxRuntimeError>().is_some() {
            ::std::process::exit(70);
        }
    }
    rv
}
