use crate::ast::ExprId;
use crate::interpreter::Interpreter;
use crate::lox_error::LoxError;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner;
use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use derive_more::Display;

pub use crate::interpreter::LoxRuntimeError;

// Zero-sized markers attached to the anyhow chain so main can map a failed
// stage to the right process exit code.
#[derive(Debug, Display)]
#[display(fmt = "scan error")]
pub struct LoxScanError {}

#[derive(Debug, Display)]
#[display(fmt = "parse error")]
pub struct LoxParseError {}

#[derive(Debug, Display)]
#[display(fmt = "resolve error")]
pub struct LoxResolveError {}

#[derive(clap::Args, Debug, Default)]
pub struct LoxOptions {
    /// Dump the parsed syntax tree before running
    #[clap(short, long)]
    pub debug_ast: bool,
}

/// The pipeline driver: owns the sticky error flags, the interpreter (so
/// globals survive across REPL lines), and the expression-id counter shared
/// by every parse.
pub struct Lox {
    pub has_error: bool,
    pub has_runtime_error: bool,
    next_expr_id: ExprId,
    opts: LoxOptions,
    interpreter: Interpreter,
}

impl Lox {
    pub fn new(opts: LoxOptions) -> Lox {
        Lox {
            has_error: false,
            has_runtime_error: false,
            next_expr_id: 0,
            opts,
            interpreter: Interpreter::new(),
        }
    }

    /// Clear the compile-error flag between REPL lines.
    pub fn reset(&mut self) {
        self.has_error = false;
    }

    pub fn run(&mut self, source: &str, repl: bool) -> Result<()> {
        let tokens = scanner::scan_tokens(self, source);
        if self.has_error {
            return Err(anyhow!("failed to scan")).context(LoxScanError {});
        }

        let start_id = self.next_expr_id;
        let mut parser = Parser::new(&tokens, self, start_id);
        let statements = parser.parse();
        let next_id = parser.next_id();
        self.next_expr_id = next_id;
        if self.opts.debug_ast {
            println!("AST: {:#?}", statements);
        }
        if self.has_error {
            return Err(anyhow!("failed to parse")).context(LoxParseError {});
        }

        let resolver = Resolver::new(self);
        let locals = resolver.resolve(&statements);
        if self.has_error {
            return Err(anyhow!("failed to resolve")).context(LoxResolveError {});
        }

        self.interpreter.merge_locals(locals);
        if let Err(e) = self.interpreter.interpret(&statements, repl) {
            self.runtime_error(&e);
            return Err(anyhow::Error::new(e));
        }
        Ok(())
    }

    fn runtime_error(&mut self, error: &LoxRuntimeError) {
        eprintln!("{}", error);
        self.has_runtime_error = true;
    }
}

impl Default for Lox {
    fn default() -> Self {
        Self::new(LoxOptions::default())
    }
}

impl LoxError for Lox {
    fn error(&mut self, line: i32, message: &str) {
        self.report(line, "", message);
    }

    fn report(&mut self, line: i32, wh: &str, message: &str) {
        eprintln!(
            "[line {line}]: Error {wh}: {message}",
            line = line,
            wh = wh,
            message = message
        );
        self.has_error = true;
    }

    fn has_error(&self) -> bool {
        self.has_error
    }
}
