//! Driver for the interpreter: the linear pipeline
//! *source → tokens → AST → resolved bindings → evaluation*,
//! run over a file or an interactive prompt.
//!
//! The driver owns the long-lived interpreter (so globals and binding
//! distances persist across prompt lines) and the two process-wide flags
//! that decide exit codes: `had_error` for static errors, which suppresses
//! evaluation, and `had_runtime_error`.

use std::io::Write;

use log::{debug, info};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::token::Token;

const PROMPT: &str = "[lox]> ";

pub struct Lox {
    interpreter: Interpreter,
    had_error: bool,
    had_runtime_error: bool,
}

impl Lox {
    pub fn new() -> Self {
        Lox {
            interpreter: Interpreter::new(),
            had_error: false,
            had_runtime_error: false,
        }
    }

    /// Build a driver whose `print` output goes to the given sink.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        Lox {
            interpreter: Interpreter::with_output(out),
            had_error: false,
            had_runtime_error: false,
        }
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Run one whole program through the pipeline.  Diagnostics go to
    /// standard output; the flags record what kind of failure, if any,
    /// occurred.
    pub fn run(&mut self, source: &str) {
        info!("Running {} bytes of source", source.len());

        // Scan.  Every lexical error is reported; scanning continues past
        // them so one run surfaces them all.
        let scanner = Scanner::new(source.as_bytes().to_vec());
        let mut tokens: Vec<Token> = Vec::new();

        for item in scanner {
            match item {
                Ok(token) => tokens.push(token),

                Err(e) => self.static_error(&e),
            }
        }

        // Parse.  The parser synchronises internally and hands back every
        // error it recovered from.
        let mut parser = Parser::new(tokens);
        let (statements, errors) = parser.parse();

        for e in &errors {
            self.static_error(e);
        }

        // A static error suppresses everything downstream.
        if self.had_error {
            debug!("Static error(s) reported; skipping evaluation");
            return;
        }

        // Resolve.
        let mut resolver = Resolver::new(&mut self.interpreter);

        if let Err(e) = resolver.resolve(&statements) {
            self.static_error(&e);
            return;
        }

        // Evaluate.
        if let Err(e) = self.interpreter.interpret(&statements) {
            println!("{}", e);
            self.had_runtime_error = true;
        }
    }

    /// Execute a script file.
    pub fn run_file(&mut self, path: &std::path::Path) -> anyhow::Result<()> {
        let buf: Vec<u8> = std::fs::read(path)?;
        let source: String = String::from_utf8(buf).map_err(LoxError::from)?;

        self.run(&source);

        Ok(())
    }

    /// Interactive prompt: each submitted line is a full pipeline run
    /// against the same interpreter.  Errors are displayed and the loop
    /// continues; `exit` or end-of-input leaves.
    pub fn run_prompt(&mut self) -> anyhow::Result<()> {
        let mut editor = DefaultEditor::new()?;

        loop {
            match editor.readline(PROMPT) {
                Ok(line) => {
                    if line.trim() == "exit" {
                        break;
                    }

                    let _ = editor.add_history_entry(line.as_str());

                    self.run(&line);

                    // Mistakes on one line must not doom the session.
                    self.had_error = false;
                    self.had_runtime_error = false;
                }

                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,

                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    fn static_error(&mut self, e: &LoxError) {
        println!("{}", e);
        self.had_error = true;
    }
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}
