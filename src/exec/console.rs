// src/exec/console.rs

//! Operator interaction: showing action text and reading answers.

use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;

use crate::engine::VariableSource;
use crate::errors::{PlanrunError, Result};

/// Column at which action text is wrapped.
const WRAP_COLUMN: usize = 72;
/// Width a leading tab occupies on the terminal.
const TAB_WIDTH: usize = 8;

pub trait Console: Send + Sync + 'static {
    /// Print text for the operator.
    fn show(&self, text: &str);

    /// Print `question` and read one line. `None` means end of input.
    fn ask(&self, question: String) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'static>>;
}

/// Console on the process's stdin/stdout.
///
/// Questions are serialized, so concurrent actions never interleave prompts.
#[derive(Debug, Clone)]
pub struct StdConsole {
    input: Arc<Mutex<BufReader<Stdin>>>,
}

impl StdConsole {
    pub fn new() -> Self {
        Self {
            input: Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()))),
        }
    }
}

impl Default for StdConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for StdConsole {
    fn show(&self, text: &str) {
        println!("{text}");
    }

    fn ask(&self, question: String) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'static>> {
        let input = Arc::clone(&self.input);
        Box::pin(async move {
            let mut reader = input.lock().await;

            print!("{question}");
            std::io::stdout().flush()?;

            let mut line = String::new();
            match reader.read_line(&mut line).await? {
                0 => Ok(None),
                _ => Ok(Some(line.trim_end_matches(['\r', '\n']).to_string())),
            }
        })
    }
}

/// Asks the operator for variable values through a [`Console`].
#[derive(Debug)]
pub struct ConsoleSource<C> {
    console: Arc<C>,
}

impl<C: Console> ConsoleSource<C> {
    pub fn new(console: Arc<C>) -> Self {
        Self { console }
    }
}

impl<C: Console> VariableSource for ConsoleSource<C> {
    fn name(&self) -> &str {
        "console"
    }

    fn resolve<'a>(
        &'a mut self,
        variable: &'a str,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        let answer = self.console.ask(format!("{prompt} "));
        Box::pin(async move {
            match answer.await? {
                Some(value) => Ok(value.trim().to_string()),
                None => Err(PlanrunError::VariableResolution {
                    variable: variable.to_string(),
                    reason: "input closed before a value was given".to_string(),
                }),
            }
        })
    }
}

/// Only an explicit yes counts as success.
pub fn parse_response(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes" | "t" | "true"
    )
}

/// Banner printed before each action.
pub fn header(id: &str) -> String {
    format!("---[ {id} ] ---------------------")
}

/// Indent `text` by one tab and wrap it so it fits an 80-column terminal.
pub fn wrap_text(text: &str) -> String {
    let mut out = String::new();

    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push('\t');
        let mut col = TAB_WIDTH;
        let mut line_start = true;

        for word in line.split_whitespace() {
            if !line_start && col + 1 + word.len() > WRAP_COLUMN {
                out.push_str("\n\t");
                col = TAB_WIDTH;
                line_start = true;
            }
            if !line_start {
                out.push(' ');
                col += 1;
            }
            out.push_str(word);
            col += word.len();
            line_start = false;
        }
    }

    out.trim_end().to_string()
}
