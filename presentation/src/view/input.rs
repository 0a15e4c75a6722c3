//! Terminal input
//!
//! Lines are read on a dedicated thread because a blocking stdin read cannot
//! be cancelled and would otherwise hold up runtime shutdown.

use async_trait::async_trait;
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};
use tradehub_application::EmailPrompt;

const LINE_QUEUE: usize = 16;

/// Shared source of input lines
///
/// Clones read from the same queue, so the view loop and the email prompt
/// take turns consuming stdin.
#[derive(Clone)]
pub struct TerminalInput {
    lines: Arc<Mutex<mpsc::Receiver<String>>>,
}

impl TerminalInput {
    /// Start reading stdin on a background thread
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::channel(LINE_QUEUE);
        std::thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
            debug!("Stdin closed");
        });
        Self::from_receiver(rx)
    }

    /// Read lines from an existing queue
    pub fn from_receiver(rx: mpsc::Receiver<String>) -> Self {
        Self {
            lines: Arc::new(Mutex::new(rx)),
        }
    }

    /// Next line, or `None` once input is closed
    pub async fn next_line(&self) -> Option<String> {
        self.lines.lock().await.recv().await
    }
}

fn print_prompt(text: &str) {
    print!("{}", text);
    // A failed flush only delays the prompt text
    let _ = io::stdout().flush();
}

/// Answers sign-in prompts from the terminal
pub struct TerminalEmailPrompt {
    input: TerminalInput,
}

impl TerminalEmailPrompt {
    pub fn new(input: TerminalInput) -> Self {
        Self { input }
    }
}

#[async_trait]
impl EmailPrompt for TerminalEmailPrompt {
    async fn request_email(&self) -> Option<String> {
        println!();
        println!("{}", "Sign in".cyan().bold());
        print_prompt(&format!("{} ", "Email (blank to cancel):".cyan()));
        self.input.next_line().await
    }

    async fn request_code(&self, email: &str) -> Option<String> {
        println!("A sign-in code was sent to {}.", email.bold());
        print_prompt(&format!(
            "{} ",
            "Code (blank to enter later with /verify <code>):".cyan()
        ));
        self.input.next_line().await
    }
}
