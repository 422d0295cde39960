//! Console frontend.
//!
//! A [`PromptBackend`] for terminal applications, plus the default
//! device-code prompt. Console applications have no toolkit thread, so every
//! thread counts as interactive and jobs run inline.

use std::io::{BufRead, Write};

use keyfob_core::{DeviceCode, PromptChoice};

use crate::prompt::{CertPrompt, PromptBackend};

/// Prompt backend that asks on stdout/stdin.
#[derive(Debug, Default)]
pub struct ConsolePrompt;

impl ConsolePrompt {
    pub fn new() -> Self {
        Self
    }

    fn read_reply(&self) -> Option<String> {
        print!("Accept this certificate? (y)es/(N)o/(s)ave: ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_ascii_lowercase()),
        }
    }
}

impl PromptBackend for ConsolePrompt {
    fn is_interactive_thread(&self) -> bool {
        true
    }

    fn run_on_interactive(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }

    fn prompt(&self, request: &CertPrompt) -> PromptChoice {
        let category = request.category.name();
        println!("{category}");
        println!("{}", "=".repeat(category.len()));
        println!();
        if !request.title.is_empty() {
            println!("{}", request.title);
            println!("{}", "=".repeat(request.title.len()));
            println!();
        }
        println!("{}", request.message);
        println!();

        // EOF or a read failure rejects; there is no silent accept.
        match self.read_reply().as_deref() {
            Some("y") | Some("yes") => PromptChoice::AcceptOnce,
            Some("s") | Some("save") => PromptChoice::AcceptAndSave,
            _ => PromptChoice::Reject,
        }
    }
}

/// Print the default device-code instructions to stdout.
pub fn print_device_code(code: &DeviceCode) {
    println!("Authorize this device by visiting:");
    println!();
    println!(
        "  {}",
        xterm_link(&code.verification_uri_complete, &code.verification_uri)
    );
    println!("  and entering the code {}", code.user_code);
    let _ = std::io::stdout().flush();
}

/// Render `text` as an OSC 8 hyperlink to `url` on xterm-like terminals,
/// plain text elsewhere.
#[must_use]
pub fn xterm_link(url: &str, text: &str) -> String {
    let term = std::env::var("TERM").unwrap_or_else(|_| "vt100".to_string());
    if term.starts_with("xterm") {
        format!("\x1b]8;;{url}\x1b\\{text}\x1b]8;;\x1b\\")
    } else {
        text.to_string()
    }
}
