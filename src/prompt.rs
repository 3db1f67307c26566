//! Line-based interactive prompts.
//!
//! Every answer goes through a parser that returns either a value or a
//! [`VirtuosoError::Validation`]. A validation error is printed and the same
//! question is asked again; any other error (including EOF on the input)
//! ends the prompt.

use std::io::{self, BufRead, StdinLock, Stdout, Write};

use crate::error::{Result, VirtuosoError};

pub struct Prompter<R: BufRead, W: Write> {
    input: R,
    output: W,
}

impl Prompter<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Prompter::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Prompter { input, output }
    }

    /// Pick one option from a numbered list. Empty input picks the first.
    pub fn select(&mut self, question: &str, options: &[String]) -> Result<usize> {
        writeln!(self.output, "\n{}", question)?;
        for (i, option) in options.iter().enumerate() {
            writeln!(self.output, "  {}: {}", i + 1, option)?;
        }
        let prompt = format!("Select 1-{} (ENTER for 1): ", options.len());
        self.ask(&prompt, |answer| parse_selection(answer, options.len()))
    }

    /// Yes/no question with a default for empty input.
    pub fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        let prompt = format!("{} [{}]: ", question, hint);
        self.ask(&prompt, |answer| parse_confirm(answer, default))
    }

    /// Non-negative number with a default for empty input.
    pub fn number(&mut self, question: &str, default: f64) -> Result<f64> {
        let prompt = format!("{} (ENTER for {}): ", question, default);
        self.ask(&prompt, |answer| parse_number(answer, default))
    }

    fn ask<T>(&mut self, prompt: &str, parse: impl Fn(&str) -> Result<T>) -> Result<T> {
        loop {
            let answer = self.read_answer(prompt)?;
            match parse(&answer) {
                Err(VirtuosoError::Validation(message)) => {
                    writeln!(self.output, "⚠️  {}", message)?;
                }
                other => return other,
            }
        }
    }

    fn read_answer(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(VirtuosoError::PromptClosed);
        }
        Ok(line.trim().to_string())
    }
}

/// 1-based choice out of `count`; empty means the first option.
pub fn parse_selection(answer: &str, count: usize) -> Result<usize> {
    if answer.is_empty() {
        return Ok(0);
    }
    match answer.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Ok(n - 1),
        _ => Err(VirtuosoError::Validation(format!(
            "Please enter a number between 1 and {}",
            count
        ))),
    }
}

pub fn parse_confirm(answer: &str, default: bool) -> Result<bool> {
    match answer.to_lowercase().as_str() {
        "" => Ok(default),
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        _ => Err(VirtuosoError::Validation("Please answer y or n".to_string())),
    }
}

/// A finite, non-negative number; empty means `default`.
pub fn parse_number(answer: &str, default: f64) -> Result<f64> {
    if answer.is_empty() {
        return Ok(default);
    }
    match answer.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(VirtuosoError::Validation(format!(
            "{:?} is not a valid number of milliseconds",
            answer
        ))),
    }
}
