use std::io::{self, BufRead, Write};

use anyhow::{Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::platform::CredentialField;

pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    let mut stderr = io::stderr().lock();
    write!(stderr, "{prompt} [y/N]: ")?;
    stderr.flush()?;

    let mut input = String::new();
    let n = io::stdin().lock().read_line(&mut input)?;
    if n == 0 {
        return Ok(false);
    }
    Ok(parse_yes(&input))
}

pub(crate) fn parse_yes(input: &str) -> bool {
    matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Asks for one credential field on the terminal. Secret fields are read
/// without echo.
pub(crate) fn prompt_field(field: &CredentialField) -> Result<String> {
    let prompt = format!("{}: ", field.label);
    let value = if field.secret {
        prompt_hidden(&prompt)?
    } else {
        prompt_line(&prompt)?
    };
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(anyhow!("{} is required", field.label));
    }
    Ok(value)
}

pub(crate) fn prompt_line(prompt: &str) -> Result<String> {
    let mut stderr = io::stderr().lock();
    write!(stderr, "{prompt}")?;
    stderr.flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

pub(crate) fn prompt_hidden(prompt: &str) -> Result<String> {
    {
        let mut stderr = io::stderr().lock();
        write!(stderr, "{prompt}")?;
        stderr.flush()?;
    }

    terminal::enable_raw_mode()?;
    let result = read_hidden();
    let _ = terminal::disable_raw_mode();
    eprintln!();
    result
}

fn read_hidden() -> Result<String> {
    let mut value = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Enter => return Ok(value),
            KeyCode::Backspace => {
                value.pop();
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(anyhow!("cancelled"));
            }
            KeyCode::Esc => return Err(anyhow!("cancelled")),
            KeyCode::Char(c) => value.push(c),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_yes_accepts_only_explicit_yes() {
        for s in ["y", "Y", "yes", " YES \n"] {
            assert!(parse_yes(s));
        }
        for s in ["", "n", "no", "yep", "1"] {
            assert!(!parse_yes(s));
        }
    }
}
