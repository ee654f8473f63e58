//! Line-oriented user interaction.

use std::io::{BufRead, StdinLock, Stdout, Write};

use anyhow::{Context, Result};
use zeroize::Zeroizing;

pub trait Terminal {
    fn say(&mut self, text: &str) -> Result<()>;

    /// Read one line, echoed. Trailing newline removed.
    fn ask(&mut self, prompt: &str) -> Result<Zeroizing<String>>;

    /// Read one line without echo where the terminal supports it.
    fn ask_secret(&mut self, prompt: &str) -> Result<Zeroizing<String>>;
}

pub struct LineTerminal<R, W> {
    input: R,
    output: W,
    hide_secrets: bool,
}

impl<R: BufRead, W: Write> LineTerminal<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            hide_secrets: false,
        }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }
}

impl LineTerminal<StdinLock<'static>, Stdout> {
    /// Standard streams, with passwords read from the tty without echo.
    pub fn stdio() -> Self {
        let mut term = Self::new(std::io::stdin().lock(), std::io::stdout());
        term.hide_secrets = true;
        term
    }
}

impl<R: BufRead, W: Write> Terminal for LineTerminal<R, W> {
    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{}", text)?;
        Ok(())
    }

    fn ask(&mut self, prompt: &str) -> Result<Zeroizing<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = Zeroizing::new(String::new());
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read input")?;
        anyhow::ensure!(read > 0, "Input closed");

        let trimmed_len = line.trim_end_matches(&['\r', '\n'][..]).len();
        line.truncate(trimmed_len);
        Ok(line)
    }

    fn ask_secret(&mut self, prompt: &str) -> Result<Zeroizing<String>> {
        if !self.hide_secrets {
            return self.ask(prompt);
        }
        self.output.flush()?;
        let secret = rpassword::prompt_password_stdout(prompt).context("Failed to read input")?;
        Ok(Zeroizing::new(secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_ask_strips_line_endings() {
        let mut term = LineTerminal::new(Cursor::new("first\r\nsecond\n"), Vec::new());
        assert_eq!(term.ask("> ").unwrap().as_str(), "first");
        assert_eq!(term.ask_secret("> ").unwrap().as_str(), "second");
        assert!(term.ask("> ").is_err());
        assert_eq!(term.into_output(), b"> > > ");
    }
}
