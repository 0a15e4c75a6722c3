//! Parsing of input lines into view intents

/// What the user asked for with one line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SignIn,
    /// Finish a pending sign-in with the emailed code
    Verify(String),
    SignOut,
    Refresh,
    /// Resubmit the unsent draft
    Retry,
    Help,
    Quit,
    /// Text to post
    Compose(String),
    Unknown(String),
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        if !line.starts_with('/') {
            return Command::Compose(line.to_string());
        }

        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };

        match name.to_lowercase().as_str() {
            "/signin" | "/login" => Command::SignIn,
            "/verify" if !arg.is_empty() => Command::Verify(arg.to_string()),
            "/signout" | "/logout" => Command::SignOut,
            "/refresh" | "/r" => Command::Refresh,
            "/retry" => Command::Retry,
            "/help" | "/h" | "/?" => Command::Help,
            "/quit" | "/exit" | "/q" => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_composed() {
        assert_eq!(
            Command::parse("  Buy calls on SPY "),
            Command::Compose("Buy calls on SPY".to_string())
        );
    }

    #[test]
    fn test_commands_and_aliases() {
        assert_eq!(Command::parse("/signin"), Command::SignIn);
        assert_eq!(Command::parse("/LOGOUT"), Command::SignOut);
        assert_eq!(Command::parse("/r"), Command::Refresh);
        assert_eq!(Command::parse("/retry"), Command::Retry);
        assert_eq!(Command::parse("/?"), Command::Help);
        assert_eq!(Command::parse("/q"), Command::Quit);
        assert_eq!(Command::parse("   "), Command::Empty);
    }

    #[test]
    fn test_verify_requires_code() {
        assert_eq!(
            Command::parse("/verify  123456 "),
            Command::Verify("123456".to_string())
        );
        assert_eq!(
            Command::parse("/verify"),
            Command::Unknown("/verify".to_string())
        );
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            Command::parse("/models"),
            Command::Unknown("/models".to_string())
        );
    }
}
