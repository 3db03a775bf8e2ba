//! Command extraction from a raw decision response.

use crate::error::NoCommandExtracted;

/// A decision response split into the command and its trailing explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub command: String,
    /// Lines after the command, kept for logs only.
    pub explanation: Option<String>,
}

/// Take the first non-empty trimmed line of `response` as the command.
pub fn extract_command(response: &str) -> Result<ParsedResponse, NoCommandExtracted> {
    let mut lines = response.lines();
    let command = lines
        .by_ref()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or(NoCommandExtracted)?
        .to_string();
    let explanation = lines
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    Ok(ParsedResponse {
        command,
        explanation: (!explanation.is_empty()).then_some(explanation),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_non_empty_line_is_the_command() {
        let parsed = extract_command("\n\n   open mailbox  \nMaybe there's a letter inside.\n")
            .expect("command");
        assert_eq!(parsed.command, "open mailbox");
        assert_eq!(
            parsed.explanation.as_deref(),
            Some("Maybe there's a letter inside.")
        );
    }

    #[test]
    fn single_line_has_no_explanation() {
        let parsed = extract_command("look").expect("command");
        assert_eq!(parsed.command, "look");
        assert_eq!(parsed.explanation, None);
    }

    #[test]
    fn whitespace_only_response_yields_no_command() {
        assert_eq!(extract_command(""), Err(NoCommandExtracted));
        assert_eq!(extract_command("  \n\t\n \r\n"), Err(NoCommandExtracted));
    }
}
