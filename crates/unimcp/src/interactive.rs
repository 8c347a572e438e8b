//! Interactive tool selection.
//!
//! Shows a numbered menu of the server's tools, reads a selection such as
//! `1,3`, `1-3` or `all`, then asks for JSON arguments for each chosen tool.

use anyhow::Result;
use console::style;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde_json::{Map, Value};

use unimcp_engine::{ToolCall, ToolInfo};

/// A parsed menu selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Zero-based tool indices, in the order given.
    Tools(Vec<usize>),
    /// Blank input; run nothing.
    Skip,
    /// Input that is neither numbers, ranges nor `all`.
    Invalid,
}

/// Parse a menu selection against `count` tools.
///
/// Numbers are one-based. Indices outside `1..=count` are dropped.
pub fn parse_selection(input: &str, count: usize) -> Selection {
    let input = input.trim();
    if input.is_empty() {
        return Selection::Skip;
    }
    if input.eq_ignore_ascii_case("all") {
        return Selection::Tools((0..count).collect());
    }

    let mut indices = Vec::new();
    for part in input.split(',').map(str::trim) {
        if let Some((start, end)) = part.split_once('-') {
            let (Ok(start), Ok(end)) = (start.trim().parse::<usize>(), end.trim().parse::<usize>())
            else {
                return Selection::Invalid;
            };
            indices.extend(start..=end.min(count));
        } else {
            let Ok(n) = part.parse::<usize>() else {
                return Selection::Invalid;
            };
            indices.push(n);
        }
    }

    Selection::Tools(
        indices
            .into_iter()
            .filter(|n| (1..=count).contains(n))
            .map(|n| n - 1)
            .collect(),
    )
}

/// Required and optional parameters of a tool, one per line.
pub fn schema_summary(tool: &ToolInfo) -> String {
    let params = tool.params();
    if params.is_empty() {
        return "No parameters".to_string();
    }
    let required = tool.required_params();

    let mut lines = Vec::new();
    let (req, opt): (Vec<(&str, Option<&str>)>, Vec<(&str, Option<&str>)>) = params
        .into_iter()
        .partition(|(n, _)| required.contains(n));
    if !req.is_empty() {
        lines.push("Required parameters:".to_string());
        lines.extend(req.into_iter().map(|(n, d)| param_line(n, d)));
    }
    if !opt.is_empty() {
        lines.push("Optional parameters:".to_string());
        lines.extend(opt.into_iter().map(|(n, d)| param_line(n, d)));
    }
    lines.join("\n")
}

fn param_line(name: &str, description: Option<&str>) -> String {
    format!("  • {}: {}", name, description.unwrap_or("No description"))
}

/// Parse an argument line. Blank means `{}`.
pub fn parse_arguments(input: &str) -> serde_json::Result<Value> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(input)
}

/// Run the menu on the terminal and return the calls to make.
///
/// End of input or Ctrl-C at any prompt abandons the selection.
pub fn select_tools(tools: &[ToolInfo]) -> Result<Vec<ToolCall>> {
    if tools.is_empty() {
        eprintln!("No tools available for interactive selection.");
        return Ok(Vec::new());
    }

    eprintln!("\n{}", style("Interactive Tool Selection").bold());
    eprintln!("{}", "=".repeat(50));
    for (i, tool) in tools.iter().enumerate() {
        eprintln!("{:2}. {}", i + 1, style(&tool.name).cyan());
        eprintln!(
            "    {}",
            style(tool.description.as_deref().unwrap_or("No description")).dim()
        );
    }
    eprintln!("\nSelect tools by entering numbers (e.g. '1,3,5' or '1-3' or 'all'):");
    eprintln!("Press ENTER with no input to skip tool execution");

    let mut editor = DefaultEditor::new()?;

    let indices = loop {
        let Some(line) = read_line(&mut editor, "Tools to run > ")? else {
            return Ok(Vec::new());
        };
        match parse_selection(&line, tools.len()) {
            Selection::Skip => {
                eprintln!("No tools selected.");
                return Ok(Vec::new());
            }
            Selection::Tools(indices) if !indices.is_empty() => break indices,
            Selection::Tools(_) => eprintln!("No valid tools selected. Please try again."),
            Selection::Invalid => {
                eprintln!("Invalid selection. Please use numbers, ranges (1-3), or 'all'.")
            }
        }
    };

    let mut calls = Vec::with_capacity(indices.len());
    for index in indices {
        let tool = &tools[index];
        eprintln!("\nConfigure tool: {}", style(&tool.name).cyan());
        eprintln!("{}", schema_summary(tool));
        eprintln!("\nEnter arguments as JSON (or press ENTER for empty arguments):");

        let arguments = loop {
            let Some(line) = read_line(&mut editor, "> ")? else {
                return Ok(Vec::new());
            };
            match parse_arguments(&line) {
                Ok(arguments) => break arguments,
                Err(e) => eprintln!("Invalid JSON: {}. Please try again:", e),
            }
        };
        calls.push(ToolCall::new(&tool.name).with_arguments(arguments));
    }
    Ok(calls)
}

/// `None` on end of input or interrupt.
fn read_line(editor: &mut DefaultEditor, prompt: &str) -> Result<Option<String>> {
    match editor.readline(prompt) {
        Ok(line) => Ok(Some(line)),
        Err(ReadlineError::Eof | ReadlineError::Interrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_selection_lists_and_ranges() {
        assert_eq!(parse_selection("1,3", 5), Selection::Tools(vec![0, 2]));
        assert_eq!(parse_selection("2-4", 5), Selection::Tools(vec![1, 2, 3]));
        assert_eq!(parse_selection(" 1 , 4-5 ", 5), Selection::Tools(vec![0, 3, 4]));
        assert_eq!(parse_selection("ALL", 3), Selection::Tools(vec![0, 1, 2]));
    }

    #[test]
    fn test_parse_selection_edge_cases() {
        assert_eq!(parse_selection("", 3), Selection::Skip);
        assert_eq!(parse_selection("   ", 3), Selection::Skip);
        assert_eq!(parse_selection("0,2,9", 3), Selection::Tools(vec![1]));
        assert_eq!(parse_selection("3-1", 3), Selection::Tools(vec![]));
        assert_eq!(parse_selection("two", 3), Selection::Invalid);
        assert_eq!(parse_selection("1-x", 3), Selection::Invalid);
    }

    #[test]
    fn test_schema_summary_splits_required() {
        let tool = ToolInfo {
            name: "geocode".to_string(),
            description: None,
            input_schema: json!({
                "type": "object",
                "properties": {
                    "address": { "type": "string", "description": "Street address" },
                    "region": { "type": "string" }
                },
                "required": ["address"]
            }),
        };
        assert_eq!(
            schema_summary(&tool),
            "Required parameters:\n  • address: Street address\nOptional parameters:\n  • region: No description"
        );
    }

    #[test]
    fn test_schema_summary_without_properties() {
        let tool = ToolInfo {
            name: "ping".to_string(),
            description: None,
            input_schema: json!({"type": "object"}),
        };
        assert_eq!(schema_summary(&tool), "No parameters");

        let tool = ToolInfo {
            name: "opt".to_string(),
            description: None,
            input_schema: json!({"properties": {"x": {"description": "An x"}}}),
        };
        assert_eq!(schema_summary(&tool), "Optional parameters:\n  • x: An x");
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments("").unwrap(), json!({}));
        assert_eq!(parse_arguments(r#"{"q": 1}"#).unwrap(), json!({"q": 1}));
        assert!(parse_arguments("{oops").is_err());
    }
}
