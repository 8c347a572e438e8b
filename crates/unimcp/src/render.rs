//! Terminal and JSON presentation of handshake snapshots and tool results.
//!
//! Every function returns a `String`; callers decide where it goes.

use std::fmt::Write as _;

use console::style;
use serde_json::{Value, json};

use unimcp_engine::{
    CallToolResult, McpError, ServerCapabilities, ToolCall, ToolContent, ToolOutcome,
};

const NO_DESCRIPTION: &str = "No description available";

/// Header printed before connecting.
pub fn banner<'a>(server: &str, credentials: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = format!(
        "{}\n  Server: {}",
        style("Universal MCP Client").bold(),
        style(server).cyan()
    );
    let names: Vec<&str> = credentials.into_iter().collect();
    if !names.is_empty() {
        let _ = write!(out, "\n  Credentials: {}", names.join(", "));
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Capabilities
// ─────────────────────────────────────────────────────────────────────────────

/// Human-readable listing of everything the server offered.
pub fn snapshot(caps: &ServerCapabilities) -> String {
    let mut out = String::new();

    let server = match &caps.server_info {
        Some(info) => format!("{} {}", info.name, info.version),
        None => "MCP server".to_string(),
    };
    let _ = writeln!(
        out,
        "{} {} initialized (protocol {})",
        style("✓").green(),
        server,
        caps.protocol_version
    );

    if caps.tools.is_empty() {
        let _ = writeln!(out, "{} No tools available", style("✓").green());
    } else {
        let _ = writeln!(out, "{} Available tools:", style("✓").green());
        for tool in &caps.tools {
            let _ = writeln!(
                out,
                "  • {}: {}",
                style(&tool.name).cyan(),
                style(tool.description.as_deref().unwrap_or(NO_DESCRIPTION)).magenta()
            );
        }
    }

    if caps.resources.is_empty() {
        let _ = writeln!(out, "{} No resources available", style("✓").green());
    } else {
        let names: Vec<&str> = caps
            .resources
            .iter()
            .map(|r| r.name.as_deref().unwrap_or(&r.uri))
            .collect();
        let _ = writeln!(
            out,
            "{} Available resources: {}",
            style("✓").green(),
            names.join(", ")
        );
    }

    if caps.prompts.is_empty() {
        let _ = writeln!(out, "{} No prompts available", style("✓").green());
    } else {
        let names: Vec<&str> = caps.prompts.iter().map(|p| p.name.as_str()).collect();
        let _ = writeln!(
            out,
            "{} Available prompts: {}",
            style("✓").green(),
            names.join(", ")
        );
    }

    for failure in &caps.listing_failures {
        let _ = writeln!(
            out,
            "{} Failed to list {}: {}",
            style("✗").red(),
            failure.category,
            failure.reason
        );
    }

    out.trim_end().to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool results
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of one tool call.
pub fn tool_result(name: &str, result: &unimcp_engine::Result<ToolOutcome>) -> String {
    let title = format!("Tool: {}", name);
    match result {
        Ok(ToolOutcome::Completed(call)) => completed(&title, call),
        Ok(ToolOutcome::Failed(err)) => format!(
            "{} {}\n  RPC error {}: {}",
            style("✗").red(),
            style(&title).red(),
            err.code,
            err.message
        ),
        Err(err) => format!(
            "{} {}\n  {}",
            style("✗").red(),
            style(&title).red(),
            engine_error(err)
        ),
    }
}

/// An engine error with its kind, e.g. `[Timeout] no response to ...`.
pub fn engine_error(err: &McpError) -> String {
    format!("[{:?}] {}", err.kind(), err)
}

fn completed(title: &str, call: &CallToolResult) -> String {
    let mut out = if call.is_error() {
        format!("{} {}:", style("✗").red(), style(title).red())
    } else {
        format!("{} {}:", style("✓").green(), style(title).green())
    };

    if call.content.is_empty() {
        let _ = write!(out, "\n  {}", style("No content in response").dim());
    }

    for (i, item) in call.content.iter().enumerate() {
        let n = i + 1;
        match item {
            ToolContent::Text { text } => {
                let _ = write!(out, "\n  {}", style(format!("Content {} (text):", n)).cyan());
                out.push_str(&text_block(text));
            }
            ToolContent::Image { mime_type, .. } => {
                let _ = write!(
                    out,
                    "\n  {}\n    Image data available (type: {})",
                    style(format!("Content {} (image):", n)).yellow(),
                    mime_type
                );
            }
            ToolContent::Audio { mime_type, .. } => {
                let _ = write!(
                    out,
                    "\n  {}\n    Audio data available (type: {})",
                    style(format!("Content {} (audio):", n)).yellow(),
                    mime_type
                );
            }
            ToolContent::Resource { resource } => {
                let _ = write!(
                    out,
                    "\n  {}\n    Resource: {}",
                    style(format!("Content {} (resource):", n)).blue(),
                    resource.uri
                );
            }
            ToolContent::ResourceLink { uri, .. } => {
                let _ = write!(
                    out,
                    "\n  {}\n    Resource: {}",
                    style(format!("Content {} (resource link):", n)).blue(),
                    uri
                );
            }
            ToolContent::Unknown => {
                let _ = write!(
                    out,
                    "\n  {}",
                    style(format!("Content {} (unsupported type)", n)).dim()
                );
            }
        }
    }

    if let Some(structured) = &call.structured_content {
        let _ = write!(out, "\n  {}", style("Structured content:").cyan());
        out.push_str(&indent(&pretty(structured), 4));
    }

    out
}

/// Text content, pretty-printed when it is a JSON document.
fn text_block(text: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(text) {
        if parsed.is_object() || parsed.is_array() {
            return indent(&pretty(&parsed), 4);
        }
    }
    let mut out = String::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let _ = write!(out, "\n    {}", line);
    }
    out
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn indent(block: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    block.lines().map(|l| format!("\n{}{}", pad, l)).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON output
// ─────────────────────────────────────────────────────────────────────────────

/// Machine-readable report of a whole run.
pub fn json_report(
    caps: &ServerCapabilities,
    calls: &[ToolCall],
    results: &[unimcp_engine::Result<ToolOutcome>],
) -> Value {
    let results: Vec<Value> = calls
        .iter()
        .zip(results)
        .map(|(call, result)| json_result(&call.name, result))
        .collect();
    json!({
        "capabilities": caps,
        "results": results,
    })
}

fn json_result(name: &str, result: &unimcp_engine::Result<ToolOutcome>) -> Value {
    match result {
        Ok(ToolOutcome::Completed(call)) => {
            let status = if call.is_error() { "tool_error" } else { "ok" };
            json!({
                "tool": name,
                "status": status,
                "result": call,
            })
        }
        Ok(ToolOutcome::Failed(err)) => json!({
            "tool": name,
            "status": "rpc_error",
            "error": err,
        }),
        Err(err) => json!({
            "tool": name,
            "status": "failed",
            "error": {
                "kind": format!("{:?}", err.kind()),
                "message": err.to_string(),
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use console::strip_ansi_codes;
    use unimcp_engine::{
        CapabilityCategory, JsonRpcError, ListingFailure, PromptInfo, ResourceInfo, ServerInfo,
        ToolInfo,
    };

    fn caps() -> ServerCapabilities {
        ServerCapabilities {
            protocol_version: "2025-06-18".to_string(),
            server_info: Some(ServerInfo {
                name: "maps".to_string(),
                version: "1.2.0".to_string(),
            }),
            flags: Default::default(),
            instructions: None,
            tools: vec![ToolInfo {
                name: "geocode".to_string(),
                description: Some("Address to coordinates".to_string()),
                input_schema: json!({"type": "object"}),
            }],
            resources: vec![ResourceInfo {
                uri: "file:///a.txt".to_string(),
                name: None,
                description: None,
                mime_type: None,
            }],
            prompts: vec![PromptInfo {
                name: "greet".to_string(),
                description: None,
                arguments: vec![],
            }],
            listing_failures: vec![],
        }
    }

    fn plain(s: String) -> String {
        strip_ansi_codes(&s).to_string()
    }

    #[test]
    fn test_snapshot_lists_everything() {
        let out = plain(snapshot(&caps()));
        assert!(out.contains("maps 1.2.0 initialized (protocol 2025-06-18)"));
        assert!(out.contains("• geocode: Address to coordinates"));
        assert!(out.contains("Available resources: file:///a.txt"));
        assert!(out.contains("Available prompts: greet"));
    }

    #[test]
    fn test_snapshot_reports_listing_failures() {
        let mut caps = caps();
        caps.prompts.clear();
        caps.listing_failures.push(ListingFailure {
            category: CapabilityCategory::Prompts,
            reason: "Method not found".to_string(),
        });
        let out = plain(snapshot(&caps));
        assert!(out.contains("No prompts available"));
        assert!(out.contains("✗ Failed to list prompts: Method not found"));
    }

    #[test]
    fn test_json_text_is_pretty_printed() {
        let result = Ok(ToolOutcome::Completed(CallToolResult {
            content: vec![ToolContent::Text {
                text: r#"{"lat":1.5}"#.to_string(),
            }],
            structured_content: None,
            is_error: None,
        }));
        let out = plain(tool_result("geocode", &result));
        assert!(out.starts_with("✓ Tool: geocode:"));
        assert!(out.contains("Content 1 (text):"));
        assert!(out.contains("\n    {\n      \"lat\": 1.5\n    }"));
    }

    #[test]
    fn test_tool_error_and_media_content() {
        let result = Ok(ToolOutcome::Completed(CallToolResult {
            content: vec![
                ToolContent::Text {
                    text: "line one\n\nline two".to_string(),
                },
                ToolContent::Image {
                    data: "AAAA".to_string(),
                    mime_type: "image/png".to_string(),
                },
            ],
            structured_content: None,
            is_error: Some(true),
        }));
        let out = plain(tool_result("draw", &result));
        assert!(out.starts_with("✗ Tool: draw:"));
        assert!(out.contains("\n    line one\n    line two"));
        assert!(out.contains("Image data available (type: image/png)"));
    }

    #[test]
    fn test_rpc_and_engine_errors() {
        let rpc = Ok(ToolOutcome::Failed(JsonRpcError::new(-32602, "bad params")));
        let out = plain(tool_result("add", &rpc));
        assert!(out.contains("RPC error -32602: bad params"));

        let err = Err(McpError::SessionClosed);
        let out = plain(tool_result("add", &err));
        assert!(out.contains("[SessionClosed]"));
    }

    #[test]
    fn test_json_report_shape() {
        let calls = vec![ToolCall::new("geocode"), ToolCall::new("missing")];
        let results = vec![
            Ok(ToolOutcome::Completed(CallToolResult {
                content: vec![],
                structured_content: None,
                is_error: None,
            })),
            Err(McpError::UnknownTool("missing".to_string())),
        ];
        let report = json_report(&caps(), &calls, &results);
        assert_eq!(report["capabilities"]["tools"][0]["name"], "geocode");
        assert_eq!(report["results"][0]["status"], "ok");
        assert_eq!(report["results"][1]["status"], "failed");
        assert_eq!(report["results"][1]["error"]["kind"], "UnknownTool");
    }

    #[test]
    fn test_banner_lists_credential_names() {
        let out = plain(banner("node server.js", ["API_KEY", "TOKEN"]));
        assert!(out.contains("Server: node server.js"));
        assert!(out.contains("Credentials: API_KEY, TOKEN"));
    }
}
