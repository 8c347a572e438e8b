//! Capability handshake.
//!
//! `initialize`, then `notifications/initialized`, then discovery of tools,
//! resources and prompts. Discovery tolerates servers that implement only
//! part of the protocol: a missing list method yields an empty list, and
//! other listing errors are recorded rather than raised.

use std::collections::HashSet;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::{McpError, Result};
use crate::protocol::{
    InitializeParams, InitializeResult, ListPromptsResult, ListResourcesResult, ListToolsResult,
    MCP_PROTOCOL_VERSION, PromptInfo, ResourceInfo, ServerCapabilityFlags, ServerInfo, ToolInfo,
};
use crate::session::{McpSession, SessionState};

/// Upper bound on pages fetched per list method.
const MAX_LIST_PAGES: usize = 100;

/// What the server offered during the handshake. Read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    /// Protocol version the server chose.
    pub protocol_version: String,
    /// Server name and version, when provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_info: Option<ServerInfo>,
    /// Capability flags from the initialize result.
    pub flags: ServerCapabilityFlags,
    /// Usage hints from the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Tools, in server order.
    pub tools: Vec<ToolInfo>,
    /// Resources, in server order.
    pub resources: Vec<ResourceInfo>,
    /// Prompts, in server order.
    pub prompts: Vec<PromptInfo>,
    /// Discovery problems that did not abort the handshake.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub listing_failures: Vec<ListingFailure>,
}

impl ServerCapabilities {
    fn from_initialize(init: InitializeResult) -> Self {
        Self {
            protocol_version: init.protocol_version,
            server_info: init.server_info,
            flags: init.capabilities,
            instructions: init.instructions,
            tools: Vec::new(),
            resources: Vec::new(),
            prompts: Vec::new(),
            listing_failures: Vec::new(),
        }
    }

    /// Look up a tool by exact name.
    pub fn tool(&self, name: &str) -> Option<&ToolInfo> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Check if the server declared a tool.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tool(name).is_some()
    }

    /// Tool names, in server order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }
}

/// A kind of server offering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityCategory {
    Tools,
    Resources,
    Prompts,
}

impl CapabilityCategory {
    /// List method for this category.
    pub fn method(self) -> &'static str {
        match self {
            Self::Tools => "tools/list",
            Self::Resources => "resources/list",
            Self::Prompts => "prompts/list",
        }
    }
}

impl std::fmt::Display for CapabilityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Tools => "tools",
            Self::Resources => "resources",
            Self::Prompts => "prompts",
        })
    }
}

/// A list method that failed without aborting the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingFailure {
    /// Which listing failed.
    pub category: CapabilityCategory,
    /// What went wrong.
    pub reason: String,
}

/// One page of a paginated list result.
trait ListPage: DeserializeOwned {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

impl ListPage for ListToolsResult {
    type Item = ToolInfo;

    fn into_parts(self) -> (Vec<ToolInfo>, Option<String>) {
        (self.tools, self.next_cursor)
    }
}

impl ListPage for ListResourcesResult {
    type Item = ResourceInfo;

    fn into_parts(self) -> (Vec<ResourceInfo>, Option<String>) {
        (self.resources, self.next_cursor)
    }
}

impl ListPage for ListPromptsResult {
    type Item = PromptInfo;

    fn into_parts(self) -> (Vec<PromptInfo>, Option<String>) {
        (self.prompts, self.next_cursor)
    }
}

impl McpSession {
    /// Run the capability handshake.
    ///
    /// Only valid once, from [`SessionState::Initializing`]. On success the
    /// session is Ready and the returned snapshot stays available through
    /// [`McpSession::capabilities`]. Any failure closes the session.
    pub fn handshake(&mut self) -> Result<&ServerCapabilities> {
        let state = self.state();
        if state != SessionState::Initializing {
            return Err(McpError::InvalidState {
                operation: "perform the handshake",
                state,
            });
        }

        match self.negotiate() {
            Ok(capabilities) => {
                tracing::info!(
                    tools = capabilities.tools.len(),
                    resources = capabilities.resources.len(),
                    prompts = capabilities.prompts.len(),
                    listing_failures = capabilities.listing_failures.len(),
                    "MCP handshake complete"
                );
                Ok(self.mark_ready(capabilities))
            }
            Err(e) => {
                tracing::warn!(error = %e, "MCP handshake failed");
                self.close();
                Err(McpError::handshake(e))
            }
        }
    }

    fn negotiate(&mut self) -> Result<ServerCapabilities> {
        let params = serde_json::to_value(InitializeParams::new(
            self.options().client_info.clone(),
        ))?;
        let result = self.request("initialize", Some(params))?.map_err(McpError::Rpc)?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| McpError::malformed(format!("invalid initialize result: {}", e)))?;

        if init.protocol_version != MCP_PROTOCOL_VERSION {
            tracing::debug!(
                requested = MCP_PROTOCOL_VERSION,
                chosen = %init.protocol_version,
                "MCP server chose a different protocol version"
            );
        }
        if let Some(info) = &init.server_info {
            tracing::info!(
                server = %info.name,
                version = %info.version,
                protocol = %init.protocol_version,
                "MCP server initialized"
            );
        }

        self.notify("notifications/initialized", None)?;

        let mut capabilities = ServerCapabilities::from_initialize(init);
        let mut failures = Vec::new();

        capabilities.tools =
            self.collect::<ListToolsResult>(CapabilityCategory::Tools, &mut failures)?;
        capabilities.resources =
            self.collect::<ListResourcesResult>(CapabilityCategory::Resources, &mut failures)?;
        capabilities.prompts =
            self.collect::<ListPromptsResult>(CapabilityCategory::Prompts, &mut failures)?;
        capabilities.listing_failures = failures;

        Ok(capabilities)
    }

    fn collect<P: ListPage>(
        &mut self,
        category: CapabilityCategory,
        failures: &mut Vec<ListingFailure>,
    ) -> Result<Vec<P::Item>> {
        match self.list_all::<P>(category)? {
            Ok(items) => Ok(items),
            Err(reason) => {
                tracing::warn!(category = %category, reason = %reason, "MCP listing failed");
                failures.push(ListingFailure { category, reason });
                Ok(Vec::new())
            }
        }
    }

    /// Fetch every page of one list method.
    ///
    /// The outer error is a fault that aborts the handshake; the inner one
    /// is a listing problem worth recording.
    fn list_all<P: ListPage>(
        &mut self,
        category: CapabilityCategory,
    ) -> Result<std::result::Result<Vec<P::Item>, String>> {
        let method = category.method();
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen = HashSet::new();

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = match self.request(method, params)? {
                Ok(result) => result,
                Err(rpc) if rpc.is_method_not_found() => {
                    tracing::debug!(method, "MCP server does not implement list method");
                    return Ok(Ok(items));
                }
                Err(rpc) => return Ok(Err(format!("{} failed: {}", method, rpc))),
            };
            if result.is_null() {
                return Ok(Ok(items));
            }

            let page: P = match serde_json::from_value(result) {
                Ok(page) => page,
                Err(e) => {
                    return Ok(Err(format!("{} returned an unexpected result: {}", method, e)));
                }
            };
            let (page_items, next) = page.into_parts();
            items.extend(page_items);

            match next.filter(|c| !c.is_empty()) {
                None => return Ok(Ok(items)),
                Some(next) if !seen.insert(next.clone()) => {
                    tracing::warn!(method, cursor = %next, "MCP server repeated a list cursor");
                    return Ok(Ok(items));
                }
                Some(next) => cursor = Some(next),
            }
        }

        tracing::warn!(method, pages = MAX_LIST_PAGES, "stopped following list pages");
        Ok(Ok(items))
    }
}
