//! Built-in tools registered at startup.
//!
//! The content tools (`search`, `extract`, `summarize`, `analyze`) return
//! placeholder results; real providers sit behind the remote delegate. The
//! session tools (`store`, `retrieve`) are backed by the shared
//! [`SessionStore`].

pub mod content;
pub mod session;

use std::sync::Arc;

use chrono::Utc;

use crate::mcp::registry::{RegistryError, ToolRegistry};
use crate::session::SessionStore;

pub use content::{AnalyzeTool, ExtractTool, SearchTool, SummarizeTool};
pub use session::{RetrieveTool, StoreTool};

/// Registry holding every built-in tool, in listing order.
pub fn builtin_registry(sessions: &SessionStore) -> Result<ToolRegistry, RegistryError> {
    Ok(ToolRegistry::builder()
        .with_tool(Arc::new(SearchTool))?
        .with_tool(Arc::new(ExtractTool))?
        .with_tool(Arc::new(SummarizeTool))?
        .with_tool(Arc::new(AnalyzeTool))?
        .with_tool(Arc::new(StoreTool::new(sessions.clone())))?
        .with_tool(Arc::new(RetrieveTool::new(sessions.clone())))?
        .build())
}

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}
