// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File system tools: read, write, and list.
//!
//! Relative paths resolve against the workspace. With workspace restriction
//! on, any path that escapes the workspace (after `..` is applied) is refused.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use kestrel_core::{KestrelError, RiskTier};

use crate::tool::{Tool, ToolContext, ToolOutput};

/// Maximum file read size in bytes (100KB).
const MAX_READ_SIZE: usize = 100 * 1024;

/// Path resolution rules shared by the file tools.
#[derive(Debug, Clone)]
pub struct FsPolicy {
    workspace: PathBuf,
    restrict: bool,
}

impl FsPolicy {
    pub fn new(workspace: PathBuf, restrict: bool) -> Self {
        Self {
            workspace: normalize(&workspace),
            restrict,
        }
    }

    /// Resolves a user-supplied path, enforcing the workspace restriction.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, KestrelError> {
        let expanded = match raw.strip_prefix("~/") {
            Some(rest) => std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(rest))
                .unwrap_or_else(|| PathBuf::from(raw)),
            None => PathBuf::from(raw),
        };
        let joined = if expanded.is_absolute() {
            expanded
        } else {
            self.workspace.join(expanded)
        };
        let resolved = normalize(&joined);

        if self.restrict && !resolved.starts_with(&self.workspace) {
            return Err(KestrelError::Tool {
                message: format!(
                    "path '{raw}' is outside the workspace {}",
                    self.workspace.display()
                ),
                source: None,
            });
        }
        Ok(resolved)
    }
}

/// Applies `.` and `..` lexically, without touching the file system.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn required_str<'a>(input: &'a serde_json::Value, key: &str) -> Result<&'a str, KestrelError> {
    input[key].as_str().ok_or_else(|| KestrelError::Tool {
        message: format!("missing required '{key}' parameter"),
        source: None,
    })
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> KestrelError {
    KestrelError::Tool {
        message: format!("failed to {action} '{}': {e}", path.display()),
        source: Some(Box::new(e)),
    }
}

pub struct ReadFileTool {
    policy: FsPolicy,
}

impl ReadFileTool {
    pub fn new(policy: FsPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The file path to read" }
            },
            "required": ["path"]
        })
    }

    fn risk_tier(&self) -> RiskTier {
        RiskTier::Low
    }

    async fn invoke(
        &self,
        input: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, KestrelError> {
        let path = self.policy.resolve(required_str(&input, "path")?)?;
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_error("read file", &path, e))?;

        if contents.len() <= MAX_READ_SIZE {
            return Ok(ToolOutput::success(contents));
        }
        let mut cut = MAX_READ_SIZE;
        while !contents.is_char_boundary(cut) {
            cut -= 1;
        }
        Ok(ToolOutput::success(format!(
            "{}...\n\n[File truncated from {} to {cut} bytes]",
            &contents[..cut],
            contents.len()
        )))
    }
}

pub struct WriteFileTool {
    policy: FsPolicy,
}

impl WriteFileTool {
    pub fn new(policy: FsPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The file path to write" },
                "content": { "type": "string", "description": "The content to write" }
            },
            "required": ["path", "content"]
        })
    }

    async fn invoke(
        &self,
        input: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, KestrelError> {
        let path = self.policy.resolve(required_str(&input, "path")?)?;
        let content = required_str(&input, "content")?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create directory", parent, e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| io_error("write file", &path, e))?;

        Ok(ToolOutput::success(format!(
            "Successfully wrote {} bytes to '{}'",
            content.len(),
            path.display()
        )))
    }
}

pub struct ListDirTool {
    policy: FsPolicy,
}

impl ListDirTool {
    pub fn new(policy: FsPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the entries of a directory"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The directory to list" }
            },
            "required": ["path"]
        })
    }

    fn risk_tier(&self) -> RiskTier {
        RiskTier::Low
    }

    async fn invoke(
        &self,
        input: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, KestrelError> {
        let path = self.policy.resolve(required_str(&input, "path")?)?;
        let mut reader = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| io_error("list directory", &path, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| io_error("list directory", &path, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push(if is_dir { format!("{name}/") } else { name });
        }
        entries.sort();

        if entries.is_empty() {
            return Ok(ToolOutput::success(format!(
                "Directory '{}' is empty",
                path.display()
            )));
        }
        Ok(ToolOutput::success(entries.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ToolContext {
        ToolContext::default()
    }

    #[tokio::test]
    async fn write_then_read_relative_to_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let policy = FsPolicy::new(dir.path().to_path_buf(), true);

        let written = WriteFileTool::new(policy.clone())
            .invoke(
                serde_json::json!({"path": "notes/today.md", "content": "buy milk"}),
                &ctx(),
            )
            .await
            .unwrap();
        assert!(written.content.contains("Successfully wrote 8 bytes"));

        let read = ReadFileTool::new(policy)
            .invoke(serde_json::json!({"path": "notes/today.md"}), &ctx())
            .await
            .unwrap();
        assert_eq!(read.content, "buy milk");
    }

    #[tokio::test]
    async fn read_nonexistent_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ReadFileTool::new(FsPolicy::new(dir.path().to_path_buf(), false))
            .invoke(serde_json::json!({"path": "missing.txt"}), &ctx())
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn restricted_policy_rejects_escape() {
        let policy = FsPolicy::new(PathBuf::from("/srv/ws"), true);
        assert!(policy.resolve("../etc/passwd").is_err());
        assert!(policy.resolve("/etc/passwd").is_err());
        assert_eq!(
            policy.resolve("a/../b.txt").unwrap(),
            PathBuf::from("/srv/ws/b.txt")
        );
    }

    #[test]
    fn unrestricted_policy_allows_absolute_paths() {
        let policy = FsPolicy::new(PathBuf::from("/srv/ws"), false);
        assert_eq!(
            policy.resolve("/etc/hosts").unwrap(),
            PathBuf::from("/etc/hosts")
        );
    }

    #[tokio::test]
    async fn list_dir_marks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("file.txt"), "x").unwrap();

        let out = ListDirTool::new(FsPolicy::new(dir.path().to_path_buf(), false))
            .invoke(serde_json::json!({"path": "."}), &ctx())
            .await
            .unwrap();
        assert_eq!(out.content, "file.txt\nsub/");
    }
}
