// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workspace skills: `{workspace}/skills/<name>/SKILL.md`.
//!
//! A skill file may open with a `---` frontmatter block carrying
//! `description:` and `always: true`. Always-on skills are inlined into
//! the system prompt; the rest are listed so the model can read them with
//! `read_file` when needed.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub always: bool,
    pub path: PathBuf,
    /// Markdown body with the frontmatter removed.
    pub body: String,
}

pub struct SkillsLoader {
    dir: PathBuf,
}

impl SkillsLoader {
    pub fn new(workspace: &Path) -> Self {
        Self {
            dir: workspace.join("skills"),
        }
    }

    /// All skills in the workspace, sorted by name.
    pub async fn load_all(&self) -> Vec<Skill> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut skills = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "failed to list skills");
                    break;
                }
            };
            let path = entry.path().join("SKILL.md");
            let Ok(raw) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            skills.push(parse_skill(name, path, &raw));
        }
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = skills.len(), "skills loaded");
        skills
    }
}

/// Prompt section inlining every always-on skill.
pub fn always_on_section(skills: &[Skill]) -> Option<String> {
    let bodies: Vec<String> = skills
        .iter()
        .filter(|s| s.always)
        .map(|s| format!("### Skill: {}\n\n{}", s.name, s.body.trim()))
        .collect();
    (!bodies.is_empty()).then(|| format!("# Active Skills\n\n{}", bodies.join("\n\n---\n\n")))
}

/// Prompt section listing on-demand skills and where to read them.
pub fn summary_section(skills: &[Skill]) -> Option<String> {
    let lines: Vec<String> = skills
        .iter()
        .filter(|s| !s.always)
        .map(|s| format!("- **{}**: {} ({})", s.name, s.description, s.path.display()))
        .collect();
    (!lines.is_empty()).then(|| {
        format!(
            "# Skills\n\nThe following skills extend your capabilities. \
             To use one, read its SKILL.md with the read_file tool.\n\n{}",
            lines.join("\n")
        )
    })
}

fn parse_skill(name: String, path: PathBuf, raw: &str) -> Skill {
    let (front, body) = split_frontmatter(raw);
    let mut description = String::new();
    let mut always = false;
    for line in front.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'');
        match key.trim() {
            "description" => description = value.to_string(),
            "always" => always = value.eq_ignore_ascii_case("true"),
            _ => {}
        }
    }
    if description.is_empty() {
        description = name.clone();
    }
    Skill {
        name,
        description,
        always,
        path,
        body: body.to_string(),
    }
}

fn split_frontmatter(raw: &str) -> (&str, &str) {
    let Some(rest) = raw.strip_prefix("---") else {
        return ("", raw);
    };
    match rest.find("\n---") {
        Some(end) => {
            let front = &rest[..end];
            let after = &rest[end + 4..];
            (front, after.trim_start_matches(['\r', '\n']))
        }
        None => ("", raw),
    }
}
