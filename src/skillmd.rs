//! SKILL.md parsing and skill-directory content collection.
//!
//! Ingestion reads a crawled `author/skill` directory tree. Each skill
//! directory holds a SKILL.md (sometimes skill.md or README.md), optional
//! bundled scripts, and extra markdown. The scorer wants one concatenated
//! text blob; the listing wants a name, description, tags, and category.

use std::path::Path;

use eyre::Result;

/// Structured metadata pulled out of a SKILL.md.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSkill {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: String,
}

/// Keyword lists for category inference. First-match-count wins; ties keep
/// the earlier category.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "communication",
        &[
            "whatsapp", "slack", "discord", "telegram", "email", "sms", "imessage", "teams",
            "chat", "message", "notification",
        ],
    ),
    (
        "productivity",
        &[
            "calendar", "todo", "notes", "reminder", "schedule", "task", "notion", "obsidian",
            "trello", "asana",
        ],
    ),
    (
        "dev-tools",
        &[
            "github", "git", "code", "debug", "deploy", "docker", "ci", "test", "lint",
            "vscode", "ide", "terminal", "api",
        ],
    ),
    (
        "smart-home",
        &[
            "homeassistant", "iot", "light", "thermostat", "sensor", "zigbee", "mqtt", "alexa",
            "homekit",
        ],
    ),
    (
        "finance",
        &[
            "crypto", "bitcoin", "trading", "stock", "portfolio", "defi", "wallet", "price",
            "market", "bank",
        ],
    ),
    (
        "entertainment",
        &[
            "music", "spotify", "movie", "game", "youtube", "podcast", "stream", "media", "play",
        ],
    ),
    (
        "security",
        &[
            "password", "vpn", "firewall", "scan", "audit", "encrypt", "auth", "2fa", "security",
        ],
    ),
    (
        "ai-models",
        &[
            "openai", "gpt", "claude", "llama", "ollama", "model", "embedding", "vector", "rag",
            "anthropic",
        ],
    ),
    (
        "automation",
        &[
            "cron", "schedule", "workflow", "automate", "trigger", "webhook", "zapier", "n8n",
            "ifttt",
        ],
    ),
    (
        "social",
        &[
            "twitter", "reddit", "linkedin", "instagram", "social", "post", "feed", "follow",
        ],
    ),
];

/// Infer a category from keyword hits across name, description, and tags.
pub fn infer_category(name: &str, description: &str, tags: &[String]) -> String {
    let text = format!("{} {} {}", name, description, tags.join(" ")).to_lowercase();

    let mut best_category = "other";
    let mut best_score = 0usize;

    for (category, keywords) in CATEGORY_KEYWORDS {
        let score = keywords.iter().filter(|kw| text.contains(**kw)).count();
        if score > best_score {
            best_score = score;
            best_category = category;
        }
    }

    best_category.to_string()
}

/// Parse a SKILL.md into structured metadata.
///
/// YAML frontmatter (`name:`/`description:` between `---` markers) takes
/// priority; otherwise the first heading becomes the name and the first
/// paragraph after it the description.
pub fn parse_skill_md(content: &str) -> ParsedSkill {
    let (fm_name, fm_desc) = parse_yaml_frontmatter(content);

    let name = fm_name
        .or_else(|| {
            content
                .lines()
                .find_map(|l| l.strip_prefix("# ").map(|h| h.trim().to_string()))
        })
        .unwrap_or_else(|| "Unknown Skill".to_string());

    let description = fm_desc.unwrap_or_else(|| first_paragraph_after_heading(content));

    let mut tags = Vec::new();
    for line in content.lines() {
        let lower = line.trim().to_lowercase();
        for prefix in ["tags:", "tag:", "keywords:", "keyword:", "categories:", "category:"] {
            if let Some(rest) = lower.strip_prefix(prefix) {
                tags.extend(
                    rest.split([',', ';', '|'])
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty() && *t != "---"),
                );
                break; // "tags:" must not also match the "tag:" prefix
            }
        }
    }

    let category = infer_category(&name, &description, &tags);

    ParsedSkill {
        name,
        description,
        tags,
        category,
    }
}

fn first_paragraph_after_heading(content: &str) -> String {
    let mut found_heading = false;
    for line in content.lines() {
        if line.starts_with('#') {
            found_heading = true;
            continue;
        }
        let trimmed = line.trim();
        if found_heading && !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    String::new()
}

/// Parse YAML frontmatter from a SKILL.md file.
/// Returns (name, description) if found.
fn parse_yaml_frontmatter(content: &str) -> (Option<String>, Option<String>) {
    let trimmed = content.trim_start();
    if !trimmed.starts_with("---") {
        return (None, None);
    }

    let after_open = &trimmed[3..];
    let frontmatter = match after_open.find("\n---") {
        Some(pos) => &after_open[..pos],
        None => return (None, None),
    };

    let mut name = None;
    let mut description = None;

    for line in frontmatter.lines() {
        let line = line.trim();
        if let Some(val) = line.strip_prefix("name:") {
            name = Some(val.trim().trim_matches('"').trim_matches('\'').to_string());
        } else if let Some(val) = line.strip_prefix("description:") {
            description = Some(val.trim().trim_matches('"').trim_matches('\'').to_string());
        }
    }

    (name, description)
}

/// Build a stable slug from a display name: lowercase, alphanumerics and
/// hyphens only, capped at 100 characters. Matches the slugs the scraper
/// originally assigned, so scan results keep matching profiles.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();
    let hyphenated = kept
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    let mut collapsed = String::with_capacity(hyphenated.len());
    let mut prev_hyphen = false;
    for c in hyphenated.chars() {
        if c == '-' {
            if !prev_hyphen {
                collapsed.push(c);
            }
            prev_hyphen = true;
        } else {
            collapsed.push(c);
            prev_hyphen = false;
        }
    }
    collapsed
        .trim_matches('-')
        .chars()
        .take(100)
        .collect()
}

/// Concatenate everything scoreable in a skill directory: the primary
/// markdown, bundled shell/python scripts, and any extra markdown files.
/// Returns `None` when the directory holds nothing scoreable.
pub fn collect_skill_content(dir: &Path) -> Result<Option<String>> {
    let mut parts: Vec<String> = Vec::new();
    let mut primary_md: Option<String> = None;

    for name in ["SKILL.md", "skill.md", "README.md"] {
        let p = dir.join(name);
        if p.is_file() {
            parts.push(std::fs::read_to_string(&p)?);
            primary_md = Some(name.to_string());
            break;
        }
    }

    let scripts_dir = dir.join("scripts");
    if scripts_dir.is_dir() {
        let mut script_paths: Vec<_> = std::fs::read_dir(&scripts_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("sh") | Some("py")
                )
            })
            .collect();
        script_paths.sort();
        for p in script_paths {
            parts.push(std::fs::read_to_string(&p)?);
        }
    }

    let mut extra_md: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension().and_then(|e| e.to_str()) == Some("md")
                && p.file_name().and_then(|n| n.to_str()) != primary_md.as_deref()
        })
        .collect();
    extra_md.sort();
    for p in extra_md {
        parts.push(std::fs::read_to_string(&p)?);
    }

    let joined = parts.join("\n\n---\n\n");
    if joined.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(joined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_heading_and_description() {
        let md = "# Weather Skill\n\nFetches the local forecast.\n\nMore text.";
        let parsed = parse_skill_md(md);
        assert_eq!(parsed.name, "Weather Skill");
        assert_eq!(parsed.description, "Fetches the local forecast.");
    }

    #[test]
    fn test_frontmatter_wins_over_heading() {
        let md = "---\nname: my-cool-skill\ndescription: \"Does cool things\"\n---\n# Other Name\n\nBody.";
        let parsed = parse_skill_md(md);
        assert_eq!(parsed.name, "my-cool-skill");
        assert_eq!(parsed.description, "Does cool things");
    }

    #[test]
    fn test_tag_extraction() {
        let md = "# T\n\nDesc.\n\ntags: slack, discord; chat\n";
        let parsed = parse_skill_md(md);
        assert_eq!(parsed.tags, vec!["slack", "discord", "chat"]);
        assert_eq!(parsed.category, "communication");
    }

    #[test]
    fn test_category_inference_fallback() {
        assert_eq!(infer_category("haiku writer", "writes haikus", &[]), "other");
        assert_eq!(
            infer_category("repo helper", "github deploy and ci assistant", &[]),
            "dev-tools"
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My Cool Skill!"), "my-cool-skill");
        assert_eq!(slugify("  spaces   everywhere  "), "spaces-everywhere");
        assert_eq!(slugify("already-sluggy"), "already-sluggy");
        assert_eq!(slugify("weird___chars***"), "weirdchars");
        let long = "x".repeat(150);
        assert_eq!(slugify(&long).len(), 100);
    }

    #[test]
    fn test_collect_skill_content() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();

        std::fs::write(dir.join("SKILL.md"), "# Skill\n\nMain doc.").unwrap();
        std::fs::create_dir(dir.join("scripts")).unwrap();
        let mut f = std::fs::File::create(dir.join("scripts/setup.sh")).unwrap();
        writeln!(f, "echo setup").unwrap();
        std::fs::write(dir.join("NOTES.md"), "extra notes").unwrap();
        std::fs::write(dir.join("binary.bin"), [0u8, 1]).unwrap();

        let content = collect_skill_content(dir).unwrap().unwrap();
        assert!(content.contains("Main doc."));
        assert!(content.contains("echo setup"));
        assert!(content.contains("extra notes"));
        assert!(!content.contains("binary"));
    }

    #[test]
    fn test_collect_empty_dir_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(collect_skill_content(tmp.path()).unwrap().is_none());
    }
}
