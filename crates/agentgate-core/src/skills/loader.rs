//! `SKILL.md` prompt skills
//!
//! A prompt skill is a directory holding a `SKILL.md` file:
//!
//! ```text
//! ---
//! name: release-notes
//! description: Draft release notes from the git log
//! user-invocable: true
//! disable-model-invocation: false
//! metadata:
//!   openclaw:
//!     requires:
//!       bins: [git]
//!       env:
//!         - GITHUB_TOKEN
//! ---
//! Markdown instructions...
//! ```
//!
//! Top-level keys are flat `key: value` lines. The only nested block that is
//! read is `metadata.openclaw.requires`, written as above or as inline JSON
//! (`metadata: {"openclaw": {"requires": {"bins": ["git"]}}}`). A skill whose
//! required binaries are missing from `PATH`, or whose required environment
//! variables are unset, stays loaded but is hidden from every lookup.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

pub const SKILL_FILE: &str = "SKILL.md";
const FRONT_MATTER_DELIMITER: &str = "---";

/// Where a skill was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillSource {
    Personal,
    Project,
}

impl SkillSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillSource::Personal => "personal",
            SkillSource::Project => "project",
        }
    }
}

impl fmt::Display for SkillSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One prompt skill
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skill {
    pub name: String,
    pub description: String,
    /// Reachable as `/name`
    pub user_invocable: bool,
    /// Advertised in the system prompt
    pub model_invocable: bool,
    /// With `command-dispatch: tool`, `/name args` runs this tool directly
    pub command_tool: Option<String>,
    /// Binaries and environment variables the skill needs
    pub requires: Requirements,
    /// Markdown after the front matter
    pub body: String,
    pub path: PathBuf,
    pub source: SkillSource,
}

impl Skill {
    pub fn slash_command(&self) -> String {
        format!("/{}", self.name)
    }

    /// Parse the contents of a `SKILL.md` file
    pub fn parse(contents: &str, path: impl Into<PathBuf>, source: SkillSource) -> Result<Self> {
        let path = path.into();
        let invalid = |reason: &str| Error::Config(format!("{}: {}", path.display(), reason));

        let (front_matter, body) =
            split_front_matter(contents.trim_start_matches('\u{feff}')).map_err(invalid)?;

        let fields = parse_front_matter(front_matter);
        let name = fields
            .get("name")
            .cloned()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| invalid("missing name"))?;
        if name.chars().any(char::is_whitespace) || name.starts_with('/') {
            return Err(invalid("name must be a single word"));
        }

        let flag = |key: &str, default: bool| -> Result<bool> {
            match fields.get(key).map(String::as_str) {
                None | Some("") => Ok(default),
                Some("true") | Some("yes") => Ok(true),
                Some("false") | Some("no") => Ok(false),
                Some(other) => Err(invalid(&format!("{} must be true or false, got '{}'", key, other))),
            }
        };

        let command_tool = match fields.get("command-dispatch").map(String::as_str) {
            Some("tool") => fields.get("command-tool").cloned().filter(|tool| !tool.is_empty()),
            _ => None,
        };

        let user_invocable = flag("user-invocable", true)?;
        let model_invocable = !flag("disable-model-invocation", false)?;

        Ok(Self {
            description: fields.get("description").cloned().unwrap_or_default(),
            user_invocable,
            model_invocable,
            command_tool,
            requires: parse_requirements(front_matter),
            body: body.trim().to_string(),
            name,
            path,
            source,
        })
    }

    /// Whether every required binary and environment variable is present
    pub fn is_eligible(&self) -> bool {
        self.requires.missing().is_empty()
    }

    /// Read `<dir>/SKILL.md`
    pub async fn load(dir: &Path, source: SkillSource) -> Result<Self> {
        let file = dir.join(SKILL_FILE);
        let contents = tokio::fs::read_to_string(&file).await?;
        Self::parse(&contents, dir, source)
    }

    /// Section describing this skill to the model
    pub fn prompt_section(&self) -> String {
        let mut section = format!("## Skill: {}\n", self.name);
        section.push_str(&format!("Description: {}\n", self.description));
        if self.user_invocable {
            section.push_str(&format!("Slash Command: {}\n", self.slash_command()));
        }
        if self.model_invocable {
            section.push_str("Auto-invoke: When the user's request matches the description above.\n");
        }
        section.push('\n');
        section.push_str(&self.body);
        section
    }
}

/// Runtime requirements from `metadata.openclaw.requires`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    /// Executables that must be found on `PATH`
    pub bins: Vec<String>,
    /// Environment variables that must be set and non-empty
    pub env: Vec<String>,
}

impl Requirements {
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty() && self.env.is_empty()
    }

    /// Unmet requirements, binaries first (`bin <name>` / `env <name>`)
    pub fn missing(&self) -> Vec<String> {
        let bins = self
            .bins
            .iter()
            .filter(|bin| !on_path(bin))
            .map(|bin| format!("bin {}", bin));
        let env = self
            .env
            .iter()
            .filter(|name| std::env::var_os(name).map_or(true, |value| value.is_empty()))
            .map(|name| format!("env {}", name));
        bins.chain(env).collect()
    }

    fn from_json(metadata: &Value) -> Self {
        let requires = &metadata["openclaw"]["requires"];
        let strings = |key: &str| -> Vec<String> {
            requires[key]
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };
        Self {
            bins: strings("bins"),
            env: strings("env"),
        }
    }

    fn list_mut(&mut self, path: &[(usize, String)]) -> Option<&mut Vec<String>> {
        let keys: Vec<&str> = path.iter().map(|(_, key)| key.as_str()).collect();
        match keys.as_slice() {
            ["metadata", "openclaw", "requires", "bins"] => Some(&mut self.bins),
            ["metadata", "openclaw", "requires", "env"] => Some(&mut self.env),
            _ => None,
        }
    }
}

/// Whether `bin` names an executable, directly or through `PATH`
fn on_path(bin: &str) -> bool {
    if bin.contains(std::path::MAIN_SEPARATOR) {
        return is_executable(Path::new(bin));
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(bin))))
        .unwrap_or(false)
}

#[cfg(not(windows))]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(windows)]
fn is_executable(path: &Path) -> bool {
    ["", "exe", "cmd", "bat"].iter().any(|ext| {
        let candidate = if ext.is_empty() {
            path.to_path_buf()
        } else {
            path.with_extension(ext)
        };
        candidate.is_file()
    })
}

/// Split `---` front matter from the body. Both delimiters must be lines of
/// their own.
fn split_front_matter(contents: &str) -> std::result::Result<(&str, &str), &'static str> {
    let mut lines = contents.split_inclusive('\n');
    let first = lines.next().unwrap_or_default();
    if first.trim_end() != FRONT_MATTER_DELIMITER {
        return Err("missing front matter");
    }

    let start = first.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == FRONT_MATTER_DELIMITER {
            return Ok((&contents[start..offset], &contents[offset + line.len()..]));
        }
        offset += line.len();
    }
    Err("unterminated front matter")
}

/// Read `metadata.openclaw.requires` from the front matter.
///
/// Understands block mappings, `[a, b]` flow lists, `- item` block lists and
/// a single-line JSON `metadata` value. Everything else is ignored.
fn parse_requirements(front_matter: &str) -> Requirements {
    let mut requires = Requirements::default();
    // Enclosing mapping keys with their indentation
    let mut path: Vec<(usize, String)> = Vec::new();

    for line in front_matter.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = line.len() - line.trim_start().len();

        if let Some(item) = trimmed.strip_prefix('-') {
            // Block list items may sit at the same indentation as their key.
            while path.last().is_some_and(|(depth, _)| *depth > indent) {
                path.pop();
            }
            if let Some(list) = requires.list_mut(&path) {
                list.push(unquote(item.trim()).to_string());
            }
            continue;
        }

        while path.last().is_some_and(|(depth, _)| *depth >= indent) {
            path.pop();
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        let value = value.trim();
        path.push((indent, unquote(key.trim()).to_string()));
        if value.is_empty() {
            continue;
        }

        if path.len() == 1 && path[0].1 == "metadata" {
            if let Ok(metadata) = serde_json::from_str::<Value>(value) {
                requires = Requirements::from_json(&metadata);
            }
        } else if let Some(list) = requires.list_mut(&path) {
            list.extend(flow_list(value));
        }
        path.pop();
    }
    requires
}

/// Items of `[a, "b"]`, or the value itself when it is a plain scalar
fn flow_list(value: &str) -> Vec<String> {
    let inner = value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(value);
    inner
        .split(',')
        .map(|item| unquote(item.trim()).to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Flat `key: value` lines. Indented lines, comments and lines without a
/// colon are ignored; matching surrounding quotes are stripped.
fn parse_front_matter(front_matter: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for line in front_matter.lines() {
        if line.starts_with(char::is_whitespace) || line.trim_start().starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        fields.insert(key.trim().to_string(), unquote(value.trim()).to_string());
    }
    fields
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Immediate subdirectories of `root`, sorted by name; empty when `root` is missing
pub(crate) fn skill_dirs(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect()
}

/// Prompt skills keyed by name
#[derive(Debug, Clone, Default)]
pub struct SkillSet {
    skills: BTreeMap<String, Skill>,
}

/// What a leading `/word` in user text resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    /// Replace the user text with this prompt
    Prompt { skill: String, text: String },
    /// Run a tool directly with the remaining text as its arguments
    Tool {
        skill: String,
        tool: String,
        arguments: String,
    },
}

impl SkillSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load skills from `roots`, lowest priority first.
    ///
    /// A skill in a later root replaces a skill of the same name from an
    /// earlier one. The last root is treated as the project root.
    pub async fn load(roots: &[PathBuf]) -> Self {
        let mut set = Self::new();
        for (position, root) in roots.iter().enumerate() {
            let source = if position + 1 == roots.len() {
                SkillSource::Project
            } else {
                SkillSource::Personal
            };
            set.load_root(root, source).await;
        }
        info!("Loaded {} prompt skill(s)", set.len());
        set
    }

    async fn load_root(&mut self, root: &Path, source: SkillSource) {
        for dir in skill_dirs(root) {
            if !dir.join(SKILL_FILE).is_file() {
                continue;
            }
            match Skill::load(&dir, source).await {
                Ok(skill) => {
                    debug!("Loaded skill {} from {}", skill.name, dir.display());
                    let missing = skill.requires.missing();
                    if !missing.is_empty() {
                        debug!("Skill {} unavailable, missing {}", skill.name, missing.join(", "));
                    }
                    self.insert(skill);
                }
                Err(e) => debug!("Skipping invalid skill at {}: {}", dir.display(), e),
            }
        }
    }

    /// Insert, replacing any skill with the same name
    pub fn insert(&mut self, skill: Skill) -> Option<Skill> {
        self.skills.insert(skill.name.clone(), skill)
    }

    /// Eligible skill by name
    pub fn get(&self, name: &str) -> Option<&Skill> {
        self.skills.get(name).filter(|skill| skill.is_eligible())
    }

    /// Number of loaded skills, eligible or not
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Eligible skills sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &Skill> {
        self.skills.values().filter(|skill| skill.is_eligible())
    }

    /// Every loaded skill sorted by name, including ineligible ones
    pub fn iter_all(&self) -> impl Iterator<Item = &Skill> {
        self.skills.values()
    }

    /// System-prompt section for model-invocable skills; empty when there are none
    pub fn system_prompt_section(&self) -> String {
        let skills: Vec<&Skill> = self.iter().filter(|skill| skill.model_invocable).collect();
        if skills.is_empty() {
            return String::new();
        }

        let mut section = String::from("# Available Skills\n\n");
        section.push_str(
            "You have access to the following skills. Use them automatically when the user's \
             request matches the description, or when the user explicitly invokes them with /command.\n\n",
        );
        for skill in skills {
            section.push_str(&skill.prompt_section());
            section.push_str("\n---\n\n");
        }
        section
    }

    /// Help text listing user-invocable skills
    pub fn slash_help(&self) -> String {
        let skills: Vec<&Skill> = self.iter().filter(|skill| skill.user_invocable).collect();
        if skills.is_empty() {
            return "No slash commands available.".to_string();
        }

        let mut help = String::from("# Slash Commands\n\n");
        for skill in skills {
            help.push_str(&format!("**{}** - {}\n", skill.slash_command(), skill.description));
        }
        help
    }

    /// Resolve `/name args`. Returns `None` for plain text and for names that
    /// are not user-invocable skills.
    pub fn resolve_slash(&self, text: &str) -> Option<SlashCommand> {
        let command = text.trim().strip_prefix('/')?;
        let (name, args) = match command.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (command, ""),
        };

        if name == "help" {
            return Some(SlashCommand::Help);
        }

        let skill = self.get(name).filter(|skill| skill.user_invocable)?;
        if let Some(tool) = &skill.command_tool {
            return Some(SlashCommand::Tool {
                skill: skill.name.clone(),
                tool: tool.clone(),
                arguments: args.to_string(),
            });
        }

        let text = if args.is_empty() {
            skill.body.clone()
        } else {
            format!("{}\n\n{}", skill.body, args)
        };
        Some(SlashCommand::Prompt {
            skill: skill.name.clone(),
            text,
        })
    }
}
