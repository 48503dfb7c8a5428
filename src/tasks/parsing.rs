//! Markdown task block parsing.
//!
//! Parsing happens in two passes:
//!
//! 1. [`split_blocks`] cuts a document into raw blocks. A block starts at a
//!    task heading (`### [<symbol>] <title> [@done(<date>)]`) and its body runs
//!    to the next heading of the same or a higher level.
//! 2. [`resolve_block`] turns a raw block into a [`TaskRecord`]. A
//!    `**状态**:` / `**Status**:` line in the body overrides the heading
//!    symbol, and body details (description, acceptance criteria, related
//!    files, dependencies) are collected.
//!
//! Nothing in this module returns an error. Malformed fragments degrade to
//! defaults, and a missing file is an empty [`ParsedDocument`] with a warning.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::status::{leading_symbol, normalize_status, strip_status_markers, TaskStatus};
use super::TaskRecord;

static DONE_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@done\(([^)]*)\)").expect("valid annotation regex"));

// Accepts both `**Key**: value` and `**Key:** value`.
static KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*\*([^*:：]+?)\s*(?:[:：]\*\*|\*\*\s*[:：])\s*(.*)$")
        .expect("valid key-value regex")
});

// ============================================================================
// Options
// ============================================================================

/// Which task block grammar a document uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grammar {
    /// Tasks are headings: `### ✅ Title @done(2024-01-01)`
    #[default]
    Heading,
    /// Tasks are bare symbol lines: `✅ Title`. Kept for older documents.
    Legacy,
}

/// Parser settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    pub grammar: Grammar,
    /// Number of `#` characters in a task heading
    pub heading_level: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            grammar: Grammar::Heading,
            heading_level: 3,
        }
    }
}

// ============================================================================
// Pass 1: Block Splitting
// ============================================================================

/// A task block before status resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTaskBlock {
    /// Status symbol written in the heading, if any
    pub symbol: Option<String>,
    /// Title with markers and annotation stripped; may be empty
    pub title: String,
    /// Date from `@done(<date>)`
    pub completion_date: Option<String>,
    /// Lines between this heading and the next block boundary
    pub body: String,
    /// 1-based line number of the heading
    pub line: usize,
}

/// Return the heading level and the text after the `#` run.
///
/// A status symbol may follow the hashes directly (`###✅ Title`); anything
/// else needs whitespace, so `#hashtag` is not a heading.
fn heading_info(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if rest.is_empty() || rest.starts_with(char::is_whitespace) || leading_symbol(rest).is_some()
    {
        Some((level, rest))
    } else {
        None
    }
}

/// Split `<symbol> <title> @done(<date>)` into its parts.
fn split_task_text(text: &str) -> (Option<String>, String, Option<String>) {
    let text = text.trim();
    let (symbol, rest) = match leading_symbol(text) {
        Some((symbol, _)) => (Some(symbol.to_string()), &text[symbol.len()..]),
        None => (None, text),
    };

    let (before, completion_date) = match DONE_ANNOTATION.captures(rest) {
        Some(caps) => {
            let start = caps.get(0).map_or(rest.len(), |m| m.start());
            let date = caps[1].trim().to_string();
            (&rest[..start], Some(date).filter(|d| !d.is_empty()))
        }
        None => (rest, None),
    };

    let title = strip_status_markers(before).trim().to_string();
    (symbol, title, completion_date)
}

struct BlockBuilder {
    block: RawTaskBlock,
    body: Vec<String>,
}

impl BlockBuilder {
    fn start(text: &str, line: usize) -> Self {
        let (symbol, title, completion_date) = split_task_text(text);
        Self {
            block: RawTaskBlock {
                symbol,
                title,
                completion_date,
                body: String::new(),
                line,
            },
            body: Vec::new(),
        }
    }

    fn finish(mut self) -> RawTaskBlock {
        self.block.body = self.body.join("\n").trim().to_string();
        self.block
    }
}

/// First pass: cut a document into raw task blocks in document order.
///
/// # Example
///
/// ```
/// use plansync::tasks::parsing::{split_blocks, ParseOptions};
///
/// let doc = "### ✅ Login page @done(2024-02-01)\n\n**状态**: ✅ 已完成\n\n### Logout\n";
/// let blocks = split_blocks(doc, &ParseOptions::default());
///
/// assert_eq!(blocks.len(), 2);
/// assert_eq!(blocks[0].symbol.as_deref(), Some("✅"));
/// assert_eq!(blocks[0].completion_date.as_deref(), Some("2024-02-01"));
/// assert_eq!(blocks[1].title, "Logout");
/// ```
#[must_use]
pub fn split_blocks(content: &str, options: &ParseOptions) -> Vec<RawTaskBlock> {
    match options.grammar {
        Grammar::Heading => split_heading_blocks(content, options.heading_level),
        Grammar::Legacy => split_legacy_blocks(content),
    }
}

fn split_heading_blocks(content: &str, task_level: usize) -> Vec<RawTaskBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<BlockBuilder> = None;

    for (idx, line) in content.lines().enumerate() {
        if let Some((level, rest)) = heading_info(line) {
            if level == task_level {
                if let Some(builder) = current.take() {
                    blocks.push(builder.finish());
                }
                current = Some(BlockBuilder::start(rest, idx + 1));
                continue;
            }
            if level < task_level {
                if let Some(builder) = current.take() {
                    blocks.push(builder.finish());
                }
                continue;
            }
        }

        if let Some(builder) = current.as_mut() {
            builder.body.push(line.to_string());
        }
    }

    if let Some(builder) = current {
        blocks.push(builder.finish());
    }
    blocks
}

/// A legacy task line is a status symbol, whitespace, then text.
fn legacy_task_text(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let (symbol, _) = leading_symbol(trimmed)?;
    let rest = &trimmed[symbol.len()..];
    if rest.starts_with(char::is_whitespace) && !rest.trim().is_empty() {
        Some(trimmed)
    } else {
        None
    }
}

fn split_legacy_blocks(content: &str) -> Vec<RawTaskBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<BlockBuilder> = None;

    for (idx, line) in content.lines().enumerate() {
        if let Some(text) = legacy_task_text(line) {
            if let Some(builder) = current.take() {
                blocks.push(builder.finish());
            }
            current = Some(BlockBuilder::start(text, idx + 1));
            continue;
        }

        if heading_info(line).is_some() {
            if let Some(builder) = current.take() {
                blocks.push(builder.finish());
            }
            continue;
        }

        if let Some(builder) = current.as_mut() {
            builder.body.push(line.to_string());
        }
    }

    if let Some(builder) = current {
        blocks.push(builder.finish());
    }
    blocks
}

// ============================================================================
// Pass 2: Block Resolution
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKey {
    Status,
    Description,
    Implementation,
    Acceptance,
    RelatedFiles,
    Dependencies,
    Other,
}

fn classify_key(key: &str) -> BodyKey {
    match key.trim().to_lowercase().as_str() {
        "状态" | "status" => BodyKey::Status,
        "描述" | "description" => BodyKey::Description,
        "实现逻辑" | "implementation" | "implementation logic" => BodyKey::Implementation,
        "验收标准" | "acceptance criteria" => BodyKey::Acceptance,
        "相关文件" | "related files" => BodyKey::RelatedFiles,
        "依赖" | "依赖关系" | "dependencies" => BodyKey::Dependencies,
        _ => BodyKey::Other,
    }
}

fn strip_bullet(line: &str) -> Option<&str> {
    ["- ", "* ", "+ "]
        .iter()
        .find_map(|prefix| line.strip_prefix(prefix))
        .map(str::trim)
}

fn clean_list_item(item: &str, key: BodyKey) -> String {
    let item = ["[ ] ", "[x] ", "[X] "]
        .iter()
        .find_map(|prefix| item.strip_prefix(prefix))
        .unwrap_or(item)
        .trim();
    if key == BodyKey::RelatedFiles {
        item.trim_matches('`').to_string()
    } else {
        item.to_string()
    }
}

#[derive(Debug, Default)]
struct BodyDetails {
    status: Option<TaskStatus>,
    description: Option<String>,
    implementation_logic: Option<String>,
    acceptance_criteria: Vec<String>,
    related_files: Vec<String>,
    dependencies: Vec<String>,
}

impl BodyDetails {
    fn list_mut(&mut self, key: BodyKey) -> Option<&mut Vec<String>> {
        match key {
            BodyKey::Acceptance => Some(&mut self.acceptance_criteria),
            BodyKey::RelatedFiles => Some(&mut self.related_files),
            BodyKey::Dependencies => Some(&mut self.dependencies),
            _ => None,
        }
    }
}

fn scan_body(body: &str) -> BodyDetails {
    let mut details = BodyDetails::default();
    let mut section: Option<BodyKey> = None;

    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let key_value = KEY_VALUE
            .captures(trimmed)
            .or_else(|| strip_bullet(trimmed).and_then(|inner| KEY_VALUE.captures(inner)));
        if let Some(caps) = key_value {
            let key = classify_key(&caps[1]);
            let value = caps[2].trim();
            section = None;
            match key {
                // The first status line wins; an empty value declares nothing.
                BodyKey::Status if details.status.is_none() && !value.is_empty() => {
                    details.status = Some(normalize_status(value));
                }
                BodyKey::Description if !value.is_empty() => {
                    details.description = Some(value.to_string());
                }
                BodyKey::Implementation if !value.is_empty() => {
                    details.implementation_logic = Some(value.to_string());
                }
                BodyKey::Acceptance | BodyKey::RelatedFiles | BodyKey::Dependencies => {
                    if !value.is_empty() {
                        if let Some(list) = details.list_mut(key) {
                            list.push(clean_list_item(value, key));
                        }
                    }
                    section = Some(key);
                }
                _ => {}
            }
            continue;
        }

        match (section, strip_bullet(trimmed)) {
            (Some(key), Some(item)) if !item.is_empty() => {
                if let Some(list) = details.list_mut(key) {
                    list.push(clean_list_item(item, key));
                }
            }
            _ => section = None,
        }
    }

    details
}

/// Second pass: resolve one raw block into a task record.
///
/// Returns `None` when the title is empty after stripping markers; such
/// headings are structural, not tasks.
#[must_use]
pub fn resolve_block(block: &RawTaskBlock) -> Option<TaskRecord> {
    if block.title.is_empty() {
        return None;
    }

    let heading_status = block
        .symbol
        .as_deref()
        .map(normalize_status)
        .unwrap_or_default();
    let details = scan_body(&block.body);

    Some(TaskRecord {
        title: block.title.clone(),
        status: details.status.unwrap_or(heading_status),
        completion_date: block.completion_date.clone(),
        description: details.description,
        implementation_logic: details.implementation_logic,
        acceptance_criteria: details.acceptance_criteria,
        related_files: details.related_files,
        dependencies: details.dependencies,
        ..TaskRecord::default()
    })
}

// ============================================================================
// Line Helpers
// ============================================================================

/// Whether `line` opens a new block in either grammar (any heading, or a
/// legacy symbol line).
#[must_use]
pub fn starts_block(line: &str) -> bool {
    heading_info(line).is_some() || legacy_task_text(line).is_some()
}

/// Byte range of the value on a body status line such as `**状态**: 🔄 进行中`.
///
/// The range never includes the line ending. Returns `None` for any other
/// line and for a status line with an empty value, which declares nothing.
#[must_use]
pub fn status_value_range(line: &str) -> Option<Range<usize>> {
    let content = line.trim_end();
    let body = content.trim_start();
    let candidates = std::iter::once(body).chain(
        ["- ", "* ", "+ "]
            .iter()
            .filter_map(|bullet| body.strip_prefix(bullet))
            .map(str::trim_start),
    );

    for text in candidates {
        let Some(caps) = KEY_VALUE.captures(text) else {
            continue;
        };
        if classify_key(&caps[1]) != BodyKey::Status {
            return None;
        }
        let value = caps.get(2)?;
        if value.as_str().is_empty() {
            return None;
        }
        let base = content.len() - text.len();
        return Some(base + value.start()..base + value.end());
    }
    None
}

// ============================================================================
// Documents
// ============================================================================

/// Parse a whole document into task records, in document order.
///
/// # Example
///
/// ```
/// use plansync::tasks::{parse_document, ParseOptions, TaskStatus};
///
/// let doc = "### ☐ Build login form\n\n**状态**: 🔄 进行中\n";
/// let tasks = parse_document(doc, &ParseOptions::default());
///
/// assert_eq!(tasks[0].title, "Build login form");
/// assert_eq!(tasks[0].status, TaskStatus::InProgress);
/// ```
#[must_use]
pub fn parse_document(content: &str, options: &ParseOptions) -> Vec<TaskRecord> {
    split_blocks(content, options)
        .iter()
        .filter_map(|block| {
            let task = resolve_block(block);
            if task.is_none() {
                tracing::debug!(line = block.line, "Skipping task heading with empty title");
            }
            task
        })
        .collect()
}

/// Result of parsing a document from disk.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub path: PathBuf,
    pub tasks: Vec<TaskRecord>,
    /// Set when the document could not be read
    pub warning: Option<String>,
}

impl ParsedDocument {
    /// Whether the document was unavailable.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.warning.is_some()
    }
}

/// Parse a document from disk.
///
/// A missing or unreadable file produces an empty task list and a warning,
/// never an error.
pub fn parse_file(path: &Path, options: &ParseOptions) -> ParsedDocument {
    match std::fs::read_to_string(path) {
        Ok(content) => ParsedDocument {
            path: path.to_path_buf(),
            tasks: parse_document(&content, options),
            warning: None,
        },
        Err(e) => {
            let message = format!("Phase document unavailable: {} ({})", path.display(), e);
            tracing::warn!("{}", message);
            ParsedDocument {
                path: path.to_path_buf(),
                tasks: Vec::new(),
                warning: Some(message),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
