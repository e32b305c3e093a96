//! Ticket model: IDs, statuses, relations, and the markdown file format.
//!
//! A ticket is a markdown file whose head is a YAML front-matter block
//! delimited by `---` lines. The ticket's status is *not* a front-matter
//! field; it is derived from the directory the file resides in (`todo/`,
//! `doing/`, `done/`). Unknown front-matter keys are preserved and
//! round-tripped so other tooling can annotate tickets freely.

pub mod store;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use regex::Regex;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Name of the current-ticket symlink, both at the main repository root
/// (worktree mode disabled) and inside each worktree.
pub const CURRENT_TICKET_LINK: &str = "current-ticket.md";

/// Maximum slug length accepted by [`validate_slug`].
pub const MAX_SLUG_LEN: usize = 64;

/// Timestamp layout used in ticket IDs (local clock, second precision).
const ID_TIMESTAMP_FORMAT: &str = "%y%m%d-%H%M%S";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum TicketError {
    /// No ticket matches the given ID or prefix.
    NotFound { id: String },
    /// A prefix matched more than one ticket.
    Ambiguous { prefix: String, matches: Vec<String> },
    /// The file is not a valid ticket (front-matter missing, unterminated,
    /// or ill-typed fields).
    Invalid { path: PathBuf, reason: String },
    /// A ticket with this ID already exists.
    AlreadyExists { id: String },
    /// The slug does not satisfy the `[a-z0-9-]` rules.
    InvalidSlug { slug: String, reason: String },
}

impl std::fmt::Display for TicketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::styling::{ERROR, ERROR_BOLD, ERROR_EMOJI, HINT, HINT_EMOJI};
        match self {
            TicketError::NotFound { id } => write!(
                f,
                "{ERROR_EMOJI} {ERROR}Ticket {ERROR_BOLD}{id}{ERROR_BOLD:#}{ERROR} not found{ERROR:#}"
            ),
            TicketError::Ambiguous { prefix, matches } => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Ticket prefix {ERROR_BOLD}{prefix}{ERROR_BOLD:#}{ERROR} is ambiguous{ERROR:#}\n"
                )?;
                for m in matches {
                    writeln!(f, "  {m}")?;
                }
                write!(
                    f,
                    "{HINT_EMOJI} {HINT}Use a longer prefix or the full ID{HINT:#}"
                )
            }
            TicketError::Invalid { path, reason } => write!(
                f,
                "{ERROR_EMOJI} {ERROR}Invalid ticket {ERROR_BOLD}{}{ERROR_BOLD:#}{ERROR}: {reason}{ERROR:#}",
                path.display()
            ),
            TicketError::AlreadyExists { id } => write!(
                f,
                "{ERROR_EMOJI} {ERROR}Ticket {ERROR_BOLD}{id}{ERROR_BOLD:#}{ERROR} already exists{ERROR:#}\n\n{HINT_EMOJI} {HINT}Pick a different slug or retry in a moment{HINT:#}"
            ),
            TicketError::InvalidSlug { slug, reason } => write!(
                f,
                "{ERROR_EMOJI} {ERROR}Invalid slug {ERROR_BOLD}{slug:?}{ERROR_BOLD:#}{ERROR}: {reason}{ERROR:#}"
            ),
        }
    }
}

impl std::error::Error for TicketError {}

// ============================================================================
// Status
// ============================================================================

/// Ticket status, derived purely from the directory the file resides in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Todo,
    Doing,
    Done,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Todo, Status::Doing, Status::Done];
}

// ============================================================================
// Slug and ID
// ============================================================================

/// Validate a ticket slug: non-empty, lowercase alphanumerics separated by
/// single hyphens, bounded length.
pub fn validate_slug(slug: &str) -> Result<(), TicketError> {
    let fail = |reason: &str| {
        Err(TicketError::InvalidSlug {
            slug: slug.to_string(),
            reason: reason.to_string(),
        })
    };
    if slug.is_empty() {
        return fail("slug must not be empty");
    }
    if slug.len() > MAX_SLUG_LEN {
        return fail("slug is too long");
    }
    static SLUG_RE: OnceLock<Regex> = OnceLock::new();
    let re = SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap());
    if !re.is_match(slug) {
        return fail("only lowercase letters, digits, and single hyphens are allowed");
    }
    Ok(())
}

/// A ticket identifier of the form `YYMMDD-HHMMSS-<slug>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Compose an ID from a timestamp and a slug.
    pub fn compose(at: DateTime<Local>, slug: &str) -> Result<Self, TicketError> {
        validate_slug(slug)?;
        Ok(Self(format!("{}-{slug}", at.format(ID_TIMESTAMP_FORMAT))))
    }

    /// Parse a full ticket ID, rejecting anything that does not match the
    /// `YYMMDD-HHMMSS-<slug>` shape.
    pub fn parse(s: &str) -> Result<Self, TicketError> {
        static ID_RE: OnceLock<Regex> = OnceLock::new();
        let re = ID_RE.get_or_init(|| {
            Regex::new(r"^\d{6}-\d{6}-[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap()
        });
        if !re.is_match(s) || s.len() > 13 + 1 + MAX_SLUG_LEN {
            return Err(TicketError::InvalidSlug {
                slug: s.to_string(),
                reason: "not a ticket ID (expected YYMMDD-HHMMSS-slug)".to_string(),
            });
        }
        Ok(Self(s.to_string()))
    }

    /// True when `s` has the shape of a ticket ID. Used for implicit-parent
    /// detection from branch names and for stale-branch scanning.
    pub fn is_id(s: &str) -> bool {
        Self::parse(s).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The slug component (everything after the timestamp).
    pub fn slug(&self) -> &str {
        &self.0[14..]
    }

    /// File name for this ticket, `<ID>.md`.
    pub fn file_name(&self) -> String {
        format!("{}.md", self.0)
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Relations
// ============================================================================

/// A typed link to another ticket, serialized as `<kind>:<ID>`.
///
/// Accepted input forms:
/// - bare scalar: `- parent:250711-093015-fix-parser`
/// - quoted scalar: `- "parent:250711-093015-fix-parser"`
/// - single-entry mapping: `- parent: 250711-093015-fix-parser`
///   (what YAML yields when the value is written unquoted with a space)
///
/// On output, relations are always written as single scalar strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub kind: String,
    pub target: String,
}

impl Relation {
    pub const PARENT: &'static str = "parent";

    pub fn parent(target: impl Into<String>) -> Self {
        Self {
            kind: Self::PARENT.to_string(),
            target: target.into(),
        }
    }

    pub fn is_parent(&self) -> bool {
        self.kind == Self::PARENT
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.target)
    }
}

impl Serialize for Relation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Relation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RelationVisitor;

        impl<'de> Visitor<'de> for RelationVisitor {
            type Value = Relation;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a 'kind:ID' string or a single-entry mapping")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Relation, E> {
                let (kind, target) = v
                    .split_once(':')
                    .ok_or_else(|| E::custom(format!("relation '{v}' is missing ':'")))?;
                if kind.is_empty() || target.is_empty() {
                    return Err(E::custom(format!("relation '{v}' has an empty side")));
                }
                Ok(Relation {
                    kind: kind.to_string(),
                    target: target.trim().to_string(),
                })
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Relation, A::Error> {
                let entry: Option<(String, String)> = map.next_entry()?;
                let (kind, target) =
                    entry.ok_or_else(|| de::Error::custom("empty relation mapping"))?;
                if map.next_key::<String>()?.is_some() {
                    return Err(de::Error::custom(
                        "relation mapping must have exactly one entry",
                    ));
                }
                Ok(Relation { kind, target })
            }
        }

        deserializer.deserialize_any(RelationVisitor)
    }
}

// ============================================================================
// Front-matter and Ticket
// ============================================================================

/// The YAML front-matter block, as serialized to disk.
///
/// `started_at` and `closed_at` are always emitted (as `null` when unset)
/// so the file makes the lifecycle visible. Unknown keys land in `extra`
/// and are written back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FrontMatter {
    priority: i64,
    description: String,
    created_at: DateTime<Local>,
    started_at: Option<DateTime<Local>>,
    closed_at: Option<DateTime<Local>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    closure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    related: Vec<Relation>,
    #[serde(flatten)]
    extra: serde_yaml::Mapping,
}

/// An in-memory ticket: parsed front-matter plus the markdown body and the
/// location it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub id: TicketId,
    /// Directory-derived status; set by the store, never parsed from the file.
    pub status: Status,
    /// Path of the file this ticket was read from (or will be written to).
    pub path: PathBuf,
    pub priority: i64,
    pub description: String,
    pub created_at: DateTime<Local>,
    pub started_at: Option<DateTime<Local>>,
    pub closed_at: Option<DateTime<Local>>,
    pub closure_reason: Option<String>,
    pub related: Vec<Relation>,
    /// Unknown front-matter keys, preserved for round-tripping.
    pub extra: serde_yaml::Mapping,
    /// Markdown body beneath the front-matter.
    pub content: String,
}

impl Ticket {
    /// Create a fresh `todo` ticket with the default body skeleton.
    pub fn create(id: TicketId, description: String, priority: i64, at: DateTime<Local>) -> Self {
        let content = format!("# Summary\n\n{description}\n\n## Tasks\n\n- [ ] \n\n## Notes\n");
        Self {
            id,
            status: Status::Todo,
            path: PathBuf::new(),
            priority,
            description,
            created_at: at,
            started_at: None,
            closed_at: None,
            closure_reason: None,
            related: Vec::new(),
            extra: serde_yaml::Mapping::new(),
            content,
        }
    }

    /// Parse a ticket file. `status` is supplied by the caller from the
    /// directory the file was found in.
    pub fn parse(path: &Path, raw: &str, status: Status) -> Result<Self, TicketError> {
        let invalid = |reason: String| TicketError::Invalid {
            path: path.to_path_buf(),
            reason,
        };

        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| invalid("file name is not valid UTF-8".to_string()))
            .and_then(|stem| {
                TicketId::parse(stem).map_err(|_| invalid(format!("file name '{stem}' is not a ticket ID")))
            })?;

        let rest = raw
            .strip_prefix("---\n")
            .ok_or_else(|| invalid("missing front-matter block".to_string()))?;
        let (yaml, content) = match rest.split_once("\n---\n") {
            Some((yaml, content)) => (yaml, content.to_string()),
            // Terminator on the last line without trailing newline
            None => match rest.strip_suffix("\n---") {
                Some(yaml) => (yaml, String::new()),
                None => return Err(invalid("unterminated front-matter block".to_string())),
            },
        };

        let fm: FrontMatter = serde_yaml::from_str(yaml)
            .map_err(|e| invalid(format!("front-matter: {e}")))?;

        Ok(Self {
            id,
            status,
            path: path.to_path_buf(),
            priority: fm.priority,
            description: fm.description,
            created_at: fm.created_at,
            started_at: fm.started_at,
            closed_at: fm.closed_at,
            closure_reason: fm.closure_reason,
            related: fm.related,
            extra: fm.extra,
            content,
        })
    }

    /// Serialize to the on-disk format: `---`, YAML mapping, `---`, body.
    pub fn to_file_string(&self) -> anyhow::Result<String> {
        let fm = FrontMatter {
            priority: self.priority,
            description: self.description.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            closed_at: self.closed_at,
            closure_reason: self.closure_reason.clone(),
            related: self.related.clone(),
            extra: self.extra.clone(),
        };
        let yaml = serde_yaml::to_string(&fm)?;
        Ok(format!("---\n{yaml}---\n{}", self.content))
    }

    /// The ticket's parent ID, if any.
    pub fn parent(&self) -> Option<&str> {
        self.related
            .iter()
            .find(|r| r.is_parent())
            .map(|r| r.target.as_str())
    }

    /// Prepend a `parent:` relation. The at-most-one-parent invariant is
    /// the caller's responsibility (enforced by the lifecycle engine).
    pub fn set_parent(&mut self, parent_id: &TicketId) {
        self.related.insert(0, Relation::parent(parent_id.as_str()));
    }

    /// Append the closure note that `close --reason` records in the body.
    pub fn append_closure_note(&mut self, reason: &str, at: DateTime<Local>) {
        if !self.content.ends_with('\n') && !self.content.is_empty() {
            self.content.push('\n');
        }
        self.content.push_str(&format!(
            "\n---\nClosed {}: {reason}\n",
            at.format("%Y-%m-%d %H:%M:%S")
        ));
    }
}
