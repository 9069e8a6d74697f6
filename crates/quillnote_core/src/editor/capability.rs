//! Fixed editor capability descriptors and profile composition.
//!
//! Each capability contributes the commands it enables and the toolbar
//! affordances that invoke them. Profiles are composed once at construction;
//! there is no runtime registration.

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Placeholder shown in an empty editor.
pub const DEFAULT_PLACEHOLDER: &str = "Start writing...";

/// Heading levels offered by the default profiles.
pub const DEFAULT_HEADING_LEVELS: &[u8] = &[1, 2, 3];

/// Font size presets as `(label, css value)`.
pub const FONT_SIZES: &[(&str, &str)] = &[
    ("Small", "0.875rem"),
    ("Normal", "1rem"),
    ("Large", "1.25rem"),
    ("Larger", "1.5rem"),
    ("Extra Large", "2rem"),
];

/// Text color presets as `(label, css value)`.
pub const TEXT_COLORS: &[(&str, &str)] = &[
    ("Default", "inherit"),
    ("Red", "#ef4444"),
    ("Orange", "#f97316"),
    ("Yellow", "#eab308"),
    ("Green", "#22c55e"),
    ("Blue", "#3b82f6"),
    ("Purple", "#a855f7"),
    ("Pink", "#ec4899"),
];

/// One rich-text editor feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EditorCapability {
    Bold,
    Italic,
    Underline,
    Strike,
    InlineCode,
    Heading,
    BulletList,
    OrderedList,
    Blockquote,
    CodeBlock,
    HorizontalRule,
    History,
    Placeholder,
    TextStyle,
    TextColor,
    FontSize,
    TextAlign,
    Table,
    Image,
    Link,
    TaskList,
    Highlight,
}

/// Toolbar grouping used by views to lay out affordances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarGroup {
    Format,
    Block,
    Align,
    Insert,
    History,
}

/// One toolbar button bound to an editor command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolbarItem {
    pub id: &'static str,
    pub label: &'static str,
    pub command: &'static str,
    pub group: ToolbarGroup,
}

// Struct literal so `&[item!(..)]` is promoted to a `'static` slice.
macro_rules! item {
    ($id:expr, $label:expr, $command:expr, $group:expr $(,)?) => {
        ToolbarItem {
            id: $id,
            label: $label,
            command: $command,
            group: $group,
        }
    };
}

const ALL_CAPABILITIES: &[EditorCapability] = &[
    EditorCapability::Bold,
    EditorCapability::Italic,
    EditorCapability::Underline,
    EditorCapability::Strike,
    EditorCapability::InlineCode,
    EditorCapability::Heading,
    EditorCapability::BulletList,
    EditorCapability::OrderedList,
    EditorCapability::Blockquote,
    EditorCapability::CodeBlock,
    EditorCapability::HorizontalRule,
    EditorCapability::History,
    EditorCapability::Placeholder,
    EditorCapability::TextStyle,
    EditorCapability::TextColor,
    EditorCapability::FontSize,
    EditorCapability::TextAlign,
    EditorCapability::Table,
    EditorCapability::Image,
    EditorCapability::Link,
    EditorCapability::TaskList,
    EditorCapability::Highlight,
];

/// Core formatting shipped with every profile.
const STARTER_KIT: &[EditorCapability] = &[
    EditorCapability::Bold,
    EditorCapability::Italic,
    EditorCapability::Strike,
    EditorCapability::InlineCode,
    EditorCapability::Heading,
    EditorCapability::BulletList,
    EditorCapability::OrderedList,
    EditorCapability::Blockquote,
    EditorCapability::CodeBlock,
    EditorCapability::HorizontalRule,
    EditorCapability::History,
];

impl EditorCapability {
    /// Every known capability in declaration order.
    pub fn all() -> &'static [EditorCapability] {
        ALL_CAPABILITIES
    }

    /// Stable string id.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bold => "bold",
            Self::Italic => "italic",
            Self::Underline => "underline",
            Self::Strike => "strike",
            Self::InlineCode => "code",
            Self::Heading => "heading",
            Self::BulletList => "bullet_list",
            Self::OrderedList => "ordered_list",
            Self::Blockquote => "blockquote",
            Self::CodeBlock => "code_block",
            Self::HorizontalRule => "horizontal_rule",
            Self::History => "history",
            Self::Placeholder => "placeholder",
            Self::TextStyle => "text_style",
            Self::TextColor => "color",
            Self::FontSize => "font_size",
            Self::TextAlign => "text_align",
            Self::Table => "table",
            Self::Image => "image",
            Self::Link => "link",
            Self::TaskList => "task_list",
            Self::Highlight => "highlight",
        }
    }

    /// Commands this capability enables.
    pub fn commands(self) -> &'static [&'static str] {
        match self {
            Self::Bold => &["toggleBold"],
            Self::Italic => &["toggleItalic"],
            Self::Underline => &["toggleUnderline"],
            Self::Strike => &["toggleStrike"],
            Self::InlineCode => &["toggleCode"],
            Self::Heading => &["toggleHeading"],
            Self::BulletList => &["toggleBulletList"],
            Self::OrderedList => &["toggleOrderedList"],
            Self::Blockquote => &["toggleBlockquote"],
            Self::CodeBlock => &["toggleCodeBlock"],
            Self::HorizontalRule => &["setHorizontalRule"],
            Self::History => &["undo", "redo"],
            Self::Placeholder | Self::TextStyle => &[],
            Self::TextColor => &["setColor", "unsetColor"],
            Self::FontSize => &["setFontSize"],
            Self::TextAlign => &["setTextAlign"],
            Self::Table => &[
                "insertTable",
                "addRowAfter",
                "deleteRow",
                "addColumnAfter",
                "deleteColumn",
                "deleteTable",
            ],
            Self::Image => &["setImage"],
            Self::Link => &["setLink", "unsetLink"],
            Self::TaskList => &["toggleTaskList"],
            Self::Highlight => &["toggleHighlight"],
        }
    }

    /// Toolbar affordances this capability contributes.
    pub fn toolbar(self) -> &'static [ToolbarItem] {
        use ToolbarGroup::{Align, Block, Format, History, Insert};
        match self {
            Self::Bold => &[item!("bold", "Bold", "toggleBold", Format)],
            Self::Italic => &[item!("italic", "Italic", "toggleItalic", Format)],
            Self::Underline => &[item!("underline", "Underline", "toggleUnderline", Format)],
            Self::Strike => &[item!("strike", "Strikethrough", "toggleStrike", Format)],
            Self::InlineCode => &[item!("code", "Code", "toggleCode", Format)],
            Self::Heading => &[item!("heading", "Heading", "toggleHeading", Block)],
            Self::BulletList => &[item!("bullet_list", "Bullet list", "toggleBulletList", Block)],
            Self::OrderedList => &[item!(
                "ordered_list",
                "Numbered list",
                "toggleOrderedList",
                Block,
            )],
            Self::Blockquote => &[item!("blockquote", "Quote", "toggleBlockquote", Block)],
            Self::CodeBlock => &[item!("code_block", "Code block", "toggleCodeBlock", Block)],
            Self::HorizontalRule => &[item!("divider", "Divider", "setHorizontalRule", Insert)],
            Self::History => &[
                item!("undo", "Undo", "undo", History),
                item!("redo", "Redo", "redo", History),
            ],
            Self::Placeholder | Self::TextStyle => &[],
            Self::TextColor => &[item!("color", "Text color", "setColor", Format)],
            Self::FontSize => &[item!("font_size", "Font size", "setFontSize", Format)],
            Self::TextAlign => &[item!("align", "Align", "setTextAlign", Align)],
            Self::Table => &[item!("table", "Table", "insertTable", Insert)],
            Self::Image => &[item!("image", "Image", "setImage", Insert)],
            Self::Link => &[item!("link", "Link", "setLink", Insert)],
            Self::TaskList => &[item!("task_list", "Task list", "toggleTaskList", Block)],
            Self::Highlight => &[item!("highlight", "Highlight", "toggleHighlight", Format)],
        }
    }

    /// Capabilities that must be present for this one to work.
    pub fn requires(self) -> &'static [EditorCapability] {
        match self {
            Self::TextColor | Self::FontSize => &[EditorCapability::TextStyle],
            _ => &[],
        }
    }
}

/// Parses one capability from its string id.
pub fn parse_editor_capability(value: &str) -> Result<EditorCapability, EditorProfileError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(EditorProfileError::EmptyCapability);
    }
    ALL_CAPABILITIES
        .iter()
        .copied()
        .find(|capability| capability.as_str() == normalized)
        .ok_or_else(|| EditorProfileError::UnsupportedCapability(normalized.to_string()))
}

/// Profile composition errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorProfileError {
    EmptyCapability,
    UnsupportedCapability(String),
    DuplicateCapability(EditorCapability),
    MissingDependency {
        capability: EditorCapability,
        requires: EditorCapability,
    },
    InvalidHeadingLevel(u8),
}

impl Display for EditorProfileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCapability => write!(f, "editor capability value must not be empty"),
            Self::UnsupportedCapability(value) => {
                write!(f, "editor capability is unsupported: {value}")
            }
            Self::DuplicateCapability(capability) => {
                write!(f, "editor capability listed twice: {}", capability.as_str())
            }
            Self::MissingDependency {
                capability,
                requires,
            } => write!(
                f,
                "editor capability `{}` requires `{}`",
                capability.as_str(),
                requires.as_str()
            ),
            Self::InvalidHeadingLevel(level) => {
                write!(f, "heading level must be between 1 and 6, got {level}")
            }
        }
    }
}

impl Error for EditorProfileError {}

/// Editor feature set composed at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorProfile {
    capabilities: BTreeSet<EditorCapability>,
    heading_levels: Vec<u8>,
    placeholder: String,
}

impl EditorProfile {
    /// Composes a profile from an explicit capability list.
    pub fn compose(
        capabilities: &[EditorCapability],
        heading_levels: &[u8],
        placeholder: impl Into<String>,
    ) -> Result<Self, EditorProfileError> {
        let mut set = BTreeSet::new();
        for capability in capabilities {
            if !set.insert(*capability) {
                return Err(EditorProfileError::DuplicateCapability(*capability));
            }
        }
        for capability in &set {
            for requires in capability.requires() {
                if !set.contains(requires) {
                    return Err(EditorProfileError::MissingDependency {
                        capability: *capability,
                        requires: *requires,
                    });
                }
            }
        }
        if let Some(level) = heading_levels
            .iter()
            .copied()
            .find(|level| !(1..=6).contains(level))
        {
            return Err(EditorProfileError::InvalidHeadingLevel(level));
        }

        Ok(Self {
            capabilities: set,
            heading_levels: heading_levels.to_vec(),
            placeholder: placeholder.into(),
        })
    }

    /// Starter formatting plus placeholder.
    pub fn basic() -> Self {
        let mut capabilities = STARTER_KIT.to_vec();
        capabilities.push(EditorCapability::Placeholder);
        Self {
            capabilities: capabilities.into_iter().collect(),
            heading_levels: DEFAULT_HEADING_LEVELS.to_vec(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }

    /// Full rich-text profile used by the note editor page.
    pub fn rich_text() -> Self {
        Self {
            capabilities: ALL_CAPABILITIES.iter().copied().collect(),
            heading_levels: DEFAULT_HEADING_LEVELS.to_vec(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }

    pub fn supports(&self, capability: EditorCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Whether any composed capability enables `command`.
    pub fn has_command(&self, command: &str) -> bool {
        self.capabilities
            .iter()
            .any(|capability| capability.commands().contains(&command))
    }

    pub fn capabilities(&self) -> impl Iterator<Item = EditorCapability> + '_ {
        self.capabilities.iter().copied()
    }

    /// All enabled commands, in capability order.
    pub fn commands(&self) -> Vec<&'static str> {
        self.capabilities
            .iter()
            .flat_map(|capability| capability.commands().iter().copied())
            .collect()
    }

    /// Toolbar affordances, in capability order.
    pub fn toolbar(&self) -> Vec<ToolbarItem> {
        self.capabilities
            .iter()
            .flat_map(|capability| capability.toolbar().iter().copied())
            .collect()
    }

    pub fn heading_levels(&self) -> &[u8] {
        &self.heading_levels
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }
}

/// Outcome of the link prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    Set(String),
    Unset,
}

impl LinkAction {
    /// Maps prompt input to an action: cancelled prompts (`None`) do nothing,
    /// an empty answer removes the link.
    pub fn from_prompt(input: Option<&str>) -> Option<Self> {
        let value = input?.trim();
        if value.is_empty() {
            Some(Self::Unset)
        } else {
            Some(Self::Set(value.to_string()))
        }
    }
}
