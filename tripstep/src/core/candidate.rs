//! Candidate model for accessibility-tree nodes.
//!
//! A [`Candidate`] is one `<node>` of a snapshot, addressed by its pre-order
//! traversal index. Indices are stable within a snapshot only.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static BOUNDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]$").expect("bounds regex should be valid")
});

/// Single-key labels drawn by on-screen keyboards.
const KEYBOARD_LABELS: &[&str] = &[
    "ESC", "ALT", "CTRL", "HOME", "END", "PGUP", "PGDN", "↹", "⇳", "☰", "↑", "↓", "←", "→",
];

/// Package substrings that identify input-method windows.
const KEYBOARD_PACKAGE_MARKERS: &[&str] = &["inputmethod", "keyboard"];

/// Screen rectangle decoded from a `[x1,y1][x2,y2]` bounds string.
///
/// Always non-degenerate: `x2 > x1` and `y2 > y1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    /// Decode a bounds string. Returns `None` for anything outside the grammar
    /// or for empty rectangles.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = BOUNDS_RE.captures(raw.trim())?;
        let coord = |i: usize| caps.get(i)?.as_str().parse::<i32>().ok();
        let rect = Self {
            x1: coord(1)?,
            y1: coord(2)?,
            x2: coord(3)?,
            y2: coord(4)?,
        };
        if rect.x2 <= rect.x1 || rect.y2 <= rect.y1 {
            return None;
        }
        Some(rect)
    }

    pub fn center(&self) -> Point {
        Point {
            x: (self.x1 + self.x2).div_euclid(2),
            y: (self.y1 + self.y2).div_euclid(2),
        }
    }

    pub fn area(&self) -> i64 {
        i64::from(self.x2 - self.x1) * i64::from(self.y2 - self.y1)
    }

    /// True if `inner` lies fully inside `self` (edges may touch).
    pub fn contains(&self, inner: &Rect) -> bool {
        self.x1 <= inner.x1 && self.y1 <= inner.y1 && self.x2 >= inner.x2 && self.y2 >= inner.y2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// One accessibility-tree node, populated with explicit defaults for every
/// attribute the snapshot omits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub idx: usize,
    /// Index of the enclosing `<node>`, if any.
    pub parent: Option<usize>,
    pub package: String,
    pub class_name: String,
    pub resource_id: String,
    pub text: String,
    pub content_desc: String,
    pub clickable: bool,
    pub enabled: bool,
    pub focusable: bool,
    pub focused: bool,
    pub bounds: String,
    pub rect: Option<Rect>,
}

impl Candidate {
    /// Center of the decoded bounds. Present only for non-degenerate rectangles.
    pub fn center(&self) -> Option<Point> {
        self.rect.as_ref().map(Rect::center)
    }

    /// True for on-screen keyboard glyphs, which must never be tapped.
    pub fn is_keyboard(&self) -> bool {
        let package = self.package.to_lowercase();
        if KEYBOARD_PACKAGE_MARKERS
            .iter()
            .any(|marker| package.contains(marker))
        {
            return true;
        }
        let text = self.text.trim();
        let desc = self.content_desc.trim();
        KEYBOARD_LABELS
            .iter()
            .any(|label| *label == text || *label == desc)
    }

    /// Enabled, has a center, clickable or focusable, and not a keyboard key.
    ///
    /// Real dumps often mark tappable rows as focusable only, so both flags count.
    pub fn is_actionable(&self) -> bool {
        self.enabled
            && self.rect.is_some()
            && (self.clickable || self.focusable)
            && !self.is_keyboard()
    }

    pub fn has_label(&self) -> bool {
        !self.text.is_empty() || !self.content_desc.is_empty()
    }

    /// Case-insensitive substring match on text or description.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = normalize(needle);
        if needle.is_empty() {
            return false;
        }
        normalize(&self.text).contains(&needle) || normalize(&self.content_desc).contains(&needle)
    }

    /// One-line description for diagnostics.
    pub fn summary_line(&self) -> String {
        let center = match self.center() {
            Some(p) => format!("({},{})", p.x, p.y),
            None => "(?,?)".to_string(),
        };
        format!(
            "[{}] {} | id={} | text={} | desc={} | click={} focusable={} enabled={} focused={} center={}",
            self.idx,
            or_dash(&self.class_name),
            or_dash(&self.resource_id),
            or_dash(&self.text),
            or_dash(&self.content_desc),
            self.clickable,
            self.focusable,
            self.enabled,
            self.focused,
            center
        )
    }
}

/// Trimmed, lowercased comparison key.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}
