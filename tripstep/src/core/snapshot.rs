//! Accessibility-tree extraction.
//!
//! Flattens a uiautomator-style `<node>` hierarchy into indexed [`Candidate`]s
//! in pre-order, and derives screen geometry and the dominant package.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::candidate::{Candidate, Rect};

/// Lower bounds for derived screen geometry.
pub const DEFAULT_WIDTH: i32 = 1080;
pub const DEFAULT_HEIGHT: i32 = 2400;

const NODE_TAG: &str = "node";

/// The snapshot document could not be parsed. Fatal for the invocation.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("parse accessibility snapshot: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// Derived bounds and node counts for one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
    pub total_nodes: usize,
    pub clickable_nodes: usize,
}

/// Parsed snapshot: every node plus derived metadata.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// All nodes; `nodes[i].idx == i`.
    pub nodes: Vec<Candidate>,
    pub size: ScreenSize,
    /// Most frequent non-empty package, or empty if none.
    pub dominant_package: String,
}

/// Parse a serialized accessibility tree.
pub fn parse_snapshot(xml: &str) -> Result<Snapshot, SnapshotError> {
    let doc = roxmltree::Document::parse(xml)?;

    let mut nodes = Vec::new();
    let mut index_of = HashMap::new();
    let mut max_x = 0;
    let mut max_y = 0;

    for element in doc.descendants().filter(|n| n.has_tag_name(NODE_TAG)) {
        let idx = nodes.len();
        index_of.insert(element.id(), idx);

        let parent = element
            .ancestors()
            .skip(1)
            .find(|a| a.has_tag_name(NODE_TAG))
            .and_then(|a| index_of.get(&a.id()).copied());

        let attr = |name: &str| element.attribute(name).unwrap_or_default().to_string();
        let bounds = attr("bounds");
        let rect = Rect::parse(&bounds);
        if let Some(rect) = rect {
            max_x = max_x.max(rect.x2);
            max_y = max_y.max(rect.y2);
        }
        let package = element
            .attribute("package")
            .filter(|p| !p.is_empty())
            .or_else(|| element.attribute("packageName"))
            .unwrap_or_default()
            .to_string();

        nodes.push(Candidate {
            idx,
            parent,
            package,
            class_name: attr("class"),
            resource_id: attr("resource-id"),
            text: attr("text"),
            content_desc: attr("content-desc"),
            clickable: flag(element.attribute("clickable")),
            enabled: !element
                .attribute("enabled")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("false")),
            focusable: flag(element.attribute("focusable")),
            focused: flag(element.attribute("focused")),
            bounds,
            rect,
        });
    }

    let size = ScreenSize {
        width: max_x.max(DEFAULT_WIDTH),
        height: max_y.max(DEFAULT_HEIGHT),
        total_nodes: nodes.len(),
        clickable_nodes: nodes.iter().filter(|c| c.clickable).count(),
    };
    let dominant_package = dominant_package(&nodes);
    debug!(
        total_nodes = size.total_nodes,
        width = size.width,
        height = size.height,
        dominant_package = %dominant_package,
        "snapshot parsed"
    );

    Ok(Snapshot {
        nodes,
        size,
        dominant_package,
    })
}

fn flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

/// Most frequent non-empty package; ties go to the package seen first.
fn dominant_package(nodes: &[Candidate]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for node in nodes.iter().filter(|n| !n.package.is_empty()) {
        match counts.iter_mut().find(|(pkg, _)| *pkg == node.package) {
            Some((_, count)) => *count += 1,
            None => counts.push((&node.package, 1)),
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for (pkg, count) in counts {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((pkg, count));
        }
    }
    best.map(|(pkg, _)| pkg.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>
<hierarchy rotation="0">
  <node index="0" text="" resource-id="" class="android.widget.FrameLayout" package="lu.cfl.app" content-desc="" clickable="false" enabled="true" focusable="false" focused="false" bounds="[0,0][1080,2340]">
    <node index="0" text="Trip Planner" resource-id="lu.cfl.app:id/title" class="android.widget.TextView" package="lu.cfl.app" content-desc="" clickable="true" enabled="true" focusable="true" focused="false" bounds="[0,100][1080,200]" />
    <node index="1" text="broken" resource-id="" class="android.view.View" package="lu.cfl.app" content-desc="" clickable="true" enabled="false" focusable="false" focused="false" bounds="[10,10][10,20]" />
  </node>
  <node index="1" text="q" resource-id="" class="android.widget.Button" package="com.android.inputmethod.latin" content-desc="" clickable="true" enabled="true" focusable="false" focused="false" bounds="[0,2400][100,2500]" />
</hierarchy>"#;

    #[test]
    fn extracts_nodes_in_pre_order_with_parents() {
        let snapshot = parse_snapshot(DUMP).expect("parse");
        assert_eq!(snapshot.nodes.len(), 4);
        let ids: Vec<usize> = snapshot.nodes.iter().map(|n| n.idx).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(snapshot.nodes[1].text, "Trip Planner");
        assert_eq!(snapshot.nodes[1].parent, Some(0));
        assert_eq!(snapshot.nodes[3].parent, None);
    }

    #[test]
    fn derives_screen_size_with_floor() {
        let snapshot = parse_snapshot(DUMP).expect("parse");
        assert_eq!(snapshot.size.width, DEFAULT_WIDTH);
        assert_eq!(snapshot.size.height, 2500);
        assert_eq!(snapshot.size.total_nodes, 4);
        assert_eq!(snapshot.size.clickable_nodes, 3);
    }

    #[test]
    fn degenerate_bounds_have_no_center() {
        let snapshot = parse_snapshot(DUMP).expect("parse");
        assert!(snapshot.nodes[2].center().is_none());
        assert!(!snapshot.nodes[2].enabled);
    }

    #[test]
    fn dominant_package_is_most_frequent() {
        let snapshot = parse_snapshot(DUMP).expect("parse");
        assert_eq!(snapshot.dominant_package, "lu.cfl.app");
    }

    #[test]
    fn missing_attributes_get_defaults() {
        let snapshot =
            parse_snapshot(r#"<hierarchy><node bounds="[0,0][5,5]"/></hierarchy>"#).expect("parse");
        let node = &snapshot.nodes[0];
        assert!(node.enabled);
        assert!(!node.clickable);
        assert!(node.text.is_empty());
        assert!(snapshot.dominant_package.is_empty());
    }

    #[test]
    fn malformed_document_is_an_error() {
        let err = parse_snapshot("<hierarchy><node></hierarchy>").expect_err("should fail");
        assert!(err.to_string().contains("parse accessibility snapshot"));
    }
}
