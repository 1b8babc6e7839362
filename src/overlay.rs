//! Overlay snapshots for UI backends.
//!
//! A snapshot groups handles by screen position, then by group name, with
//! lines ordered by `(order, id)`. It is plain data and serializes with
//! serde, so terminal or remote renderers can consume it directly.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::handle::{HandleId, MonitorHandle};
use crate::reflect::UiPosition;
use crate::value::Color;

/// Selects the handles that go into a snapshot.
#[derive(Debug, Clone, Default)]
pub struct OverlayFilter {
    /// Keep handles carrying any of these tags. Empty keeps all.
    pub tags: Vec<String>,
    pub include_disabled: bool,
    /// Case-insensitive substring of the label.
    pub text: Option<String>,
}

impl OverlayFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub const fn include_disabled(mut self) -> Self {
        self.include_disabled = true;
        self
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into().to_lowercase());
        self
    }

    fn accepts(&self, handle: &MonitorHandle) -> bool {
        if handle.is_disposed() || (!self.include_disabled && !handle.is_enabled()) {
            return false;
        }
        let format = handle.format();
        if !self.tags.is_empty() && !self.tags.iter().any(|t| format.has_tag(t)) {
            return false;
        }
        self.text
            .as_ref()
            .map_or(true, |text| format.label.to_lowercase().contains(text.as_str()))
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayLine {
    pub id: HandleId,
    pub label: String,
    pub text: String,
    pub order: i32,
    pub color: Option<Color>,
    pub font_size: Option<u32>,
    pub indent: u32,
    pub enabled: bool,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayGroup {
    pub name: Option<String>,
    pub lines: Vec<OverlayLine>,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayArea {
    pub position: UiPosition,
    pub groups: Vec<OverlayGroup>,
}

/// Point-in-time view of every selected handle.
#[allow(missing_docs)]
#[derive(Debug, Clone, Serialize)]
pub struct OverlaySnapshot {
    pub captured_at: DateTime<Utc>,
    pub areas: Vec<OverlayArea>,
}

impl OverlaySnapshot {
    /// Captures `handles` that pass `filter`. Groups keep the order in
    /// which they first appear.
    pub fn capture<'a>(handles: impl IntoIterator<Item = &'a MonitorHandle>, filter: &OverlayFilter) -> Self {
        let mut areas: BTreeMap<UiPosition, Vec<OverlayGroup>> = BTreeMap::new();
        for handle in handles.into_iter().filter(|h| filter.accepts(h)) {
            let format = handle.format();
            let groups = areas.entry(format.position).or_default();
            let index = match groups.iter().position(|g| g.name == format.group) {
                Some(index) => index,
                None => {
                    groups.push(OverlayGroup {
                        name: format.group.clone(),
                        lines: Vec::new(),
                    });
                    groups.len() - 1
                }
            };
            groups[index].lines.push(OverlayLine {
                id: handle.id(),
                label: format.label.clone(),
                text: handle.state(),
                order: format.order,
                color: format.color,
                font_size: format.font_size,
                indent: format.indent,
                enabled: handle.is_enabled(),
            });
        }

        let areas = areas
            .into_iter()
            .map(|(position, mut groups)| {
                for group in &mut groups {
                    group.lines.sort_by_key(|line| (line.order, line.id));
                }
                OverlayArea { position, groups }
            })
            .collect();
        Self {
            captured_at: Utc::now(),
            areas,
        }
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.areas
            .iter()
            .flat_map(|a| &a.groups)
            .map(|g| g.lines.len())
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line_count() == 0
    }

    /// Plain-text rendering, one indented line per state line.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for area in &self.areas {
            let _ = writeln!(out, "[{:?}]", area.position);
            for group in &area.groups {
                let depth = if let Some(name) = &group.name {
                    let _ = writeln!(out, "  {name}");
                    2
                } else {
                    1
                };
                for line in &group.lines {
                    let pad = "  ".repeat(depth + line.indent as usize);
                    for text in line.text.lines() {
                        let _ = writeln!(out, "{pad}{text}");
                    }
                }
            }
        }
        out
    }
}
