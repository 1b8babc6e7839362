//! Presentational data resolved once per profile.
//!
//! Each field is resolved through an ordered list of option layers
//! (member attribute, then the type-level options), evaluated short
//! circuit, before a computed default applies.

use serde::Serialize;

use crate::reflect::attributes::{FormatOptions, MonitorAttribute, UiPosition};
use crate::settings::{MonitorSettings, NameSettings};
use crate::target::TypeKey;
use crate::value::Color;

/// Display metadata of a monitored member.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatData {
    pub label: String,
    pub position: UiPosition,
    pub group: Option<String>,
    pub order: i32,
    pub color: Option<Color>,
    pub font_size: Option<u32>,
    pub indent: u32,
    pub group_elements: bool,
    /// Member-level number format override, if any.
    pub format: Option<String>,
    pub rich_text: bool,
    pub enabled_by_default: bool,
    pub tags: Vec<String>,
}

/// Option layers in precedence order.
struct Layers<'a>(Vec<&'a FormatOptions>);

impl Layers<'_> {
    fn resolve<V>(&self, pick: impl Fn(&FormatOptions) -> Option<V>) -> Option<V> {
        self.0.iter().find_map(|&layer| pick(layer))
    }
}

impl FormatData {
    /// Resolves format data for `member` declared on `declaring`.
    #[must_use]
    pub fn resolve(
        declaring: &TypeKey,
        type_options: Option<&FormatOptions>,
        member: &str,
        attribute: &MonitorAttribute,
        settings: &MonitorSettings,
    ) -> Self {
        let mut layers = vec![&attribute.options];
        layers.extend(type_options);
        let layers = Layers(layers);

        let class_prefix = layers
            .resolve(|o| o.class_name_prefix)
            .unwrap_or(settings.names.prefix_class_name);
        let label = attribute.label.clone().unwrap_or_else(|| {
            let base = member_label(member, &settings.names);
            if class_prefix {
                format!("{}.{base}", declaring.short_name())
            } else {
                base
            }
        });

        let group_elements = layers.resolve(|o| o.group_elements).unwrap_or(true);
        let group = layers
            .resolve(|o| o.group.clone())
            .or_else(|| group_elements.then(|| declaring.short_name().to_string()));

        Self {
            label,
            position: layers
                .resolve(|o| o.position)
                .unwrap_or(settings.display.default_position),
            group,
            order: layers.resolve(|o| o.order).unwrap_or(0),
            color: layers.resolve(|o| o.color),
            font_size: layers.resolve(|o| o.font_size),
            indent: layers.resolve(|o| o.indent).unwrap_or(0),
            group_elements,
            format: layers.resolve(|o| o.format.clone()),
            rich_text: layers
                .resolve(|o| o.rich_text)
                .unwrap_or(settings.display.rich_text),
            enabled_by_default: attribute.enabled,
            tags: attribute.tags.clone(),
        }
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Computes a label from a member name: strips the first configured
/// variable prefix and, when enabled, humanizes the rest.
#[must_use]
pub fn member_label(name: &str, names: &NameSettings) -> String {
    let stripped = names
        .variable_prefixes
        .iter()
        .filter(|p| !p.is_empty())
        .find_map(|p| name.strip_prefix(p.as_str()).filter(|rest| !rest.is_empty()))
        .unwrap_or(name);
    if names.humanize {
        let label = humanize(stripped);
        if !label.is_empty() {
            return label;
        }
    }
    stripped.to_string()
}

/// Inserts spaces at case transitions and underscores and capitalizes
/// each word: `maxHealth` -> `Max Health`, `HTTPServer` -> `HTTP Server`.
#[must_use]
pub fn humanize(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    let mut word_start = true;
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == ' ' || c == '-' {
            word_start = true;
            continue;
        }
        if !word_start && i > 0 {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let lower_to_upper = prev.is_lowercase() && c.is_uppercase();
            let acronym_end =
                prev.is_uppercase() && c.is_uppercase() && next.is_some_and(char::is_lowercase);
            let letter_to_digit = prev.is_alphabetic() && c.is_ascii_digit();
            if lower_to_upper || acronym_end || letter_to_digit {
                word_start = true;
            }
        }
        if word_start {
            if !out.is_empty() {
                out.push(' ');
            }
            out.extend(c.to_uppercase());
            word_start = false;
        } else {
            out.push(c);
        }
    }
    out
}
