//! Attribute vocabulary attached to monitored members and types.
//!
//! The vocabulary is closed: a member is either monitored or not, and a
//! monitored member carries format options, an optional show-if condition,
//! an optional update event, an optional value processor, a visibility
//! default, tags and write access.

use serde::{Deserialize, Serialize};

use crate::value::{Color, Value};

/// Screen corner an overlay line is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiPosition {
    #[default]
    UpperLeft,
    UpperRight,
    LowerLeft,
    LowerRight,
}

/// Presentational options.
///
/// Used both per member (inside [`MonitorAttribute`]) and per type as the
/// aggregate options attribute. Every field is optional; unset fields fall
/// through to the next layer.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatOptions {
    pub position: Option<UiPosition>,
    pub group: Option<String>,
    pub order: Option<i32>,
    pub color: Option<Color>,
    pub font_size: Option<u32>,
    pub indent: Option<u32>,
    pub group_elements: Option<bool>,
    /// Number format overriding the process-wide default for this value type.
    pub format: Option<String>,
    pub rich_text: Option<bool>,
    pub class_name_prefix: Option<bool>,
}

impl FormatOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn position(mut self, position: UiPosition) -> Self {
        self.position = Some(position);
        self
    }

    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    #[must_use]
    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    #[must_use]
    pub fn font_size(mut self, size: u32) -> Self {
        self.font_size = Some(size);
        self
    }

    #[must_use]
    pub fn indent(mut self, indent: u32) -> Self {
        self.indent = Some(indent);
        self
    }

    #[must_use]
    pub fn group_elements(mut self, enabled: bool) -> Self {
        self.group_elements = Some(enabled);
        self
    }

    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    #[must_use]
    pub fn rich_text(mut self, enabled: bool) -> Self {
        self.rich_text = Some(enabled);
        self
    }

    #[must_use]
    pub fn class_name_prefix(mut self, enabled: bool) -> Self {
        self.class_name_prefix = Some(enabled);
        self
    }
}

/// Relational operators for [`ValidationMethod::Comparison`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Equals,
    NotEquals,
    Greater,
    GreaterOrEqual,
    Lesser,
    LesserOrEqual,
}

impl Comparison {
    /// True for operators that need an ordering rather than equality.
    #[must_use]
    pub const fn is_relational(self) -> bool {
        !matches!(self, Self::Equals | Self::NotEquals)
    }
}

/// Fixed show-if conditions evaluated against the member's own value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    True,
    False,
    Null,
    NotNull,
    Zero,
    NotZero,
    Negative,
    Positive,
    NotNullOrEmptyString,
    NotNullOrWhiteSpace,
    CollectionNotEmpty,
}

/// How a show-if condition decides visibility.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationMethod {
    /// A zero-argument bool field, property or method, static or instance.
    /// A method taking the member's value and returning bool is accepted too.
    ByMember(String),
    /// The member's value compared against a constant.
    Comparison {
        comparison: Comparison,
        other: Value,
    },
    Condition(Condition),
}

/// Show-if attribute.
///
/// `event` names an `Event<bool>` that toggles visibility; when it resolves
/// the handle is driven by that event and `method` only supplies the
/// initial state.
#[derive(Debug, Clone, PartialEq)]
pub struct ShowIf {
    pub method: Option<ValidationMethod>,
    pub event: Option<String>,
}

impl ShowIf {
    #[must_use]
    pub fn member(name: impl Into<String>) -> Self {
        Self {
            method: Some(ValidationMethod::ByMember(name.into())),
            event: None,
        }
    }

    #[must_use]
    pub fn compare(comparison: Comparison, other: Value) -> Self {
        Self {
            method: Some(ValidationMethod::Comparison { comparison, other }),
            event: None,
        }
    }

    #[must_use]
    pub const fn condition(condition: Condition) -> Self {
        Self {
            method: Some(ValidationMethod::Condition(condition)),
            event: None,
        }
    }

    /// Visibility driven by an event only, initially visible.
    #[must_use]
    pub fn event(name: impl Into<String>) -> Self {
        Self {
            method: None,
            event: Some(name.into()),
        }
    }

    #[must_use]
    pub fn with_event(mut self, name: impl Into<String>) -> Self {
        self.event = Some(name.into());
        self
    }
}

/// Marks a member as monitored and carries its metadata.
///
/// # Examples
///
/// ```
/// use livemon::reflect::{Condition, MonitorAttribute, ShowIf, UiPosition};
///
/// let attr = MonitorAttribute::new()
///     .label("HP")
///     .position(UiPosition::UpperRight)
///     .show_if(ShowIf::condition(Condition::Positive))
///     .tag("combat");
///
/// assert_eq!(attr.label.as_deref(), Some("HP"));
/// assert!(attr.enabled);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorAttribute {
    pub label: Option<String>,
    pub options: FormatOptions,
    pub show_if: Option<ShowIf>,
    /// Event the member raises when its value changes. Replaces polling.
    pub update_event: Option<String>,
    /// Static `(T) -> String` method on the declaring type.
    pub value_processor: Option<String>,
    /// Visibility when the handle is created.
    pub enabled: bool,
    pub tags: Vec<String>,
    /// Allow `set_value` on writable members.
    pub write_access: bool,
    /// Arguments passed to a monitored method with in-parameters.
    pub arguments: Vec<Value>,
}

impl Default for MonitorAttribute {
    fn default() -> Self {
        Self {
            label: None,
            options: FormatOptions::default(),
            show_if: None,
            update_event: None,
            value_processor: None,
            enabled: true,
            tags: Vec::new(),
            write_access: false,
            arguments: Vec::new(),
        }
    }
}

impl MonitorAttribute {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn options(mut self, options: FormatOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn position(mut self, position: UiPosition) -> Self {
        self.options.position = Some(position);
        self
    }

    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.options.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn order(mut self, order: i32) -> Self {
        self.options.order = Some(order);
        self
    }

    #[must_use]
    pub fn color(mut self, color: Color) -> Self {
        self.options.color = Some(color);
        self
    }

    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.options.format = Some(format.into());
        self
    }

    #[must_use]
    pub fn show_if(mut self, show_if: ShowIf) -> Self {
        self.show_if = Some(show_if);
        self
    }

    #[must_use]
    pub fn update_event(mut self, event: impl Into<String>) -> Self {
        self.update_event = Some(event.into());
        self
    }

    #[must_use]
    pub fn value_processor(mut self, method: impl Into<String>) -> Self {
        self.value_processor = Some(method.into());
        self
    }

    /// Starts hidden until enabled by a validator or the API.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn write_access(mut self) -> Self {
        self.write_access = true;
        self
    }

    #[must_use]
    pub fn arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_defaults() {
        let attr = MonitorAttribute::new();
        assert!(attr.enabled);
        assert!(!attr.write_access);
        assert!(attr.show_if.is_none());
        assert_eq!(attr.options, FormatOptions::default());
    }

    #[test]
    fn test_attribute_builder_sets_options() {
        let attr = MonitorAttribute::new()
            .group("Stats")
            .order(3)
            .format("F1")
            .disabled()
            .tag("a")
            .tag("b");
        assert_eq!(attr.options.group.as_deref(), Some("Stats"));
        assert_eq!(attr.options.order, Some(3));
        assert_eq!(attr.options.format.as_deref(), Some("F1"));
        assert!(!attr.enabled);
        assert_eq!(attr.tags, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_show_if_constructors() {
        let s = ShowIf::member("IsAlive").with_event("AliveChanged");
        assert_eq!(s.method, Some(ValidationMethod::ByMember("IsAlive".into())));
        assert_eq!(s.event.as_deref(), Some("AliveChanged"));
        assert!(ShowIf::event("Toggled").method.is_none());
        assert!(Comparison::Greater.is_relational());
        assert!(!Comparison::NotEquals.is_relational());
    }

    #[test]
    fn test_position_ordering() {
        assert!(UiPosition::UpperLeft < UiPosition::LowerRight);
        assert_eq!(UiPosition::default(), UiPosition::UpperLeft);
    }
}
