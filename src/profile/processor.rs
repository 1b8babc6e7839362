//! Value processors: compiled `value -> display string` functions.
//!
//! Resolution order, first match wins:
//! 1. a named static `(T) -> String` method on the declaring type or its
//!    supertypes,
//! 2. the built-in body for the declared value type,
//! 3. the generic fallback using the value's `Display`.
//!
//! Processors append `"{label}: {value}"` to a caller-owned buffer so a
//! handle can reuse one `String` for every refresh.

use std::fmt::{self, Write};
use std::sync::Arc;

use crate::error::{AccessError, ResolveError};
use crate::logging::log_at;
use crate::reflect::{MemberAccess, TypeIndex};
use crate::settings::{MonitorSettings, Palette};
use crate::target::TypeKey;
use crate::value::{Color, Value, ValueType};

use super::format::FormatData;
use super::number_format::NumberFormat;

type ProcessFn = dyn Fn(&Value, &mut String) -> Result<(), AccessError> + Send + Sync;

/// Where a processor came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorSource {
    /// A named method, by name.
    Named(String),
    BuiltIn,
    Generic,
}

/// A compiled value formatter.
#[derive(Clone)]
pub struct ValueProcessor {
    func: Arc<ProcessFn>,
    source: ProcessorSource,
}

impl ValueProcessor {
    fn new(
        source: ProcessorSource,
        func: impl Fn(&Value, &mut String) -> Result<(), AccessError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            func: Arc::new(func),
            source,
        }
    }

    /// Appends the formatted value to `out`.
    pub fn process_into(&self, value: &Value, out: &mut String) -> Result<(), AccessError> {
        (self.func)(value, out)
    }

    /// Formats into a new string.
    pub fn process(&self, value: &Value) -> Result<String, AccessError> {
        let mut out = String::new();
        self.process_into(value, &mut out)?;
        Ok(out)
    }

    #[must_use]
    pub const fn source(&self) -> &ProcessorSource {
        &self.source
    }
}

impl fmt::Debug for ValueProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueProcessor")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Resolves the processor of a monitored member.
#[must_use]
pub fn create_processor(
    index: &TypeIndex,
    declaring: &TypeKey,
    member: &str,
    value_type: &ValueType,
    format: &FormatData,
    named: Option<&str>,
    settings: &MonitorSettings,
) -> ValueProcessor {
    if let Some(name) = named {
        match resolve_named(index, declaring, name, value_type, &format.label) {
            Ok(processor) => return processor,
            Err(err) => {
                let severity = match err {
                    ResolveError::MemberNotFound { .. } => settings.logging.processor_not_found,
                    _ => settings.logging.invalid_processor_signature,
                };
                log_at!(
                    severity,
                    declaring = %declaring,
                    member = member,
                    processor = name,
                    error = %err,
                    "value processor unavailable, using default"
                );
            }
        }
    }
    let number_format = format
        .format
        .as_deref()
        .and_then(|f| match NumberFormat::parse(f) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                log_at!(
                    settings.logging.invalid_format,
                    declaring = %declaring,
                    member = member,
                    error = %err,
                    "ignoring member number format"
                );
                None
            }
        });
    labelled(&format.label, value_type, number_format, format.rich_text, settings)
}

/// Processor for a method out-parameter or other secondary value.
///
/// Stack-only shapes have no built-in body and are rendered through the
/// erased generic path.
#[must_use]
pub fn create_element_processor(label: &str, value_type: &ValueType, settings: &MonitorSettings) -> ValueProcessor {
    labelled(label, value_type, None, settings.display.rich_text, settings)
}

fn labelled(
    label: &str,
    value_type: &ValueType,
    number_format: Option<NumberFormat>,
    rich_text: bool,
    settings: &MonitorSettings,
) -> ValueProcessor {
    let label = label.to_string();
    if *value_type == ValueType::Unit {
        return ValueProcessor::new(ProcessorSource::BuiltIn, move |_, out| {
            out.push_str(&label);
            Ok(())
        });
    }
    let style = Style::from_settings(settings, rich_text);
    match Shape::for_type(value_type, number_format, settings) {
        Some(shape) => ValueProcessor::new(ProcessorSource::BuiltIn, move |value, out| {
            out.push_str(&label);
            out.push_str(": ");
            shape.write(&style, value, out);
            Ok(())
        }),
        None => ValueProcessor::new(ProcessorSource::Generic, move |value, out| {
            out.push_str(&label);
            out.push_str(": ");
            if value.is_null() {
                style.write_null(out);
            } else {
                let _ = write!(out, "{value}");
            }
            Ok(())
        }),
    }
}

fn resolve_named(
    index: &TypeIndex,
    declaring: &TypeKey,
    name: &str,
    value_type: &ValueType,
    label: &str,
) -> Result<ValueProcessor, ResolveError> {
    let (owner, member) = index
        .find_member(declaring, name)
        .ok_or_else(|| ResolveError::MemberNotFound {
            type_name: declaring.to_string(),
            member: name.to_string(),
        })?;
    let invalid = || ResolveError::InvalidSignature {
        type_name: owner.key.to_string(),
        member: name.to_string(),
        expected: format!("static fn({value_type}) -> string"),
    };
    let MemberAccess::Method { invoke, params } = &member.access else {
        return Err(invalid());
    };
    let signature_ok = member.is_static
        && member.value_type == ValueType::Str
        && params.len() == 1
        && !params[0].is_out
        && params[0].value_type == *value_type;
    if !signature_ok {
        return Err(invalid());
    }

    let invoke = Arc::clone(invoke);
    let label = label.to_string();
    Ok(ValueProcessor::new(
        ProcessorSource::Named(name.to_string()),
        move |value, out| {
            let output = invoke(None, std::slice::from_ref(value))?;
            out.push_str(&label);
            out.push_str(": ");
            match output.ret {
                Value::Str(text) => out.push_str(&text),
                other => {
                    let _ = write!(out, "{other}");
                }
            }
            Ok(())
        },
    ))
}

/// Rendering switches shared by every body.
#[derive(Debug, Clone)]
struct Style {
    rich: bool,
    palette: Palette,
    null_text: String,
    max_elements: usize,
}

impl Style {
    fn from_settings(settings: &MonitorSettings, rich: bool) -> Self {
        Self {
            rich,
            palette: settings.palette.clone(),
            null_text: settings.display.null_text.clone(),
            max_elements: settings.display.max_collection_elements,
        }
    }

    fn open(&self, out: &mut String, color: Color) {
        if self.rich {
            let _ = write!(out, "<color={color}>");
        }
    }

    fn close(&self, out: &mut String) {
        if self.rich {
            out.push_str("</color>");
        }
    }

    fn write_null(&self, out: &mut String) {
        self.open(out, self.palette.null_color);
        out.push_str(&self.null_text);
        self.close(out);
    }
}

/// Built-in body of one value type.
#[derive(Debug, Clone)]
enum Shape {
    Bool,
    Integer(NumberFormat),
    Float { format: NumberFormat, single: bool },
    Text,
    Vector(NumberFormat),
    Color,
    Enum,
    Collection(Box<Shape>),
    Display,
}

impl Shape {
    fn for_type(value_type: &ValueType, over: Option<NumberFormat>, settings: &MonitorSettings) -> Option<Self> {
        let formats = &settings.formats;
        let pick = |default: &str| over.unwrap_or_else(|| NumberFormat::parse(default).unwrap_or_default());
        Some(match value_type {
            ValueType::Bool => Self::Bool,
            t if t.is_integer() => Self::Integer(pick(&formats.integer)),
            ValueType::F32 => Self::Float {
                format: pick(&formats.float),
                single: true,
            },
            ValueType::F64 => Self::Float {
                format: pick(&formats.double),
                single: false,
            },
            ValueType::Str => Self::Text,
            ValueType::Vector2 | ValueType::Vector3 | ValueType::Vector4 => Self::Vector(pick(&formats.vector)),
            ValueType::Quaternion => Self::Vector(pick(&formats.quaternion)),
            ValueType::Color => Self::Color,
            ValueType::Enum(_) => Self::Enum,
            ValueType::Nullable(inner) => return Self::for_type(inner, over, settings),
            ValueType::Collection(inner) => Self::Collection(Box::new(
                Self::for_type(inner, over, settings).unwrap_or(Self::Display),
            )),
            _ => return None,
        })
    }

    fn write(&self, style: &Style, value: &Value, out: &mut String) {
        match (self, value) {
            (_, Value::Null) => style.write_null(out),
            (Self::Bool, Value::Bool(b)) => {
                style.open(out, if *b { style.palette.true_color } else { style.palette.false_color });
                out.push_str(if *b { "true" } else { "false" });
                style.close(out);
            }
            (Self::Integer(f), Value::Int(v)) => f.write_int(*v, out),
            (Self::Integer(f), Value::UInt(v)) => f.write_uint(*v, out),
            (Self::Float { format, single }, v) if v.is_numeric() => {
                format.write_float(v.as_f64().unwrap_or_default(), *single, out);
            }
            (Self::Text, Value::Str(s)) => out.push_str(s),
            (Self::Vector(f), Value::Vector2(c)) => write_components(style, *f, c, out),
            (Self::Vector(f), Value::Vector3(c)) => write_components(style, *f, c, out),
            (Self::Vector(f), Value::Vector4(c) | Value::Quaternion(c)) => write_components(style, *f, c, out),
            (Self::Color, Value::Color(c)) => {
                style.open(out, *c);
                let _ = write!(out, "{c}");
                style.close(out);
            }
            (Self::Enum, Value::Enum { variant, .. }) => out.push_str(variant),
            (Self::Collection(element), Value::Collection(items)) => {
                let _ = write!(out, "[{}]", items.len());
                for item in items.iter().take(style.max_elements) {
                    out.push_str("\n  ");
                    element.write(style, item, out);
                }
                if items.len() > style.max_elements {
                    out.push_str("\n  ...");
                }
            }
            (_, v) => {
                let _ = write!(out, "{v}");
            }
        }
    }
}

fn write_components(style: &Style, format: NumberFormat, components: &[f32], out: &mut String) {
    let colors = [
        style.palette.x_color,
        style.palette.y_color,
        style.palette.z_color,
        style.palette.w_color,
    ];
    out.push('(');
    for (i, (c, color)) in components.iter().zip(colors).enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        style.open(out, color);
        format.write_float(f64::from(*c), true, out);
        style.close(out);
    }
    out.push(')');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{MonitorAttribute, TypeBuilder};

    struct Gauge {
        level: i32,
    }

    fn plain_settings() -> MonitorSettings {
        let mut settings = MonitorSettings::default();
        settings.display.rich_text = false;
        settings.logging = crate::settings::LoggingSettings::silent();
        settings
    }

    fn format_data(label: &str, settings: &MonitorSettings) -> FormatData {
        FormatData::resolve(
            &TypeKey::of::<Gauge>(),
            None,
            label,
            &MonitorAttribute::new().label(label),
            settings,
        )
    }

    fn index() -> TypeIndex {
        let mut index = TypeIndex::new();
        index.insert(
            TypeBuilder::<Gauge>::new()
                .field("level", |g: &Gauge| g.level)
                .processor("FormatLevel", |v: &i32| format!("lvl {v}"))
                .processor("FormatText", |v: &String| v.to_uppercase())
                .method("NotStatic", |g: &Gauge| g.level.to_string())
                .build(),
        );
        index
    }

    fn process(processor: &ValueProcessor, value: &Value) -> String {
        processor.process(value).unwrap()
    }

    #[test]
    fn test_named_processor_used() {
        let settings = plain_settings();
        let p = create_processor(
            &index(),
            &TypeKey::of::<Gauge>(),
            "level",
            &ValueType::I32,
            &format_data("Level", &settings),
            Some("FormatLevel"),
            &settings,
        );
        assert_eq!(p.source(), &ProcessorSource::Named("FormatLevel".into()));
        assert_eq!(process(&p, &Value::Int(4)), "Level: lvl 4");
    }

    #[test]
    fn test_missing_named_processor_falls_back() {
        let settings = plain_settings();
        let p = create_processor(
            &index(),
            &TypeKey::of::<Gauge>(),
            "level",
            &ValueType::I32,
            &format_data("Level", &settings),
            Some("DoesNotExist"),
            &settings,
        );
        assert_eq!(p.source(), &ProcessorSource::BuiltIn);
        assert_eq!(process(&p, &Value::Int(4)), "Level: 4");
    }

    #[test]
    fn test_wrong_signature_falls_back() {
        let settings = plain_settings();
        for name in ["FormatText", "NotStatic", "level"] {
            let p = create_processor(
                &index(),
                &TypeKey::of::<Gauge>(),
                "level",
                &ValueType::I32,
                &format_data("Level", &settings),
                Some(name),
                &settings,
            );
            assert_eq!(p.source(), &ProcessorSource::BuiltIn, "{name}");
        }
    }

    #[test]
    fn test_builtin_numbers_use_settings_formats() {
        let settings = plain_settings();
        let data = format_data("Speed", &settings);
        let p = create_processor(&index(), &TypeKey::of::<Gauge>(), "speed", &ValueType::F32, &data, None, &settings);
        assert_eq!(process(&p, &Value::Float(1.234)), "Speed: 1.23");

        let mut data = format_data("Speed", &settings);
        data.format = Some("F0".into());
        let p = create_processor(&index(), &TypeKey::of::<Gauge>(), "speed", &ValueType::F64, &data, None, &settings);
        assert_eq!(process(&p, &Value::Float(9.7)), "Speed: 10");
    }

    #[test]
    fn test_invalid_member_format_uses_default() {
        let settings = plain_settings();
        let mut data = format_data("Speed", &settings);
        data.format = Some("bogus!".into());
        let p = create_processor(&index(), &TypeKey::of::<Gauge>(), "speed", &ValueType::F64, &data, None, &settings);
        assert_eq!(process(&p, &Value::Float(2.0)), "Speed: 2.00");
    }

    #[test]
    fn test_bool_colorized() {
        let settings = MonitorSettings::default();
        let data = format_data("Alive", &settings);
        let p = create_processor(&index(), &TypeKey::of::<Gauge>(), "alive", &ValueType::Bool, &data, None, &settings);
        assert_eq!(
            process(&p, &Value::Bool(true)),
            format!("Alive: <color={}>true</color>", settings.palette.true_color)
        );
        let plain = plain_settings();
        let data = format_data("Alive", &plain);
        let p = create_processor(&index(), &TypeKey::of::<Gauge>(), "alive", &ValueType::Bool, &data, None, &plain);
        assert_eq!(process(&p, &Value::Bool(false)), "Alive: false");
    }

    #[test]
    fn test_vector_components() {
        let settings = plain_settings();
        let data = format_data("Pos", &settings);
        let p = create_processor(&index(), &TypeKey::of::<Gauge>(), "pos", &ValueType::Vector3, &data, None, &settings);
        assert_eq!(process(&p, &Value::Vector3([1.0, 2.5, -3.0])), "Pos: (1.00, 2.50, -3.00)");
    }

    #[test]
    fn test_collection_lists_elements() {
        let mut settings = plain_settings();
        settings.display.max_collection_elements = 2;
        let data = format_data("Items", &settings);
        let vt = ValueType::Collection(Box::new(ValueType::Str));
        let p = create_processor(&index(), &TypeKey::of::<Gauge>(), "items", &vt, &data, None, &settings);
        let value = Value::Collection(vec![
            Value::Str("sword".into()),
            Value::Str("shield".into()),
            Value::Str("potion".into()),
        ]);
        assert_eq!(process(&p, &value), "Items: [3]\n  sword\n  shield\n  ...");
    }

    #[test]
    fn test_null_and_enum() {
        let settings = plain_settings();
        let data = format_data("Target", &settings);
        let vt = ValueType::Nullable(Box::new(ValueType::I32));
        let p = create_processor(&index(), &TypeKey::of::<Gauge>(), "target", &vt, &data, None, &settings);
        assert_eq!(process(&p, &Value::Null), "Target: null");
        assert_eq!(process(&p, &Value::Int(3)), "Target: 3");

        let vt = ValueType::Enum("Stance".into());
        let p = create_processor(&index(), &TypeKey::of::<Gauge>(), "stance", &vt, &data, None, &settings);
        let value = Value::Enum {
            type_name: "Stance".into(),
            variant: "Crouched".into(),
        };
        assert_eq!(process(&p, &value), "Target: Crouched");
    }

    #[test]
    fn test_generic_and_element_processors() {
        let settings = plain_settings();
        let data = format_data("Owner", &settings);
        let vt = ValueType::Object("Entity".into());
        let p = create_processor(&index(), &TypeKey::of::<Gauge>(), "owner", &vt, &data, None, &settings);
        assert_eq!(p.source(), &ProcessorSource::Generic);
        assert_eq!(process(&p, &Value::Object("Entity#7".into())), "Owner: Entity#7");

        let span = create_element_processor("Span", &ValueType::ByRefLike("Span".into()), &settings);
        assert_eq!(span.source(), &ProcessorSource::Generic);
        assert_eq!(process(&span, &Value::Object("[1, 2]".into())), "Span: [1, 2]");

        let unit = create_element_processor("Reset", &ValueType::Unit, &settings);
        assert_eq!(process(&unit, &Value::Null), "Reset");
    }
}
