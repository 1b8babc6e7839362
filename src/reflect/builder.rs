//! Typed construction of [`TypeDescriptor`]s.
//!
//! Accessors are written against `&T` and compiled here, once, into the
//! erased closures stored on [`MemberDescriptor`]. Setters also take `&T`:
//! monitored objects are shared, so writable members use interior
//! mutability (atomics, `Mutex`, `RwLock`).

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::AccessError;
use crate::event::{Event, EventArgs, EventSource};
use crate::target::{downcast, TypeKey};
use crate::value::{MonitorValue, Value, ValueType};

use super::{
    EventAccessor, FormatOptions, Getter, Invoker, MemberAccess, MemberDescriptor, MethodOutput,
    MonitorAttribute, ParamDescriptor, Setter, TypeDescriptor, Visibility,
};

/// Builds the descriptor of `T`.
///
/// `.monitored(..)` and `.private()` apply to the member added last.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use livemon::reflect::{MonitorAttribute, TypeBuilder};
///
/// struct Door { open: AtomicI32 }
///
/// let descriptor = TypeBuilder::<Door>::new()
///     .writable_field(
///         "open",
///         |d: &Door| d.open.load(Ordering::Relaxed),
///         |d: &Door, v: i32| d.open.store(v, Ordering::Relaxed),
///     )
///     .monitored(MonitorAttribute::new().write_access())
///     .build();
///
/// assert_eq!(descriptor.members.len(), 1);
/// ```
pub struct TypeBuilder<T> {
    descriptor: TypeDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> Default for TypeBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Any + Send + Sync> TypeBuilder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: TypeDescriptor::contract(TypeKey::of::<T>()),
            _marker: PhantomData,
        }
    }

    /// Declares a base type whose members `T` inherits.
    #[must_use]
    pub fn extends<S: ?Sized + 'static>(self) -> Self {
        self.implements(TypeKey::of::<S>())
    }

    /// Declares a supertype by key, e.g. a virtual contract.
    #[must_use]
    pub fn implements(mut self, key: TypeKey) -> Self {
        if !self.descriptor.supertypes.contains(&key) {
            self.descriptor.supertypes.push(key);
        }
        self
    }

    /// Type-level options shared by every member.
    #[must_use]
    pub fn options(mut self, options: FormatOptions) -> Self {
        self.descriptor.options = Some(options);
        self
    }

    /// Read-only instance field.
    #[must_use]
    pub fn field<V: MonitorValue>(
        self,
        name: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
    ) -> Self {
        let access = MemberAccess::Field {
            get: instance_getter(name, move |t: &T| Ok(get(t))),
            set: None,
        };
        self.push(name, false, V::value_type(), access)
    }

    /// Instance field with a setter.
    #[must_use]
    pub fn writable_field<V: MonitorValue>(
        self,
        name: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&T, V) + Send + Sync + 'static,
    ) -> Self {
        let access = MemberAccess::Field {
            get: instance_getter(name, move |t: &T| Ok(get(t))),
            set: Some(instance_setter(name, set)),
        };
        self.push(name, false, V::value_type(), access)
    }

    /// Read-only instance property.
    #[must_use]
    pub fn property<V: MonitorValue>(
        self,
        name: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
    ) -> Self {
        self.try_property(name, move |t: &T| Ok(get(t)))
    }

    /// Instance property whose getter can fail.
    #[must_use]
    pub fn try_property<V: MonitorValue>(
        self,
        name: &str,
        get: impl Fn(&T) -> Result<V, AccessError> + Send + Sync + 'static,
    ) -> Self {
        let access = MemberAccess::Property {
            get: Some(instance_getter(name, get)),
            set: None,
        };
        self.push(name, false, V::value_type(), access)
    }

    /// Read-write instance property.
    #[must_use]
    pub fn property_rw<V: MonitorValue>(
        self,
        name: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&T, V) + Send + Sync + 'static,
    ) -> Self {
        let access = MemberAccess::Property {
            get: Some(instance_getter(name, move |t: &T| Ok(get(t)))),
            set: Some(instance_setter(name, set)),
        };
        self.push(name, false, V::value_type(), access)
    }

    /// Instance property without a getter.
    #[must_use]
    pub fn write_only_property<V: MonitorValue>(
        self,
        name: &str,
        set: impl Fn(&T, V) + Send + Sync + 'static,
    ) -> Self {
        let access = MemberAccess::Property {
            get: None,
            set: Some(instance_setter(name, set)),
        };
        self.push(name, false, V::value_type(), access)
    }

    /// Read-only static field.
    #[must_use]
    pub fn static_field<V: MonitorValue>(self, name: &str, get: impl Fn() -> V + Send + Sync + 'static) -> Self {
        let access = MemberAccess::Field {
            get: static_getter(get),
            set: None,
        };
        self.push(name, true, V::value_type(), access)
    }

    /// Read-only static property.
    #[must_use]
    pub fn static_property<V: MonitorValue>(
        self,
        name: &str,
        get: impl Fn() -> V + Send + Sync + 'static,
    ) -> Self {
        let access = MemberAccess::Property {
            get: Some(static_getter(get)),
            set: None,
        };
        self.push(name, true, V::value_type(), access)
    }

    /// Read-write static property.
    #[must_use]
    pub fn static_property_rw<V: MonitorValue>(
        self,
        name: &str,
        get: impl Fn() -> V + Send + Sync + 'static,
        set: impl Fn(V) + Send + Sync + 'static,
    ) -> Self {
        let member = name.to_string();
        let write = setter(move |_view, value| {
            set(convert::<V>(&member, value)?);
            Ok(())
        });
        let access = MemberAccess::Property {
            get: Some(static_getter(get)),
            set: Some(write),
        };
        self.push(name, true, V::value_type(), access)
    }

    /// Instance event.
    #[must_use]
    pub fn event<A: EventArgs>(self, name: &str, get: fn(&T) -> &Event<A>) -> Self {
        let member = name.to_string();
        let source = event_accessor(move |view| {
            let target = downcast::<T>(view, &member)?;
            let source: &dyn EventSource = get(target);
            Ok(source)
        });
        self.push(name, false, ValueType::Delegate(A::signature()), MemberAccess::Event { source })
    }

    /// Static event, usually a `static` item.
    #[must_use]
    pub fn static_event<A: EventArgs>(self, name: &str, get: fn() -> &'static Event<A>) -> Self {
        let source = event_accessor(move |_view| {
            let source: &dyn EventSource = get();
            Ok(source)
        });
        self.push(name, true, ValueType::Delegate(A::signature()), MemberAccess::Event { source })
    }

    /// Zero-argument instance method.
    #[must_use]
    pub fn method<R: MonitorValue>(self, name: &str, f: impl Fn(&T) -> R + Send + Sync + 'static) -> Self {
        let member = name.to_string();
        let invoke = invoker(move |view, args| {
            expect_args(&member, args, 0)?;
            let target = downcast::<T>(view, &member)?;
            Ok(MethodOutput::returning(f(target).to_value()))
        });
        self.push(name, false, R::value_type(), MemberAccess::Method { invoke, params: Vec::new() })
    }

    /// One-argument instance method. Monitored calls take the argument from
    /// [`MonitorAttribute::arguments`].
    #[must_use]
    pub fn method_with<P: MonitorValue, R: MonitorValue>(
        self,
        name: &str,
        param: &str,
        f: impl Fn(&T, P) -> R + Send + Sync + 'static,
    ) -> Self {
        let member = name.to_string();
        let invoke = invoker(move |view, args| {
            expect_args(&member, args, 1)?;
            let target = downcast::<T>(view, &member)?;
            let arg = convert::<P>(&member, &args[0])?;
            Ok(MethodOutput::returning(f(target, arg).to_value()))
        });
        let params = vec![ParamDescriptor::input(param, P::value_type())];
        self.push(name, false, R::value_type(), MemberAccess::Method { invoke, params })
    }

    /// Instance method with one out-parameter, returned as the second tuple
    /// element.
    #[must_use]
    pub fn method_with_out<R: MonitorValue, O: MonitorValue>(
        self,
        name: &str,
        out: &str,
        f: impl Fn(&T) -> (R, O) + Send + Sync + 'static,
    ) -> Self {
        let member = name.to_string();
        let invoke = invoker(move |view, args| {
            expect_args(&member, args, 0)?;
            let target = downcast::<T>(view, &member)?;
            let (ret, out) = f(target);
            Ok(MethodOutput {
                ret: ret.to_value(),
                outs: vec![out.to_value()],
            })
        });
        let params = vec![ParamDescriptor::output(out, O::value_type())];
        self.push(name, false, R::value_type(), MemberAccess::Method { invoke, params })
    }

    /// Zero-argument static method.
    #[must_use]
    pub fn static_method<R: MonitorValue>(self, name: &str, f: impl Fn() -> R + Send + Sync + 'static) -> Self {
        let member = name.to_string();
        let invoke = invoker(move |_view, args| {
            expect_args(&member, args, 0)?;
            Ok(MethodOutput::returning(f().to_value()))
        });
        self.push(name, true, R::value_type(), MemberAccess::Method { invoke, params: Vec::new() })
    }

    /// Static `(V) -> String` method usable as a named value processor.
    #[must_use]
    pub fn processor<V: MonitorValue>(self, name: &str, f: fn(&V) -> String) -> Self {
        let member = name.to_string();
        let invoke = invoker(move |_view, args| {
            expect_args(&member, args, 1)?;
            let value = convert::<V>(&member, &args[0])?;
            Ok(MethodOutput::returning(Value::Str(f(&value))))
        });
        let params = vec![ParamDescriptor::input("value", V::value_type())];
        self.push(name, true, ValueType::Str, MemberAccess::Method { invoke, params })
    }

    /// Method with an arbitrary parameter list and a hand-written invoker.
    ///
    /// Needed for shapes the typed helpers cannot express, such as
    /// out-parameters of stack-only types that the invoker renders itself.
    #[must_use]
    pub fn method_raw(
        self,
        name: &str,
        is_static: bool,
        return_type: ValueType,
        params: Vec<ParamDescriptor>,
        invoke: Invoker,
    ) -> Self {
        self.push(name, is_static, return_type, MemberAccess::Method { invoke, params })
    }

    /// Adds a prebuilt member.
    #[must_use]
    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.descriptor.members.push(member);
        self
    }

    /// Marks the last added member as monitored.
    #[must_use]
    pub fn monitored(mut self, attribute: MonitorAttribute) -> Self {
        if let Some(member) = self.descriptor.members.last_mut() {
            member.monitor = Some(attribute);
        }
        self
    }

    /// Marks the last added member as private.
    #[must_use]
    pub fn private(mut self) -> Self {
        if let Some(member) = self.descriptor.members.last_mut() {
            member.visibility = Visibility::Private;
        }
        self
    }

    #[must_use]
    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }

    fn push(mut self, name: &str, is_static: bool, value_type: ValueType, access: MemberAccess) -> Self {
        self.descriptor.members.push(MemberDescriptor {
            name: name.to_string(),
            is_static,
            visibility: Visibility::Public,
            value_type,
            access,
            monitor: None,
        });
        self
    }
}

fn instance_getter<T: Any, V: MonitorValue>(
    name: &str,
    get: impl Fn(&T) -> Result<V, AccessError> + Send + Sync + 'static,
) -> Getter {
    let member = name.to_string();
    getter(move |view| {
        let target = downcast::<T>(view, &member)?;
        get(target).map(|v| v.to_value())
    })
}

fn static_getter<V: MonitorValue>(get: impl Fn() -> V + Send + Sync + 'static) -> Getter {
    getter(move |_view| Ok(get().to_value()))
}

fn instance_setter<T: Any, V: MonitorValue>(name: &str, set: impl Fn(&T, V) + Send + Sync + 'static) -> Setter {
    let member = name.to_string();
    setter(move |view, value| {
        let target = downcast::<T>(view, &member)?;
        set(target, convert::<V>(&member, value)?);
        Ok(())
    })
}

fn getter(
    f: impl Fn(Option<&dyn Any>) -> Result<Value, AccessError> + Send + Sync + 'static,
) -> Getter {
    Arc::new(f)
}

fn setter(
    f: impl Fn(Option<&dyn Any>, &Value) -> Result<(), AccessError> + Send + Sync + 'static,
) -> Setter {
    Arc::new(f)
}

/// Wraps a hand-written invocation closure as an [`Invoker`].
pub fn invoker(
    f: impl Fn(Option<&dyn Any>, &[Value]) -> Result<MethodOutput, AccessError> + Send + Sync + 'static,
) -> Invoker {
    Arc::new(f)
}

fn event_accessor<F>(f: F) -> EventAccessor
where
    F: for<'a> Fn(Option<&'a dyn Any>) -> Result<&'a dyn EventSource, AccessError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn convert<V: MonitorValue>(member: &str, value: &Value) -> Result<V, AccessError> {
    V::from_value(value).ok_or_else(|| AccessError::TypeMismatch {
        member: member.to_string(),
        expected: V::value_type().to_string(),
        actual: value.type_name().to_string(),
    })
}

fn expect_args(member: &str, args: &[Value], expected: usize) -> Result<(), AccessError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(AccessError::ArgumentCount {
            member: member.to_string(),
            expected,
            actual: args.len(),
        })
    }
}
