#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

use std::{
    error::Error,
    fmt::{self, Display},
    sync::Arc,
};

use facet_core::{Def, Facet, Type, UserType};

mod codec;
mod convert;
mod descriptor;
mod deferred;
mod map;
mod serialize;

pub use codec::{FallbackCodec, ScalarCodec};
pub use deferred::{DeferredResolver, clear_resolver, install_resolver};
pub use descriptor::{FieldDescriptor, TypeDescriptor, describe};
pub use map::{ConvertedMap, Value};

// Re-export the reflection types that appear in this crate's public
// signatures, so resolvers and codecs can be written against this crate
// alone.
pub use facet_core::Shape;
pub use facet_reflect::{Partial, Peek, ReflectError};

use codec::default_codec;
use convert::ConvertCtx;

/// The recursion budget for a single conversion.
///
/// Every descent into a nested record, sequence or map consumes one unit;
/// when the budget runs out that branch is abandoned with a warning. This is
/// the sole cycle guard; identity-based cycle detection is deliberately not
/// performed.
pub const DEPTH_LIMIT: usize = 50;

/// Error type for conversion operations.
#[derive(Debug)]
pub struct ConvertError {
    kind: ConvertErrorKind,
}

impl ConvertError {
    /// Returns a reference to the error kind for detailed error inspection.
    pub fn kind(&self) -> &ConvertErrorKind {
        &self.kind
    }

    /// The error a [`FallbackCodec`] reports when it cannot convert a value
    /// into `target`.
    pub fn unconvertible(target: &'static Shape) -> Self {
        ConvertErrorKind::Unconvertible { target }.into()
    }
}

impl Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = &self.kind;
        write!(f, "{kind}")
    }
}
impl Error for ConvertError {}

impl<K: Into<ConvertErrorKind>> From<K> for ConvertError {
    fn from(value: K) -> Self {
        let kind = value.into();
        ConvertError { kind }
    }
}

/// Detailed classification of conversion errors.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConvertErrorKind {
    /// Error from the reflection system while reading or building a value.
    Reflect(ReflectError),
    /// The requested target is a bare container type; conversion must land
    /// in a structured record type.
    ContainerTarget(&'static Shape),
    /// `overwrite` was called with mismatched concrete types.
    ShapeMismatch {
        /// The base value's shape.
        expected: &'static Shape,
        /// The source value's shape.
        actual: &'static Shape,
    },
    /// No enum variant matches the given name.
    NoSuchVariant {
        /// The name that failed to match.
        name: String,
        /// The enum shape searched.
        shape: &'static Shape,
    },
    /// The value cannot be converted into the target shape.
    Unconvertible {
        /// The shape that rejected the value.
        target: &'static Shape,
    },
    /// The recursion budget ran out; the graph is cyclic or too deep.
    DepthExceeded,
}

impl Display for ConvertErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertErrorKind::Reflect(reflect_error) => write!(f, "{reflect_error}"),
            ConvertErrorKind::ContainerTarget(shape) => {
                write!(
                    f,
                    "direct conversion into the container type {shape} is not supported; use a wrapper struct"
                )
            }
            ConvertErrorKind::ShapeMismatch { expected, actual } => {
                write!(
                    f,
                    "base and source must be the same concrete type (base: {expected}, source: {actual})"
                )
            }
            ConvertErrorKind::NoSuchVariant { name, shape } => {
                write!(f, "no variant '{name}' in {shape}")
            }
            ConvertErrorKind::Unconvertible { target } => {
                write!(f, "value cannot be converted into {target}")
            }
            ConvertErrorKind::DepthExceeded => {
                write!(
                    f,
                    "too many nested values; check for circular references in the source graph"
                )
            }
        }
    }
}

impl From<ReflectError> for ConvertErrorKind {
    fn from(value: ReflectError) -> Self {
        Self::Reflect(value)
    }
}

/// Starts a conversion from `value` with the lazy-safe unwrap policy:
/// unresolved deferred references are treated as null rather than forced.
pub fn from<'mem, T: Facet<'mem>>(value: &'mem T) -> Converter<'mem> {
    Converter {
        peek: Peek::new(value),
        eager: false,
        codec: default_codec(),
    }
}

/// Starts a conversion from `value` with the eager unwrap policy: unresolved
/// deferred references are forced to resolve, which may block on whatever
/// backs them.
pub fn from_eager<'mem, T: Facet<'mem>>(value: &'mem T) -> Converter<'mem> {
    Converter {
        peek: Peek::new(value),
        eager: true,
        codec: default_codec(),
    }
}

/// A conversion handle over a borrowed source value.
///
/// Created by [`from`] or [`from_eager`]; the terminal operations are
/// [`Converter::to`], [`Converter::to_map`] and [`Converter::overwrite`].
pub struct Converter<'mem> {
    peek: Peek<'mem, 'mem>,
    eager: bool,
    codec: Arc<dyn FallbackCodec>,
}

impl<'mem> Converter<'mem> {
    /// Replaces the fallback codec consulted for value/target pairs the
    /// structural engine does not handle natively.
    pub fn with_codec(mut self, codec: Arc<dyn FallbackCodec>) -> Self {
        self.codec = codec;
        self
    }

    fn ctx(&self) -> ConvertCtx {
        ConvertCtx {
            eager: self.eager,
            codec: self.codec.clone(),
        }
    }

    /// Builds an instance of `T` from the source value, matching fields by
    /// name and converting recursively.
    ///
    /// The result is best-effort: per-field failures are logged and leave
    /// the field at its default. `None` is returned when the target type
    /// itself cannot be built: a bare container target, a missing default
    /// for an unfilled field, or an unexpected reflection error.
    pub fn to<T: Facet<'mem>>(&self) -> Option<T> {
        let shape = T::SHAPE;
        if matches!(
            shape.def,
            Def::List(_) | Def::Map(_) | Def::Set(_) | Def::Array(_) | Def::Slice(_)
        ) {
            let error = ConvertError::from(ConvertErrorKind::ContainerTarget(shape));
            log::error!("{error}");
            return None;
        }

        let ctx = self.ctx();
        match shape.ty {
            Type::User(UserType::Struct(_)) => {
                let view = convert::source_view(self.peek.clone(), &ctx, false);
                convert::build_from_value(&Value::Map(view), &ctx)
            }
            _ => {
                // Non-record targets (enums, parseable scalars, wrappers)
                // go through the codec-backed fill wholesale.
                let value = convert::extract(self.peek.clone(), &ctx, DEPTH_LIMIT);
                convert::build_from_value(&value, &ctx)
            }
        }
    }

    /// Flattens the source value into an insertion-ordered, string-keyed
    /// container.
    ///
    /// Maps copy their entries verbatim; records contribute one entry per
    /// non-skipped field, in declaration order, under the field's own name.
    /// A sequence source cannot be given a keyed view and produces an empty
    /// container with a warning.
    pub fn to_map(&self) -> ConvertedMap {
        convert::source_view(self.peek.clone(), &self.ctx(), false)
    }

    /// Clones the source value and overwrites its fields with every
    /// non-null field of `source`, returning the merged instance.
    ///
    /// Both values must be of the same concrete record type; neither is
    /// mutated. Returns `None` on a type mismatch, a container type, or a
    /// clone failure, with the cause logged.
    pub fn overwrite<T: Facet<'mem>>(&self, source: &'mem T) -> Option<T> {
        let base_shape = self.peek.shape();
        if base_shape != T::SHAPE {
            let error = ConvertError::from(ConvertErrorKind::ShapeMismatch {
                expected: base_shape,
                actual: T::SHAPE,
            });
            log::error!("overwrite failed: {error}");
            return None;
        }
        if matches!(
            T::SHAPE.def,
            Def::List(_) | Def::Map(_) | Def::Set(_) | Def::Array(_) | Def::Slice(_)
        ) {
            let error = ConvertError::from(ConvertErrorKind::ContainerTarget(T::SHAPE));
            log::error!("overwrite failed: {error}");
            return None;
        }

        let ctx = self.ctx();
        let mut merged = convert::source_view(self.peek.clone(), &ctx, false);
        let overlay = convert::source_view(Peek::new(source), &ctx, false);
        for (key, value) in overlay.iter() {
            if !value.is_null() {
                merged.insert(key, value.clone());
            }
        }
        convert::build_from_value(&Value::Map(merged), &ctx)
    }
}
