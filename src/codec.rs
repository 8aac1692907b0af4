//! The fallback conversion seam.
//!
//! The structural engine handles records, containers and exact scalar
//! matches natively; everything else (cross-width numerics, parseable
//! scalars, enum variants) is delegated to a [`FallbackCodec`]. The default
//! [`ScalarCodec`] covers the common coercions; callers with richer needs can
//! install their own codec via [`crate::Converter::with_codec`].

use std::sync::Arc;

use facet_core::{NumericType, PrimitiveType, Shape, Type, UserType};
use facet_reflect::Partial;

use crate::map::Value;
use crate::serialize;
use crate::{ConvertError, ConvertErrorKind};

/// Converts a dynamic [`Value`] into a target shape the structural engine
/// does not handle natively.
///
/// `convert` is handed a [`Partial`] whose current frame is the target; it
/// must either fully set that frame or return an error. A failure is a
/// field-level event for the engine: it is logged and the field is skipped,
/// never propagated to the caller of a conversion.
pub trait FallbackCodec: Send + Sync {
    /// Whether `convert` stands a chance for this value/target pair. Used by
    /// the engine to skip unconvertible fields before touching the
    /// in-progress instance. May be optimistic.
    fn can_convert(&self, value: &Value, target: &'static Shape) -> bool;

    /// Sets the current frame of `wip` from `value`.
    fn convert(&self, value: &Value, wip: &mut Partial<'_>) -> Result<(), ConvertError>;
}

/// The default codec: numeric cross-conversions, string parsing, and unit
/// enum variants.
///
/// Numeric conversions are lossless-or-rejected: overflow and fractional
/// truncation fail rather than silently clamp. Strings convert into any
/// scalar whose shape supports parsing (integers, floats, `bool`, `char`,
/// and opaque scalars such as network addresses or timestamps), and into
/// unit enum variants by name. Scalars convert into `String` through their
/// literal rendering.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScalarCodec;

/// A shared handle to the default codec.
pub(crate) fn default_codec() -> Arc<dyn FallbackCodec> {
    Arc::new(ScalarCodec)
}

impl FallbackCodec for ScalarCodec {
    fn can_convert(&self, value: &Value, target: &'static Shape) -> bool {
        match value {
            Value::Null | Value::Seq(_) | Value::Map(_) => false,
            Value::Text(text) => {
                if target.is_type::<String>() {
                    return true;
                }
                if let Type::User(UserType::Enum(et)) = &target.ty {
                    return et
                        .variants
                        .iter()
                        .any(|v| v.name == text.as_str() && v.data.fields.is_empty());
                }
                // Anything scalar-shaped may support parsing; the engine
                // recovers if the parse fails at conversion time.
                matches!(target.def, facet_core::Def::Scalar)
            }
            Value::Bool(_) | Value::Char(_) => target.is_type::<String>(),
            Value::U64(_) | Value::I64(_) | Value::U128(_) | Value::I128(_) | Value::F64(_) => {
                target.is_type::<String>() || numeric_fits(value, target)
            }
        }
    }

    fn convert(&self, value: &Value, wip: &mut Partial<'_>) -> Result<(), ConvertError> {
        let shape = wip.shape();
        match value {
            Value::Null => {
                wip.set_default()?;
                Ok(())
            }
            Value::Text(text) => {
                if shape.is_type::<String>() {
                    wip.set(text.clone())?;
                    return Ok(());
                }
                if let Type::User(UserType::Enum(_)) = &shape.ty {
                    return set_variant(wip, text);
                }
                wip.parse_from_str(text)?;
                Ok(())
            }
            Value::Bool(v) => {
                if shape.is_type::<bool>() {
                    wip.set(*v)?;
                    Ok(())
                } else {
                    set_text_rendering(value, shape, wip)
                }
            }
            Value::Char(v) => {
                if shape.is_type::<char>() {
                    wip.set(*v)?;
                    Ok(())
                } else {
                    set_text_rendering(value, shape, wip)
                }
            }
            Value::U64(_) | Value::I64(_) | Value::U128(_) | Value::I128(_) | Value::F64(_) => {
                if shape.is_type::<String>() {
                    wip.set(serialize::key_text(value))?;
                    return Ok(());
                }
                set_numeric(value, shape, wip)
            }
            Value::Seq(_) | Value::Map(_) => {
                Err(ConvertErrorKind::Unconvertible { target: shape }.into())
            }
        }
    }
}

fn set_text_rendering(
    value: &Value,
    shape: &'static Shape,
    wip: &mut Partial<'_>,
) -> Result<(), ConvertError> {
    if shape.is_type::<String>() {
        wip.set(serialize::key_text(value))?;
        Ok(())
    } else {
        Err(ConvertErrorKind::Unconvertible { target: shape }.into())
    }
}

fn set_variant(wip: &mut Partial<'_>, name: &str) -> Result<(), ConvertError> {
    match wip.find_variant(name) {
        Some((index, variant)) if variant.data.fields.is_empty() => {
            wip.select_nth_variant(index)?;
            Ok(())
        }
        Some(_) => Err(ConvertErrorKind::Unconvertible { target: wip.shape() }.into()),
        None => Err(ConvertErrorKind::NoSuchVariant {
            name: name.to_string(),
            shape: wip.shape(),
        }
        .into()),
    }
}

/// Reads an integral value, rejecting fractional floats.
fn value_as_i128(value: &Value) -> Option<i128> {
    match value {
        Value::U64(v) => Some(*v as i128),
        Value::I64(v) => Some(*v as i128),
        Value::U128(v) => (*v).try_into().ok(),
        Value::I128(v) => Some(*v),
        Value::F64(v) => {
            (v.fract() == 0.0 && *v >= i128::MIN as f64 && *v <= i128::MAX as f64)
                .then(|| *v as i128)
        }
        _ => None,
    }
}

fn value_as_u128(value: &Value) -> Option<u128> {
    match value {
        Value::U64(v) => Some(*v as u128),
        Value::I64(v) => (*v).try_into().ok(),
        Value::U128(v) => Some(*v),
        Value::I128(v) => (*v).try_into().ok(),
        Value::F64(v) => {
            (v.fract() == 0.0 && *v >= 0.0 && *v <= u128::MAX as f64).then(|| *v as u128)
        }
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::U64(v) => Some(*v as f64),
        Value::I64(v) => Some(*v as f64),
        Value::U128(v) => Some(*v as f64),
        Value::I128(v) => Some(*v as f64),
        Value::F64(v) => Some(*v),
        _ => None,
    }
}

struct NumericTarget {
    signed: bool,
    float: bool,
    size: usize,
}

fn numeric_target(shape: &'static Shape) -> Option<NumericTarget> {
    let Type::Primitive(PrimitiveType::Numeric(numeric)) = shape.ty else {
        return None;
    };
    let size = shape.layout.sized_layout().ok()?.size();
    Some(match numeric {
        NumericType::Integer { signed } => NumericTarget {
            signed,
            float: false,
            size,
        },
        NumericType::Float => NumericTarget {
            signed: true,
            float: true,
            size,
        },
    })
}

fn numeric_fits(value: &Value, shape: &'static Shape) -> bool {
    let Some(target) = numeric_target(shape) else {
        return false;
    };
    if target.float {
        return value_as_f64(value).is_some();
    }
    if shape.is_type::<usize>() {
        return value_as_u128(value).is_some_and(|n| usize::try_from(n).is_ok());
    }
    if shape.is_type::<isize>() {
        return value_as_i128(value).is_some_and(|n| isize::try_from(n).is_ok());
    }
    if target.signed {
        value_as_i128(value).is_some_and(|n| match target.size {
            1 => i8::try_from(n).is_ok(),
            2 => i16::try_from(n).is_ok(),
            4 => i32::try_from(n).is_ok(),
            8 => i64::try_from(n).is_ok(),
            16 => true,
            _ => false,
        })
    } else {
        value_as_u128(value).is_some_and(|n| match target.size {
            1 => u8::try_from(n).is_ok(),
            2 => u16::try_from(n).is_ok(),
            4 => u32::try_from(n).is_ok(),
            8 => u64::try_from(n).is_ok(),
            16 => true,
            _ => false,
        })
    }
}

fn set_numeric(
    value: &Value,
    shape: &'static Shape,
    wip: &mut Partial<'_>,
) -> Result<(), ConvertError> {
    let unconvertible = || ConvertError::from(ConvertErrorKind::Unconvertible { target: shape });

    let Some(target) = numeric_target(shape) else {
        return Err(unconvertible());
    };

    if target.float {
        let n = value_as_f64(value).ok_or_else(unconvertible)?;
        match target.size {
            4 => wip.set(n as f32)?,
            8 => wip.set(n)?,
            _ => return Err(unconvertible()),
        };
        return Ok(());
    }

    if shape.is_type::<usize>() {
        let n = value_as_u128(value).ok_or_else(unconvertible)?;
        wip.set(usize::try_from(n).map_err(|_| unconvertible())?)?;
        return Ok(());
    }
    if shape.is_type::<isize>() {
        let n = value_as_i128(value).ok_or_else(unconvertible)?;
        wip.set(isize::try_from(n).map_err(|_| unconvertible())?)?;
        return Ok(());
    }

    if target.signed {
        let n = value_as_i128(value).ok_or_else(unconvertible)?;
        match target.size {
            1 => wip.set(i8::try_from(n).map_err(|_| unconvertible())?)?,
            2 => wip.set(i16::try_from(n).map_err(|_| unconvertible())?)?,
            4 => wip.set(i32::try_from(n).map_err(|_| unconvertible())?)?,
            8 => wip.set(i64::try_from(n).map_err(|_| unconvertible())?)?,
            16 => wip.set(n)?,
            _ => return Err(unconvertible()),
        };
    } else {
        let n = value_as_u128(value).ok_or_else(unconvertible)?;
        match target.size {
            1 => wip.set(u8::try_from(n).map_err(|_| unconvertible())?)?,
            2 => wip.set(u16::try_from(n).map_err(|_| unconvertible())?)?,
            4 => wip.set(u32::try_from(n).map_err(|_| unconvertible())?)?,
            8 => wip.set(u64::try_from(n).map_err(|_| unconvertible())?)?,
            16 => wip.set(n)?,
            _ => return Err(unconvertible()),
        };
    }
    Ok(())
}
