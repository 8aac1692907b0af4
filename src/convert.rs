//! The structural conversion engine.
//!
//! Conversion is two passes over a dynamic value tree: the read side
//! *extracts* a source [`Peek`] into [`Value`]s, and the write side *fills* a
//! target [`Partial`] from them. Both passes thread an explicit remaining-
//! depth budget; hitting the budget abandons that branch with a warning
//! instead of recursing forever through cyclic or pathologically deep graphs.

use std::borrow::Cow;
use std::sync::Arc;

use facet_core::{Characteristic, Def, Facet, Field, PrimitiveType, Shape, Type, UserType};
use facet_reflect::{HasFields, Partial, Peek, PeekStruct, ScalarType};

use crate::codec::{FallbackCodec, default_codec};
use crate::deferred::unwrap_deferred;
use crate::descriptor::{TypeDescriptor, describe};
use crate::map::{ConvertedMap, Value};
use crate::serialize;
use crate::{ConvertError, ConvertErrorKind, DEPTH_LIMIT};

/// Per-conversion settings threaded through both passes.
pub(crate) struct ConvertCtx {
    /// Whether deferred references are forced (`from_eager`) or nulled out
    /// (`from`) when unresolved.
    pub(crate) eager: bool,
    /// Receives every value/target pair the engine does not handle natively.
    pub(crate) codec: Arc<dyn FallbackCodec>,
}

impl Default for ConvertCtx {
    fn default() -> Self {
        ConvertCtx {
            eager: false,
            codec: default_codec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Read side: Peek -> Value
// ---------------------------------------------------------------------------

/// Extracts `peek` into an owned dynamic value, descending at most `depth`
/// levels.
pub(crate) fn extract(peek: Peek<'_, '_>, ctx: &ConvertCtx, depth: usize) -> Value {
    let Some(peek) = unwrap_deferred(peek, ctx.eager) else {
        return Value::Null;
    };
    let peek = peek.innermost_peek();

    if let Ok(opt) = peek.clone().into_option() {
        return match opt.value() {
            Some(inner) => extract(inner, ctx, depth),
            None => Value::Null,
        };
    }

    if let Some(value) = extract_scalar(peek.clone()) {
        return value;
    }

    match peek.shape().def {
        Def::List(_) | Def::Array(_) | Def::Slice(_) | Def::Set(_) => {
            if depth == 0 {
                return depth_exhausted(peek.shape());
            }
            if let Ok(list) = peek.clone().into_list_like() {
                return Value::Seq(
                    list.iter()
                        .map(|item| extract(item, ctx, depth - 1))
                        .collect(),
                );
            }
        }
        Def::Map(_) => {
            if depth == 0 {
                return depth_exhausted(peek.shape());
            }
            if let Ok(map) = peek.clone().into_map() {
                let mut out = ConvertedMap::new();
                for (key, value) in map.iter() {
                    let key = extract(key, ctx, depth - 1);
                    out.insert(serialize::key_text(&key), extract(value, ctx, depth - 1));
                }
                return Value::Map(out);
            }
        }
        _ => {}
    }

    match peek.shape().ty {
        Type::User(UserType::Struct(_)) => {
            if depth == 0 {
                return depth_exhausted(peek.shape());
            }
            if let Ok(ps) = peek.clone().into_struct() {
                return Value::Map(flatten_struct(peek.shape(), ps, ctx, depth, false));
            }
        }
        Type::User(UserType::Enum(_)) => {
            if let Ok(ep) = peek.clone().into_enum() {
                if let Ok(name) = ep.variant_name_active() {
                    let fields: Vec<_> = ep.fields().collect();
                    if fields.is_empty() {
                        return Value::Text(name.to_string());
                    }
                    if depth == 0 {
                        return depth_exhausted(peek.shape());
                    }
                    let mut data = ConvertedMap::new();
                    for (field, field_peek) in fields {
                        data.insert(field.name, extract(field_peek, ctx, depth - 1));
                    }
                    return Value::Map(ConvertedMap::new().put_over(name, Value::Map(data)));
                }
            }
        }
        _ => {}
    }

    // Opaque scalars (paths, addresses, timestamps, ...) keep their
    // display rendering.
    Value::Text(peek.to_string())
}

fn depth_exhausted(shape: &'static Shape) -> Value {
    log::warn!(
        "too many nested values while reading {shape}; check for circular references"
    );
    Value::Null
}

fn extract_scalar(peek: Peek<'_, '_>) -> Option<Value> {
    // Strings aren't primitive but are treated as such.
    if let Ok(s) = peek.get::<String>() {
        return Some(Value::Text(s.clone()));
    }
    if let Ok(s) = peek.get::<Cow<str>>() {
        return Some(Value::Text(s.as_ref().to_string()));
    }

    match peek.shape().ty {
        Type::Primitive(PrimitiveType::Boolean) => {
            peek.get::<bool>().ok().map(|v| Value::Bool(*v))
        }
        Type::Primitive(PrimitiveType::Numeric(_)) => extract_numeric(peek),
        Type::Primitive(PrimitiveType::Textual(_)) => match peek.get::<char>() {
            Ok(c) => Some(Value::Char(*c)),
            Err(_) => Some(Value::Text(peek.to_string())),
        },
        _ => None,
    }
}

fn extract_numeric(peek: Peek<'_, '_>) -> Option<Value> {
    match peek.scalar_type() {
        Some(ScalarType::U8) => peek.get::<u8>().ok().map(|v| Value::U64(*v as u64)),
        Some(ScalarType::U16) => peek.get::<u16>().ok().map(|v| Value::U64(*v as u64)),
        Some(ScalarType::U32) => peek.get::<u32>().ok().map(|v| Value::U64(*v as u64)),
        Some(ScalarType::U64) => peek.get::<u64>().ok().map(|v| Value::U64(*v)),
        Some(ScalarType::U128) => peek.get::<u128>().ok().map(|v| Value::U128(*v)),
        Some(ScalarType::I8) => peek.get::<i8>().ok().map(|v| Value::I64(*v as i64)),
        Some(ScalarType::I16) => peek.get::<i16>().ok().map(|v| Value::I64(*v as i64)),
        Some(ScalarType::I32) => peek.get::<i32>().ok().map(|v| Value::I64(*v as i64)),
        Some(ScalarType::I64) => peek.get::<i64>().ok().map(|v| Value::I64(*v)),
        Some(ScalarType::I128) => peek.get::<i128>().ok().map(|v| Value::I128(*v)),
        Some(ScalarType::F32) => peek.get::<f32>().ok().map(|v| Value::F64(*v as f64)),
        Some(ScalarType::F64) => peek.get::<f64>().ok().map(|v| Value::F64(*v)),
        _ => {
            let shape = peek.shape();
            if shape.is_type::<usize>() {
                peek.get::<usize>().ok().map(|v| Value::U64(*v as u64))
            } else if shape.is_type::<isize>() {
                peek.get::<isize>().ok().map(|v| Value::I64(*v as i64))
            } else {
                None
            }
        }
    }
}

/// Flattens a struct's descriptor fields into a keyed view, one [`Value`]
/// per non-skipped field under the field's own name. Source overrides never
/// apply here; they are a write-side directive.
fn flatten_struct(
    shape: &'static Shape,
    ps: PeekStruct<'_, '_>,
    ctx: &ConvertCtx,
    depth: usize,
    include_skipped: bool,
) -> ConvertedMap {
    let desc = describe(shape);
    let direct: Vec<Peek> = ps.fields().map(|(_, field_peek)| field_peek).collect();

    let mut out = ConvertedMap::new();
    for fd in desc.fields() {
        if fd.skip && !include_skipped {
            continue;
        }
        let field_peek = match fd.inner {
            None => direct.get(fd.outer).cloned(),
            Some(inner) => direct
                .get(fd.outer)
                .and_then(|p| p.clone().innermost_peek().into_struct().ok())
                .and_then(|ips| ips.fields().nth(inner).map(|(_, field_peek)| field_peek)),
        };
        let value = match field_peek {
            Some(field_peek) => extract(field_peek, ctx, depth - 1),
            None => Value::Null,
        };
        out.insert(fd.name, value);
    }
    out
}

/// Materializes a source value as an associative view: maps contribute their
/// entries verbatim, records flatten their fields, sequences degenerate to an
/// empty view with a warning.
pub(crate) fn source_view(
    peek: Peek<'_, '_>,
    ctx: &ConvertCtx,
    include_skipped: bool,
) -> ConvertedMap {
    let Some(peek) = unwrap_deferred(peek, ctx.eager) else {
        return ConvertedMap::new();
    };
    let peek = peek.innermost_peek();

    if let Def::Map(_) = peek.shape().def {
        if let Ok(map) = peek.clone().into_map() {
            let mut out = ConvertedMap::new();
            for (key, value) in map.iter() {
                let key = extract(key, ctx, DEPTH_LIMIT);
                out.insert(serialize::key_text(&key), extract(value, ctx, DEPTH_LIMIT));
            }
            return out;
        }
    }

    if matches!(
        peek.shape().def,
        Def::List(_) | Def::Array(_) | Def::Slice(_) | Def::Set(_)
    ) {
        log::warn!(
            "{} is a sequence and cannot be flattened to a keyed view; returning an empty container",
            peek.shape()
        );
        return ConvertedMap::new();
    }

    match peek.clone().into_struct() {
        Ok(ps) => flatten_struct(peek.shape(), ps, ctx, DEPTH_LIMIT, include_skipped),
        Err(_) => {
            log::debug!("{} has no fields to flatten", peek.shape());
            ConvertedMap::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Write side: Value -> Partial
// ---------------------------------------------------------------------------

/// Builds a `T` out of a dynamic value through a fresh [`Partial`].
pub(crate) fn build_from_value<'facet, T: Facet<'facet>>(
    value: &Value,
    ctx: &ConvertCtx,
) -> Option<T> {
    match try_build(value, ctx) {
        Ok(built) => Some(built),
        Err(e) => {
            log::warn!("conversion to {} failed: {e}", T::SHAPE);
            None
        }
    }
}

fn try_build<'facet, T: Facet<'facet>>(
    value: &Value,
    ctx: &ConvertCtx,
) -> Result<T, ConvertError> {
    let mut typed_partial = Partial::alloc::<T>()?;
    {
        let wip = typed_partial.inner_mut();
        fill(wip, value, ctx, DEPTH_LIMIT)?;
    }
    let boxed = typed_partial.build()?;
    Ok(*boxed)
}

/// Fills the current frame of `wip` from `value`, descending at most `depth`
/// levels.
pub(crate) fn fill(
    wip: &mut Partial<'_>,
    value: &Value,
    ctx: &ConvertCtx,
    depth: usize,
) -> Result<(), ConvertError> {
    if depth == 0 {
        log::warn!(
            "too many nested values while building {}; check for circular references",
            wip.shape()
        );
        return Err(ConvertErrorKind::DepthExceeded.into());
    }

    let mut entered = 0usize;
    fill_innermost(wip, value, ctx, depth, &mut entered)?;
    for _ in 0..entered {
        wip.end()?;
    }
    Ok(())
}

fn fill_innermost(
    wip: &mut Partial<'_>,
    value: &Value,
    ctx: &ConvertCtx,
    depth: usize,
    entered: &mut usize,
) -> Result<(), ConvertError> {
    // Drill through Option, smart-pointer and transparent wrapper frames
    // until the innermost shape is on top.
    let mut pointer_begun = false;
    loop {
        let shape = wip.shape();
        if let Def::Option(_) = shape.def {
            if value.is_null() {
                wip.set_default()?;
                return Ok(());
            }
            wip.begin_some()?;
            *entered += 1;
        } else if let Def::Pointer(_) = shape.def {
            // A slice pointee keeps the Pointer def after begin_smart_ptr.
            if pointer_begun {
                break;
            }
            wip.begin_smart_ptr()?;
            *entered += 1;
            pointer_begun = true;
        } else if shape.inner.is_some() {
            wip.begin_inner()?;
            *entered += 1;
        } else {
            break;
        }
    }

    let shape = wip.shape();
    match value {
        Value::Null => {
            wip.set_default()?;
        }
        Value::Bool(v) => {
            if shape.is_type::<bool>() {
                wip.set(*v)?;
            } else {
                ctx.codec.convert(value, wip)?;
            }
        }
        Value::Char(v) => {
            if shape.is_type::<char>() {
                wip.set(*v)?;
            } else {
                ctx.codec.convert(value, wip)?;
            }
        }
        Value::U64(v) => {
            if shape.is_type::<u64>() {
                wip.set(*v)?;
            } else {
                ctx.codec.convert(value, wip)?;
            }
        }
        Value::I64(v) => {
            if shape.is_type::<i64>() {
                wip.set(*v)?;
            } else {
                ctx.codec.convert(value, wip)?;
            }
        }
        Value::U128(v) => {
            if shape.is_type::<u128>() {
                wip.set(*v)?;
            } else {
                ctx.codec.convert(value, wip)?;
            }
        }
        Value::I128(v) => {
            if shape.is_type::<i128>() {
                wip.set(*v)?;
            } else {
                ctx.codec.convert(value, wip)?;
            }
        }
        Value::F64(v) => {
            if shape.is_type::<f64>() {
                wip.set(*v)?;
            } else {
                ctx.codec.convert(value, wip)?;
            }
        }
        Value::Text(v) => {
            if shape.is_type::<String>() {
                wip.set(v.clone())?;
            } else {
                ctx.codec.convert(value, wip)?;
            }
        }
        Value::Seq(items) => {
            fill_sequence(wip, items, ctx, depth)?;
        }
        Value::Map(map) => match shape.def {
            Def::Map(_) => fill_map(wip, map, ctx, depth)?,
            _ => match shape.ty {
                Type::User(UserType::Struct(_)) => fill_struct(wip, map, ctx, depth - 1)?,
                _ => ctx.codec.convert(value, wip)?,
            },
        },
    }
    Ok(())
}

/// Deep-converts a sequence value into a list, set or array target. A fresh
/// container is always allocated; the source is never aliased.
fn fill_sequence(
    wip: &mut Partial<'_>,
    items: &[Value],
    ctx: &ConvertCtx,
    depth: usize,
) -> Result<(), ConvertError> {
    let shape = wip.shape();
    match shape.def {
        Def::List(_) => {
            wip.set_default()?;
            wip.begin_list()?;
            for item in items {
                wip.begin_list_item()?;
                fill(wip, item, ctx, depth - 1)?;
                wip.end()?;
            }
            wip.end()?;
            Ok(())
        }
        Def::Set(_) => {
            wip.begin_set()?;
            for item in items {
                wip.begin_set_item()?;
                fill(wip, item, ctx, depth - 1)?;
                wip.end()?;
            }
            wip.end()?;
            Ok(())
        }
        Def::Array(ad) => {
            if items.len() != ad.n {
                return Err(ConvertErrorKind::Unconvertible { target: shape }.into());
            }
            for (index, item) in items.iter().enumerate() {
                wip.begin_nth_element(index)?;
                fill(wip, item, ctx, depth - 1)?;
                wip.end()?;
            }
            Ok(())
        }
        _ => ctx.codec.convert(&Value::Seq(items.to_vec()), wip),
    }
}

fn fill_map(
    wip: &mut Partial<'_>,
    map: &ConvertedMap,
    ctx: &ConvertCtx,
    depth: usize,
) -> Result<(), ConvertError> {
    wip.begin_map()?;
    for (key, value) in map.iter() {
        wip.begin_key()?;
        fill_key(wip, key)?;
        wip.end()?;
        wip.begin_value()?;
        fill(wip, value, ctx, depth - 1)?;
        wip.end()?;
    }
    wip.end()?;
    Ok(())
}

fn fill_key(wip: &mut Partial<'_>, key: &str) -> Result<(), ConvertError> {
    // Transparent key types (newtypes over strings) set their inner value.
    if wip.shape().inner.is_some() {
        wip.begin_inner()?;
        set_key_scalar(wip, key)?;
        wip.end()?;
    } else {
        set_key_scalar(wip, key)?;
    }
    Ok(())
}

fn set_key_scalar(wip: &mut Partial<'_>, key: &str) -> Result<(), ConvertError> {
    if wip.shape().is_type::<String>() {
        wip.set(key.to_string())?;
    } else {
        wip.parse_from_str(key)?;
    }
    Ok(())
}

/// Fills a struct frame from an associative view, field by field in
/// descriptor order.
///
/// Per-field failures (an unconvertible value, a codec rejection, an
/// exhausted depth budget) are logged and leave that field for default
/// finalization; they never abort the surrounding conversion.
pub(crate) fn fill_struct(
    wip: &mut Partial<'_>,
    view: &ConvertedMap,
    ctx: &ConvertCtx,
    depth: usize,
) -> Result<(), ConvertError> {
    if depth == 0 {
        log::warn!(
            "too many nested values while building {}; check for circular references",
            wip.shape()
        );
        return Err(ConvertErrorKind::DepthExceeded.into());
    }

    let desc = describe(wip.shape());
    for fd in desc.fields() {
        if fd.skip {
            log::trace!("field '{}' is marked skip", fd.name);
            continue;
        }
        let key = fd.source.unwrap_or(fd.name);
        let Some(value) = view.get(key) else {
            continue;
        };

        if value.is_null() {
            // An explicit null sets the field's zero value where one exists;
            // shapes with no default stay unset.
            if fd.shape.is(Characteristic::Default) {
                set_field_zero(wip, fd.outer, fd.inner)?;
            } else {
                log::trace!("field '{}' has a null source value and no default", fd.name);
            }
            continue;
        }

        if !compatible(fd.shape, value, ctx) {
            log::debug!(
                "skipping field '{}': {} cannot be built from the source value",
                fd.name,
                fd.shape
            );
            continue;
        }

        let base = wip.frame_count();
        if let Err(e) = fill_field(wip, fd.outer, fd.inner, value, ctx, depth) {
            log::debug!("skipping field '{}' of {}: {e}", fd.name, desc.shape);
            unwind(wip, base)?;
        }
    }

    finalize_defaults(wip, desc)
}

fn fill_field(
    wip: &mut Partial<'_>,
    outer: usize,
    inner: Option<usize>,
    value: &Value,
    ctx: &ConvertCtx,
    depth: usize,
) -> Result<(), ConvertError> {
    wip.begin_nth_field(outer)?;
    if let Some(inner) = inner {
        wip.begin_nth_field(inner)?;
    }
    fill(wip, value, ctx, depth)?;
    if inner.is_some() {
        wip.end()?;
    }
    wip.end()?;
    Ok(())
}

fn set_field_zero(
    wip: &mut Partial<'_>,
    outer: usize,
    inner: Option<usize>,
) -> Result<(), ConvertError> {
    wip.begin_nth_field(outer)?;
    if let Some(inner) = inner {
        wip.begin_nth_field(inner)?;
    }
    wip.set_default()?;
    if inner.is_some() {
        wip.end()?;
    }
    wip.end()?;
    Ok(())
}

/// Closes abandoned frames after a per-field failure, restoring the frame
/// stack to `base`. An unset frame that refuses to close is given a default
/// value first; if it still cannot close, the conversion as a whole is
/// beyond repair and the error propagates.
fn unwind(wip: &mut Partial<'_>, base: usize) -> Result<(), ConvertError> {
    while wip.frame_count() > base {
        if wip.end().is_err() {
            wip.set_default()?;
            wip.end()?;
        }
    }
    Ok(())
}

/// Gives every still-unset field its default: the field-level default
/// function when declared, the type's `Default` otherwise. Whatever remains
/// is copied out of a whole-struct default instance when the type has a
/// zero-argument constructor; fields with no route to a value stay unset
/// and surface as a build error for the caller to log.
fn finalize_defaults(wip: &mut Partial<'_>, desc: &TypeDescriptor) -> Result<(), ConvertError> {
    let mut unset: Vec<usize> = Vec::new();
    for fd in desc.fields().iter().filter(|fd| fd.inner.is_none()) {
        if wip.is_field_set(fd.outer)? {
            continue;
        }
        if fd.field.vtable.default_fn.is_some() || fd.shape.is(Characteristic::Default) {
            default_field_at(wip, fd.outer, fd.field)?;
        } else {
            unset.push(fd.outer);
        }
    }

    if !unset.is_empty() && desc.has_default {
        let default_val = Partial::alloc_shape(desc.shape)?.set_default()?.build()?;
        if let Ok(ps) = default_val.peek().into_struct() {
            let defaults: Vec<Peek> = ps.fields().map(|(_, field_peek)| field_peek).collect();
            for index in unset {
                if let Some(def_peek) = defaults.get(index) {
                    wip.begin_nth_field(index)?;
                    wip.set_from_peek(def_peek)?;
                    wip.end()?;
                }
            }
        }
    }

    // Flattened members are finalized as a unit: open the member and default
    // whatever is unset inside it, including fields shadowed out of the
    // descriptor that nothing else will ever fill.
    let mut visited: Vec<usize> = Vec::new();
    for fd in desc.fields().iter().filter(|fd| fd.inner.is_some()) {
        if visited.contains(&fd.outer) {
            continue;
        }
        visited.push(fd.outer);
        if wip.is_field_set(fd.outer)? {
            continue;
        }
        wip.begin_nth_field(fd.outer)?;
        if let Type::User(UserType::Struct(inner_sd)) = wip.shape().ty {
            for (index, inner_field) in inner_sd.fields.iter().enumerate() {
                if wip.is_field_set(index)? {
                    continue;
                }
                default_field_at(wip, index, inner_field)?;
            }
        }
        wip.end()?;
    }
    Ok(())
}

fn default_field_at(
    wip: &mut Partial<'_>,
    index: usize,
    field: &'static Field,
) -> Result<(), ConvertError> {
    wip.begin_nth_field(index)?;
    if let Some(field_default) = field.vtable.default_fn {
        wip.set_field_default(field_default)?;
    } else if field.shape().is(Characteristic::Default) {
        wip.set_default()?;
    } else {
        log::debug!("field '{}' has no source value and no default", field.name);
    }
    wip.end()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Compatibility pre-check
// ---------------------------------------------------------------------------

fn innermost_target(shape: &'static Shape) -> &'static Shape {
    let mut shape = shape;
    loop {
        if let Def::Option(opt) = shape.def {
            shape = opt.t;
        } else if let Some(inner_fn) = shape.inner {
            shape = inner_fn();
        } else if let Def::Pointer(pd) = shape.def {
            match pd.pointee() {
                Some(pointee) if pointee != shape => shape = pointee,
                _ => return shape,
            }
        } else {
            return shape;
        }
    }
}

/// Whether `value` stands a chance of filling `shape`, checked before the
/// field's frame is opened so a mismatch skips the field without touching
/// the in-progress instance. Optimistic where a static answer is impossible
/// (string parsing, set elements); the unwind path covers those.
fn compatible(shape: &'static Shape, value: &Value, ctx: &ConvertCtx) -> bool {
    if value.is_null() {
        return true;
    }
    let shape = innermost_target(shape);

    match value {
        Value::Null => true,
        Value::Bool(_) => shape.is_type::<bool>() || ctx.codec.can_convert(value, shape),
        Value::Char(_) => shape.is_type::<char>() || ctx.codec.can_convert(value, shape),
        Value::U64(_) => shape.is_type::<u64>() || ctx.codec.can_convert(value, shape),
        Value::I64(_) => shape.is_type::<i64>() || ctx.codec.can_convert(value, shape),
        Value::U128(_) => shape.is_type::<u128>() || ctx.codec.can_convert(value, shape),
        Value::I128(_) => shape.is_type::<i128>() || ctx.codec.can_convert(value, shape),
        Value::F64(_) => shape.is_type::<f64>() || ctx.codec.can_convert(value, shape),
        Value::Text(_) => shape.is_type::<String>() || ctx.codec.can_convert(value, shape),
        Value::Seq(items) => match shape.def {
            Def::List(list_def) => items
                .iter()
                .all(|item| compatible(list_def.t(), item, ctx)),
            Def::Array(ad) => {
                items.len() == ad.n && items.iter().all(|item| compatible(ad.t, item, ctx))
            }
            Def::Set(_) => true,
            _ => ctx.codec.can_convert(value, shape),
        },
        Value::Map(map) => match shape.def {
            Def::Map(map_def) => map
                .iter()
                .all(|(_, entry)| compatible(map_def.v(), entry, ctx)),
            _ => match shape.ty {
                // Field-level mismatches inside a record skip individually.
                Type::User(UserType::Struct(_)) => true,
                _ => ctx.codec.can_convert(value, shape),
            },
        },
    }
}
