//! Memoized per-type field metadata.
//!
//! Looking at a shape's fields, attributes and flatten expansion on every
//! conversion would repeat the same walk over and over, so the resolved view
//! is computed once per type and shared process-wide. Descriptors are leaked
//! into `'static` storage; the set of distinct types in a program is finite,
//! so the cache never needs eviction.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use facet_core::{Characteristic, Field, FieldAttribute, FieldFlags, Shape, Type, UserType};

/// The resolved field layout of a structured record type.
///
/// Field order is the type's own declaration order first, followed by the
/// fields contributed by `#[facet(flatten)]` members (one level deep), with
/// duplicate names suppressed in favour of the outer field; the outer type
/// shadows what it embeds.
#[derive(Debug)]
pub struct TypeDescriptor {
    /// The shape this descriptor was computed for.
    pub shape: &'static Shape,
    /// Whether the type can be constructed out of thin air
    /// (`Default`), used when a field has no source value.
    pub has_default: bool,
    fields: Vec<FieldDescriptor>,
    index: HashMap<&'static str, usize>,
}

impl TypeDescriptor {
    /// All resolved fields, in order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by its effective name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    fn compute(shape: &'static Shape) -> Self {
        let mut fields = Vec::new();
        let mut index: HashMap<&'static str, usize> = HashMap::new();

        if let Type::User(UserType::Struct(sd)) = &shape.ty {
            for (outer, field) in sd.fields.iter().enumerate() {
                if field.flags.contains(FieldFlags::FLATTEN)
                    && matches!(field.shape().ty, Type::User(UserType::Struct(_)))
                {
                    continue;
                }
                push_field(&mut fields, &mut index, field, outer, None);
            }

            // Flattened struct members contribute their fields after the
            // type's own, shadowed by name.
            for (outer, field) in sd.fields.iter().enumerate() {
                if !field.flags.contains(FieldFlags::FLATTEN) {
                    continue;
                }
                let Type::User(UserType::Struct(inner_sd)) = &field.shape().ty else {
                    continue;
                };
                for (inner, inner_field) in inner_sd.fields.iter().enumerate() {
                    if index.contains_key(inner_field.name) {
                        log::trace!(
                            "field '{}' of flattened '{}' is shadowed in {}",
                            inner_field.name,
                            field.name,
                            shape
                        );
                        continue;
                    }
                    push_field(&mut fields, &mut index, inner_field, outer, Some(inner));
                }
            }
        } else {
            // Not a record type: cache an empty field list so repeated
            // lookups don't retry the introspection.
            log::trace!("{shape} is not a struct; caching an empty descriptor");
        }

        TypeDescriptor {
            shape,
            has_default: shape.is(Characteristic::Default),
            fields,
            index,
        }
    }
}

/// One field of a [`TypeDescriptor`], with its conversion directives resolved.
#[derive(Debug)]
pub struct FieldDescriptor {
    /// The effective field name (after any facet-level rename).
    pub name: &'static str,
    /// The underlying field metadata.
    pub field: &'static Field,
    /// The field's declared shape.
    pub shape: &'static Shape,
    /// Index of the field (or of its flatten carrier) on the outer struct.
    pub outer: usize,
    /// For fields reached through a flattened member, the index within it.
    pub inner: Option<usize>,
    /// `#[facet(skip)]`: exclude this field from conversion and flattening.
    /// Skip always wins over a source override.
    pub skip: bool,
    /// `#[facet(source = "name")]`: alternate source key to read from when
    /// filling this field. Never consulted when flattening.
    pub source: Option<&'static str>,
}

fn push_field(
    fields: &mut Vec<FieldDescriptor>,
    index: &mut HashMap<&'static str, usize>,
    field: &'static Field,
    outer: usize,
    inner: Option<usize>,
) {
    if index.contains_key(field.name) {
        // Duplicate declaration-order name; first one wins.
        return;
    }
    index.insert(field.name, fields.len());
    fields.push(FieldDescriptor {
        name: field.name,
        field,
        shape: field.shape(),
        outer,
        inner,
        skip: field.attributes.contains(&FieldAttribute::Arbitrary("skip")),
        source: source_override(field),
    });
}

/// Parses the `#[facet(source = "name")]` directive out of a field's
/// arbitrary attributes. The raw attribute text is kept as written by the
/// derive, so be tolerant about spacing and quoting.
fn source_override(field: &'static Field) -> Option<&'static str> {
    field.attributes.iter().find_map(|attr| match attr {
        FieldAttribute::Arbitrary(raw) => {
            let rest = raw.strip_prefix("source")?.trim_start();
            let name = rest.strip_prefix('=')?.trim().trim_matches('"');
            (!name.is_empty()).then_some(name)
        }
        _ => None,
    })
}

static CACHE: OnceLock<RwLock<HashMap<usize, &'static TypeDescriptor>>> = OnceLock::new();

/// Returns the memoized descriptor for `shape`, computing it on first use.
///
/// Concurrent first lookups of the same type may compute the descriptor more
/// than once; the first writer wins and the results are value-equal, so
/// callers never observe a partially-built entry.
pub fn describe(shape: &'static Shape) -> &'static TypeDescriptor {
    let cache = CACHE.get_or_init(|| RwLock::new(HashMap::new()));
    let key = shape as *const Shape as usize;

    if let Ok(map) = cache.read() {
        if let Some(desc) = map.get(&key) {
            return desc;
        }
    }

    let computed = TypeDescriptor::compute(shape);
    match cache.write() {
        Ok(mut map) => *map.entry(key).or_insert_with(|| Box::leak(Box::new(computed))),
        // Poisoned lock: serve an uncached descriptor.
        Err(_) => Box::leak(Box::new(computed)),
    }
}
