//! Deferred-reference unwrapping.
//!
//! Some object graphs contain values that stand in for a backing resource
//! which may not have been materialized yet: a lazily-loaded association, a
//! remote handle, a memoized cell. The converter knows nothing about any
//! particular lazy-loading machinery; it only consults an installed
//! [`DeferredResolver`] before a value participates in conversion.

use std::sync::{Arc, RwLock};

use facet_reflect::Peek;

/// Capability for recognizing and resolving deferred references.
///
/// Implementors typically match on a shape they own (`is_deferred`) and use
/// interior mutability inside that type to support [`DeferredResolver::force`]
/// through a shared view. Forcing may block on out-of-process work; callers
/// opt into that with the eager conversion policy.
pub trait DeferredResolver: Send + Sync {
    /// Whether `peek` is a deferred reference this resolver understands.
    fn is_deferred(&self, peek: Peek<'_, '_>) -> bool;

    /// Whether the deferred reference has not been realized yet.
    fn is_unresolved(&self, peek: Peek<'_, '_>) -> bool;

    /// Forces resolution. Returns `true` when the payload is available
    /// afterwards. May block.
    fn force(&self, peek: Peek<'_, '_>) -> bool;

    /// The realized payload, or `None` while unresolved.
    fn payload<'mem, 'facet>(&self, peek: Peek<'mem, 'facet>) -> Option<Peek<'mem, 'facet>>;

    /// Whether `peek` is a deferred *container* (e.g. a lazily-populated
    /// sequence). Such values are not replaced by a payload; they are
    /// materialized in place so that iteration is safe.
    fn is_deferred_container(&self, _peek: Peek<'_, '_>) -> bool {
        false
    }

    /// Whether a deferred container has been populated.
    fn is_materialized(&self, _peek: Peek<'_, '_>) -> bool {
        true
    }

    /// Forces a deferred container to populate itself (e.g. by probing its
    /// size). Returns `true` when iteration is safe afterwards. May block.
    fn force_materialize(&self, _peek: Peek<'_, '_>) -> bool {
        true
    }
}

static RESOLVER: RwLock<Option<Arc<dyn DeferredResolver>>> = RwLock::new(None);

/// Installs the process-wide deferred-reference resolver.
///
/// With no resolver installed, every value passes through conversion
/// unchanged.
pub fn install_resolver(resolver: Arc<dyn DeferredResolver>) {
    if let Ok(mut slot) = RESOLVER.write() {
        *slot = Some(resolver);
    }
}

/// Removes the process-wide resolver, if any.
pub fn clear_resolver() {
    if let Ok(mut slot) = RESOLVER.write() {
        *slot = None;
    }
}

fn resolver() -> Option<Arc<dyn DeferredResolver>> {
    RESOLVER.read().ok().and_then(|slot| slot.clone())
}

/// Unwraps `peek` according to the installed resolver and the caller's
/// unwrap policy.
///
/// - Plain values pass through unchanged.
/// - A resolved deferred reference yields its payload.
/// - An unresolved one yields `None` under the lazy-safe policy, protecting
///   the caller from forcing expensive resolution when a snapshot suffices.
/// - Under the eager policy it is forced first, then yields its payload.
/// - A deferred container is materialized under the eager policy and
///   otherwise left untouched; if a later iteration over it fails, that is
///   reported as an unwrap-to-null, not a hard error.
pub(crate) fn unwrap_deferred<'mem, 'facet>(
    peek: Peek<'mem, 'facet>,
    eager: bool,
) -> Option<Peek<'mem, 'facet>> {
    let Some(resolver) = resolver() else {
        return Some(peek);
    };

    if resolver.is_deferred(peek.clone()) {
        if resolver.is_unresolved(peek.clone()) {
            if !eager {
                log::trace!("unresolved deferred reference under lazy-safe policy; treating as null");
                return None;
            }
            if !resolver.force(peek.clone()) {
                log::warn!("failed to force a deferred reference; treating as null");
                return None;
            }
        }
        return resolver.payload(peek);
    }

    if resolver.is_deferred_container(peek.clone()) && !resolver.is_materialized(peek.clone()) {
        if eager {
            if !resolver.force_materialize(peek.clone()) {
                log::warn!("failed to materialize a deferred container; treating as null");
                return None;
            }
        } else {
            log::trace!("leaving unmaterialized deferred container untouched under lazy-safe policy");
        }
    }

    Some(peek)
}
