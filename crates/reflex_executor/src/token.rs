//! Subscription tokens: single-shot handles on live reactive bindings.

use reflex_component::Entity;

/// An opaque handle for one live reactive binding.
///
/// Tokens are created by capability handlers and owned by the executor until
/// the binding ends. Disposing runs the handler-supplied release action at
/// most once; later calls are no-ops. A token that is dropped without being
/// disposed disposes itself.
///
/// The release action must cope with the underlying binding having already
/// been torn down by someone else.
pub struct SubscriptionToken {
    /// The entity this binding is attached to, `None` for group-wide bindings.
    entity: Option<Entity>,
    release: Option<Box<dyn FnOnce()>>,
    disposed: bool,
}

impl SubscriptionToken {
    /// Create a token attached to `entity` (or to the whole group when `None`).
    #[must_use]
    pub fn new(entity: Option<Entity>, release: impl FnOnce() + 'static) -> Self {
        Self {
            entity,
            release: Some(Box::new(release)),
            disposed: false,
        }
    }

    /// Create a token for a per-entity binding.
    #[must_use]
    pub fn for_entity(entity: Entity, release: impl FnOnce() + 'static) -> Self {
        Self::new(Some(entity), release)
    }

    /// Create a token for a group-wide binding.
    #[must_use]
    pub fn for_group(release: impl FnOnce() + 'static) -> Self {
        Self::new(None, release)
    }

    /// Create a token with nothing to release.
    #[must_use]
    pub fn inert(entity: Option<Entity>) -> Self {
        Self {
            entity,
            release: None,
            disposed: false,
        }
    }

    /// The entity this binding is attached to.
    #[must_use]
    pub fn associated_entity(&self) -> Option<Entity> {
        self.entity
    }

    /// Returns `true` if this token is attached to `entity`.
    #[must_use]
    pub fn is_for(&self, entity: Entity) -> bool {
        self.entity == Some(entity)
    }

    /// Returns `true` once [`SubscriptionToken::dispose`] has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Release the binding.
    ///
    /// Returns `true` if this call did the release, `false` if the token was
    /// already disposed.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        if let Some(release) = self.release.take() {
            release();
        }
        true
    }
}

impl std::fmt::Debug for SubscriptionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionToken")
            .field("entity", &self.entity)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl Drop for SubscriptionToken {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Dispose every token in `tokens`, returning how many were actually released.
pub fn dispose_all(tokens: impl IntoIterator<Item = SubscriptionToken>) -> usize {
    tokens
        .into_iter()
        .map(|mut token| token.dispose())
        .filter(|&released| released)
        .count()
}
