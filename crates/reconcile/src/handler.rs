//! Handler trait and closure-based callbacks
//!
//! A handler performs the remote mutation for each operation. Call sites
//! either implement [`Handler`] on a type that wraps their API client, or
//! build [`Callbacks`] from closures.

use crate::types::OperationKind;
use anyhow::Result;

/// Performs one remote mutation per call
///
/// Implementations should leave no partial mutation behind when they
/// return an error, so the next pass sees an accurate current set.
pub trait Handler<K> {
    /// Whether this handler performs operations of `kind`
    ///
    /// Operations of an unsupported kind are skipped without error. This
    /// is how a caller opts out of a whole class, e.g. never deleting.
    fn handles(&self, _kind: OperationKind) -> bool {
        true
    }

    /// Attach a key that is desired but not present
    fn add(&mut self, key: &K) -> Result<()>;

    /// Refresh a key present on both sides
    fn update(&mut self, old: &K, new: &K) -> Result<()>;

    /// Detach a key that is present but no longer desired
    fn delete(&mut self, key: &K) -> Result<()>;
}

impl<K, H: Handler<K> + ?Sized> Handler<K> for &mut H {
    fn handles(&self, kind: OperationKind) -> bool {
        (**self).handles(kind)
    }

    fn add(&mut self, key: &K) -> Result<()> {
        (**self).add(key)
    }

    fn update(&mut self, old: &K, new: &K) -> Result<()> {
        (**self).update(old, new)
    }

    fn delete(&mut self, key: &K) -> Result<()> {
        (**self).delete(key)
    }
}

type KeyFn<'a, K> = Box<dyn FnMut(&K) -> Result<()> + 'a>;
type UpdateFn<'a, K> = Box<dyn FnMut(&K, &K) -> Result<()> + 'a>;

/// Handler built from optional closures
///
/// A missing closure means that class of operation is skipped.
///
/// ```
/// use reconcile::{Callbacks, reconcile};
///
/// let mut removed = Vec::new();
/// let mut callbacks = Callbacks::new().on_delete(|key: &String| {
///     removed.push(key.clone());
///     Ok(())
/// });
/// reconcile(vec!["a".to_string()], Vec::new(), &mut callbacks).unwrap();
/// drop(callbacks);
/// assert_eq!(removed, vec!["a".to_string()]);
/// ```
pub struct Callbacks<'a, K> {
    add: Option<KeyFn<'a, K>>,
    update: Option<UpdateFn<'a, K>>,
    delete: Option<KeyFn<'a, K>>,
}

impl<'a, K> Callbacks<'a, K> {
    /// Callbacks that skip every operation
    pub fn new() -> Self {
        Self {
            add: None,
            update: None,
            delete: None,
        }
    }

    pub fn on_add(mut self, f: impl FnMut(&K) -> Result<()> + 'a) -> Self {
        self.add = Some(Box::new(f));
        self
    }

    pub fn on_update(mut self, f: impl FnMut(&K, &K) -> Result<()> + 'a) -> Self {
        self.update = Some(Box::new(f));
        self
    }

    pub fn on_delete(mut self, f: impl FnMut(&K) -> Result<()> + 'a) -> Self {
        self.delete = Some(Box::new(f));
        self
    }
}

impl<K> Default for Callbacks<'_, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Handler<K> for Callbacks<'_, K> {
    fn handles(&self, kind: OperationKind) -> bool {
        match kind {
            OperationKind::Add => self.add.is_some(),
            OperationKind::Update => self.update.is_some(),
            OperationKind::Delete => self.delete.is_some(),
        }
    }

    fn add(&mut self, key: &K) -> Result<()> {
        self.add.as_mut().map_or(Ok(()), |f| f(key))
    }

    fn update(&mut self, old: &K, new: &K) -> Result<()> {
        self.update.as_mut().map_or(Ok(()), |f| f(old, new))
    }

    fn delete(&mut self, key: &K) -> Result<()> {
        self.delete.as_mut().map_or(Ok(()), |f| f(key))
    }
}

/// Handler that performs nothing and supports nothing
pub struct NoOp;

impl<K> Handler<K> for NoOp {
    fn handles(&self, _kind: OperationKind) -> bool {
        false
    }

    fn add(&mut self, _key: &K) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, _old: &K, _new: &K) -> Result<()> {
        Ok(())
    }

    fn delete(&mut self, _key: &K) -> Result<()> {
        Ok(())
    }
}
