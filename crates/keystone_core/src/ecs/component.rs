//! # Component System
//!
//! Components are opaque to the runtime beyond their kind. Any
//! `Send + Sync + 'static` type can be one; teardown is an opt-in
//! capability rather than a mandatory method.

use std::any::Any;

use crate::error::BoxError;

/// Downcasting support, implemented for every `'static` type.
pub trait AsAny: Any {
    /// Returns `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// Returns `self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Marker trait for component instances.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Deserialize)]
/// struct Timer {
///     timers: HashMap<String, f32>,
/// }
///
/// impl Component for Timer {
///     fn teardown_capability(&mut self) -> Option<&mut dyn Teardown> {
///         Some(self)
///     }
/// }
///
/// impl Teardown for Timer {
///     fn teardown(&mut self) -> Result<(), BoxError> {
///         self.timers.clear();
///         Ok(())
///     }
/// }
/// ```
pub trait Component: AsAny + Send + Sync {
    /// Capability query for teardown.
    ///
    /// Components that release resources on destroy return `Some(self)`.
    fn teardown_capability(&mut self) -> Option<&mut dyn Teardown> {
        None
    }
}

/// Teardown capability, invoked when the owning entity is destroyed.
pub trait Teardown {
    /// Releases the component's resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the release failed. The failure is isolated: the
    /// entity is still removed and sibling components are still torn down.
    fn teardown(&mut self) -> Result<(), BoxError>;
}

impl dyn Component {
    /// Returns `true` if the concrete type is `T`.
    #[inline]
    #[must_use]
    pub fn is<T: Component>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcasts to the concrete type.
    #[inline]
    #[must_use]
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Downcasts mutably to the concrete type.
    #[inline]
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// Returns `true` if the component opts into teardown.
    #[must_use]
    pub fn has_teardown(&mut self) -> bool {
        self.teardown_capability().is_some()
    }
}
