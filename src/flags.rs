//! Resolution flags.

use bitflags::bitflags;

bitflags! {
    /// Flags controlling how a token is looked up in the injector chain.
    ///
    /// The empty set is the default behaviour: check the injector itself,
    /// then its ancestors.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_ioc::InjectFlags;
    ///
    /// let flags = InjectFlags::SKIP_SELF | InjectFlags::OPTIONAL;
    /// assert!(flags.is_optional());
    /// assert!(!flags.checks_self());
    /// assert!(InjectFlags::DEFAULT.checks_self());
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InjectFlags: u8 {
        /// Never delegate to the parent injector.
        const SELF = 0b0000_0001;
        /// Skip this injector's own records and go straight to the parent.
        const SKIP_SELF = 0b0000_0010;
        /// Return "not found" instead of failing.
        const OPTIONAL = 0b0000_0100;
        /// Re-evaluate records even when a non-static cached value exists.
        const RESOLVE = 0b0000_1000;
    }
}

impl InjectFlags {
    /// Check self then parent.
    pub const DEFAULT: InjectFlags = InjectFlags::empty();

    /// Whether the injector's own records are consulted.
    #[inline]
    pub fn checks_self(self) -> bool {
        !self.contains(InjectFlags::SKIP_SELF)
    }

    /// Whether lookups may continue into the parent.
    #[inline]
    pub fn checks_parent(self) -> bool {
        !self.contains(InjectFlags::SELF)
    }

    #[inline]
    pub fn is_optional(self) -> bool {
        self.contains(InjectFlags::OPTIONAL)
    }

    #[inline]
    pub fn forces_resolve(self) -> bool {
        self.contains(InjectFlags::RESOLVE)
    }

    /// Flags forwarded to the parent: `SKIP_SELF` applies to one level only.
    #[inline]
    pub(crate) fn for_parent(self) -> InjectFlags {
        self - InjectFlags::SKIP_SELF
    }

    /// Flags carried into the dependencies of a record: only `RESOLVE`.
    #[inline]
    pub(crate) fn inherited(self) -> InjectFlags {
        self & InjectFlags::RESOLVE
    }
}
