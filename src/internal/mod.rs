//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod destroy_hooks;

pub(crate) use circular::StackGuard;
pub use destroy_hooks::HookId;
pub(crate) use destroy_hooks::DestroyHooks;
