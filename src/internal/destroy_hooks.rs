//! Internal hook list for destroy callbacks.

/// Identifies a registered destroy hook so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub(crate) u64);

struct Hook {
    id: u64,
    child: bool,
    run: Box<dyn FnOnce() + Send>,
}

/// Container for destroy hooks with LIFO execution order.
///
/// Children of an injector register their own destroy here as `child`
/// hooks; user callbacks and disposers are plain hooks. Both run in
/// reverse registration order.
#[derive(Default)]
pub(crate) struct DestroyHooks {
    next: u64,
    hooks: Vec<Hook>,
}

impl DestroyHooks {
    /// Add a destroy hook.
    pub(crate) fn push(&mut self, run: Box<dyn FnOnce() + Send>) -> HookId {
        self.insert(run, false)
    }

    /// Add the cascade hook of a child scope.
    pub(crate) fn push_child(&mut self, run: Box<dyn FnOnce() + Send>) -> HookId {
        self.insert(run, true)
    }

    fn insert(&mut self, run: Box<dyn FnOnce() + Send>, child: bool) -> HookId {
        self.next += 1;
        self.hooks.push(Hook { id: self.next, child, run });
        HookId(self.next)
    }

    /// Remove a hook without running it.
    pub(crate) fn remove(&mut self, id: HookId) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|h| h.id != id.0);
        before != self.hooks.len()
    }

    pub(crate) fn children(&self) -> usize {
        self.hooks.iter().filter(|h| h.child).count()
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Moves every hook out, leaving the list empty.
    pub(crate) fn take(&mut self) -> DestroyHooks {
        std::mem::take(self)
    }

    /// Execute all hooks in reverse order (LIFO).
    pub(crate) fn run_all_reverse(mut self) {
        while let Some(hook) = self.hooks.pop() {
            (hook.run)();
        }
    }
}
