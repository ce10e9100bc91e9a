//! Circular dependency detection infrastructure.

use std::cell::RefCell;

use crate::error::{IocError, IocResult};
use crate::token::Token;

// Thread-local resolution state for circular dependency detection
thread_local! {
    static RESOLUTION_TLS: RefCell<ResolutionTls> = RefCell::new(ResolutionTls::default());
}

#[derive(Default)]
struct ResolutionTls {
    stack: Vec<(u64, String)>,
}

/// In-progress marker for one factory record on the current thread.
///
/// Entering a record that is already on the stack reports the cycle as
/// [`IocError::Circular`] with the token path, e.g. `["A", "B", "A"]`.
/// The marker is popped when the guard drops, so a failed construction
/// never poisons later attempts.
pub(crate) struct StackGuard {
    id: u64,
}

impl StackGuard {
    pub(crate) fn enter(id: u64, token: &Token, max_depth: usize) -> IocResult<Self> {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();

            // Circular detection BEFORE pushing the new record
            if let Some(start) = tls.stack.iter().position(|(seen, _)| *seen == id) {
                let mut path: Vec<String> = tls.stack[start..].iter().map(|(_, name)| name.clone()).collect();
                path.push(token.to_string());
                return Err(IocError::Circular(path));
            }

            // Depth guard
            if tls.stack.len() >= max_depth {
                return Err(IocError::DepthExceeded(max_depth));
            }

            tls.stack.push((id, token.to_string()));
            Ok(())
        })?;

        Ok(Self { id })
    }

    /// Current nesting depth on this thread.
    #[allow(dead_code)]
    pub(crate) fn depth() -> usize {
        RESOLUTION_TLS.with(|tls| tls.borrow().stack.len())
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            if let Some(pos) = tls.stack.iter().rposition(|(seen, _)| *seen == self.id) {
                tls.stack.truncate(pos);
            }
        });
    }
}
