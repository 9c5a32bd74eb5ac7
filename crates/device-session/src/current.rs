// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The calling thread's current session.
//!
//! The device API allocates from "the current session" when no session is
//! passed explicitly. The current session is per thread: entering a session
//! on one thread has no effect on any other, so independent sessions can be
//! driven from parallel test threads.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::{DeviceError, Session};

thread_local! {
    static CURRENT: RefCell<Option<Arc<Session>>> = const { RefCell::new(None) };
}

impl Session {
    /// The session entered on this thread.
    pub fn current() -> Result<Arc<Session>, DeviceError> {
        CURRENT.with(|cell| cell.borrow().clone().ok_or(DeviceError::NoActiveSession))
    }

    /// Whether any session is entered on this thread.
    pub fn has_current() -> bool {
        CURRENT.with(|cell| cell.borrow().is_some())
    }

    /// Makes `session` current on this thread until the returned scope is
    /// dropped. Scopes nest; dropping one restores whatever was current
    /// before it.
    pub fn enter(session: &Arc<Session>) -> SessionScope {
        let previous = CURRENT.with(|cell| cell.borrow_mut().replace(Arc::clone(session)));
        debug!("{} entered", session.id());
        SessionScope {
            previous,
            _not_send: PhantomData,
        }
    }
}

/// Guard returned by [`Session::enter`].
///
/// Not `Send`: the scope must be dropped on the thread that created it.
#[must_use = "the session is only current while the scope is alive"]
pub struct SessionScope {
    previous: Option<Arc<Session>>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|cell| {
            let left = std::mem::replace(&mut *cell.borrow_mut(), previous);
            if let Some(session) = left {
                debug!("{} left", session.id());
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HostLowLevelDevice, SessionConfig};

    fn open() -> Arc<Session> {
        let config = SessionConfig::default();
        Session::open(&config, Arc::new(HostLowLevelDevice::covering(&config))).unwrap()
    }

    #[test]
    fn test_no_current_by_default() {
        assert!(!Session::has_current());
        assert!(matches!(Session::current(), Err(DeviceError::NoActiveSession)));
    }

    #[test]
    fn test_enter_and_leave() {
        let s = open();
        {
            let _scope = Session::enter(&s);
            assert_eq!(Session::current().unwrap().id(), s.id());
        }
        assert!(!Session::has_current());
    }

    #[test]
    fn test_nested_scopes_restore() {
        let outer = open();
        let inner = open();
        let _a = Session::enter(&outer);
        {
            let _b = Session::enter(&inner);
            assert_eq!(Session::current().unwrap().id(), inner.id());
        }
        assert_eq!(Session::current().unwrap().id(), outer.id());
    }

    #[test]
    fn test_current_is_per_thread() {
        let s = open();
        let _scope = Session::enter(&s);
        let seen = std::thread::spawn(Session::has_current).join().unwrap();
        assert!(!seen);
    }

    #[test]
    fn test_scope_keeps_session_alive() {
        let s = open();
        let weak = Arc::downgrade(&s);
        let scope = Session::enter(&s);
        drop(s);
        assert!(weak.upgrade().is_some());
        drop(scope);
        assert!(weak.upgrade().is_none());
    }
}
