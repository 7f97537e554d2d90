use futures::future::{AbortHandle, AbortRegistration};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

/// List requests currently on the wire, so a user can call one off.
#[derive(Debug, Default)]
pub struct InFlight {
    next_ticket: AtomicU64,
    handles: Mutex<HashMap<u32, (u64, AbortHandle)>>,
}

impl InFlight {
    pub fn register(self: &Arc<Self>, page: u32) -> (InFlightGuard, AbortRegistration) {
        let (handle, registration) = AbortHandle::new_pair();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(page, (ticket, handle));

        let guard = InFlightGuard {
            in_flight: self.clone(),
            page,
            ticket,
        };
        (guard, registration)
    }

    /// Returns whether there was anything to cancel.
    pub fn cancel(&self, page: u32) -> bool {
        let removed = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&page);

        match removed {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

/// Deregisters the request when it finishes, however it finishes.
pub struct InFlightGuard {
    in_flight: Arc<InFlight>,
    page: u32,
    ticket: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut handles = self
            .in_flight
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if handles
            .get(&self.page)
            .is_some_and(|(ticket, _)| *ticket == self.ticket)
        {
            handles.remove(&self.page);
        }
    }
}
