use std::collections::HashMap;

use parking_lot::Mutex;

use cardbridge_core_types::{RequestId, RequestStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    InFlight,
    Finished(RequestStatus),
}

/// Every request id seen by this process. Entries are never evicted or persisted.
#[derive(Debug, Default)]
pub struct RequestLedger {
    entries: Mutex<HashMap<RequestId, RequestState>>,
}

impl RequestLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the id is newly accepted; it is then in flight.
    pub fn accept(&self, id: &RequestId) -> bool {
        let mut guard = self.entries.lock();
        if guard.contains_key(id) {
            return false;
        }
        guard.insert(id.clone(), RequestState::InFlight);
        true
    }

    /// Records the terminal status. Terminal states are never overwritten.
    pub fn finish(&self, id: &RequestId, status: RequestStatus) {
        let mut guard = self.entries.lock();
        match guard.get_mut(id) {
            Some(state @ RequestState::InFlight) => *state = RequestState::Finished(status),
            Some(RequestState::Finished(_)) => {}
            None => {
                guard.insert(id.clone(), RequestState::Finished(status));
            }
        }
    }

    pub fn state(&self, id: &RequestId) -> Option<RequestState> {
        self.entries.lock().get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
