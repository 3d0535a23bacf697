//! GATT Operation Queue
//!
//! BLE radios allow exactly one outstanding GATT transaction per link.
//! This queue is the single mechanism enforcing that: accepted requests go
//! into a FIFO, at most one is promoted to in-flight at a time, and the next
//! is dispatched only when the transport completes the current one. A
//! `SetNotify` occupies one slot even though the transport performs the CCCD
//! descriptor write as a sub-step of the same logical operation.

use std::collections::VecDeque;

use tracing::warn;

use crate::error::ErrorKind;
use crate::messages::{Effect, OperationRequest, OperationResponder, OperationResult};
use crate::types::OperationId;

// ----------------------------------------------------------------------------
// Queue Entries
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct QueuedOperation {
    id: OperationId,
    request: OperationRequest,
    respond_to: OperationResponder,
}

impl QueuedOperation {
    /// Resolve the submitter's future; the receiver may have been dropped.
    fn resolve(self, result: OperationResult) -> (OperationId, OperationRequest, OperationResult) {
        let _ = self.respond_to.send(result.clone());
        (self.id, self.request, result)
    }
}

// ----------------------------------------------------------------------------
// Operation Queue
// ----------------------------------------------------------------------------

/// FIFO of pending operations plus the single in-flight slot
#[derive(Debug, Default)]
pub struct OperationQueue {
    next_id: u64,
    pending: VecDeque<QueuedOperation>,
    in_flight: Option<QueuedOperation>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request to the FIFO and return its assigned id
    pub fn enqueue(
        &mut self,
        request: OperationRequest,
        respond_to: OperationResponder,
    ) -> OperationId {
        self.next_id += 1;
        let id = OperationId::new(self.next_id);
        self.pending.push_back(QueuedOperation {
            id,
            request,
            respond_to,
        });
        id
    }

    /// Promote the head of the FIFO to in-flight, if the slot is free
    ///
    /// Returns the effect the transport must execute, or `None` when an
    /// operation is already in flight or the queue is empty.
    pub fn dispatch_next(&mut self) -> Option<Effect> {
        if self.in_flight.is_some() {
            return None;
        }
        let entry = self.pending.pop_front()?;
        let effect = match &entry.request {
            OperationRequest::Read {
                service,
                characteristic,
            } => Effect::ReadCharacteristic {
                id: entry.id,
                service: *service,
                characteristic: *characteristic,
            },
            OperationRequest::Write {
                service,
                characteristic,
                payload,
            } => Effect::WriteCharacteristic {
                id: entry.id,
                service: *service,
                characteristic: *characteristic,
                payload: payload.clone(),
            },
            OperationRequest::SetNotify {
                service,
                characteristic,
                enable,
            } => Effect::SetNotify {
                id: entry.id,
                service: *service,
                characteristic: *characteristic,
                enable: *enable,
            },
        };
        self.in_flight = Some(entry);
        Some(effect)
    }

    /// Resolve the in-flight operation with the transport's completion
    ///
    /// Returns the resolved request for the caller to mirror as an app
    /// event. A completion whose id does not match the in-flight slot is
    /// dropped; it belongs to an operation already failed by a disconnect.
    pub fn complete(
        &mut self,
        id: OperationId,
        result: OperationResult,
    ) -> Option<(OperationId, OperationRequest, OperationResult)> {
        match self.in_flight.take() {
            Some(entry) if entry.id == id => Some(entry.resolve(result)),
            Some(entry) => {
                warn!(in_flight = %entry.id, completed = %id, "stale operation completion");
                self.in_flight = Some(entry);
                None
            }
            None => {
                warn!(completed = %id, "operation completion with empty in-flight slot");
                None
            }
        }
    }

    /// Fail the in-flight operation and every pending one with `kind`
    ///
    /// Used on connection loss; requests never reach the transport after
    /// this. Resolutions are returned in submission order.
    pub fn fail_all(
        &mut self,
        kind: ErrorKind,
    ) -> Vec<(OperationId, OperationRequest, OperationResult)> {
        let mut resolved = Vec::with_capacity(self.pending.len() + 1);
        if let Some(entry) = self.in_flight.take() {
            resolved.push(entry.resolve(Err(kind)));
        }
        for entry in self.pending.drain(..) {
            resolved.push(entry.resolve(Err(kind)));
        }
        resolved
    }

    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_none()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
