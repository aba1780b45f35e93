//! Per-context handle arena.
//!
//! Handles are indexes into the arena of the context that issued them, tagged
//! with the slot's generation. Closing a handle frees its slot for the next
//! `open` and bumps the generation, so a stale handle reports `HandleClosed`
//! instead of resolving to an unrelated connection.

use std::fmt;

use crate::db::{DbError, DriverConnection};

use super::ContextId;

/// Opaque reference to an open connection, the only thing a script holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    context: ContextId,
    id: u64,
    generation: u32,
}

impl Handle {
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Slot number, starting at 1. Reused once the handle is closed.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.context, self.id, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Idle,
    Executing,
    /// Terminal.
    Closed,
}

struct Slot {
    generation: u32,
    driver: &'static str,
    state: HandleState,
    connection: Option<Box<dyn DriverConnection>>,
}

pub struct HandleArena {
    context: ContextId,
    slots: Vec<Slot>,
    /// Indexes of closed slots, reused most recent first.
    free: Vec<usize>,
}

impl HandleArena {
    pub fn new(context: ContextId) -> Self {
        Self {
            context,
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, connection: Box<dyn DriverConnection>) -> Handle {
        let driver = connection.driver_name();
        let idx = match self.free.pop() {
            Some(idx) => {
                let slot = &mut self.slots[idx];
                slot.generation = slot.generation.wrapping_add(1);
                slot.driver = driver;
                slot.state = HandleState::Idle;
                slot.connection = Some(connection);
                idx
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    driver,
                    state: HandleState::Idle,
                    connection: Some(connection),
                });
                self.slots.len() - 1
            }
        };
        self.handle_at(idx)
    }

    fn handle_at(&self, idx: usize) -> Handle {
        Handle {
            context: self.context,
            id: idx as u64 + 1,
            generation: self.slots[idx].generation,
        }
    }

    fn index(&self, handle: Handle) -> Option<usize> {
        if handle.context != self.context {
            return None;
        }
        let idx = usize::try_from(handle.id).ok()?.checked_sub(1)?;
        let slot = self.slots.get(idx)?;
        (handle.generation <= slot.generation).then_some(idx)
    }

    /// Whether `handle` refers to the slot's current occupant rather than an
    /// earlier, closed one.
    fn is_current(&self, idx: usize, handle: Handle) -> bool {
        let slot = &self.slots[idx];
        slot.generation == handle.generation && slot.state != HandleState::Closed
    }

    fn slot_mut(&mut self, handle: Handle, function: &str) -> Result<&mut Slot, DbError> {
        if handle.context != self.context {
            return Err(DbError::ForeignHandle {
                handle: handle.to_string(),
                context: self.context.to_string(),
            });
        }
        let idx = self
            .index(handle)
            .ok_or_else(|| DbError::invalid_argument(function, format!("{} is not a handle issued by open", handle)))?;
        if !self.is_current(idx, handle) {
            return Err(DbError::HandleClosed {
                handle: handle.to_string(),
            });
        }
        Ok(&mut self.slots[idx])
    }

    /// Run `f` against the handle's connection, marking it as executing
    /// for the duration. The handle is idle again afterwards even if `f` failed.
    pub fn with_connection<T>(
        &mut self,
        handle: Handle,
        function: &str,
        f: impl FnOnce(&mut dyn DriverConnection) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let slot = self.slot_mut(handle, function)?;
        let Some(connection) = slot.connection.as_mut() else {
            return Err(DbError::HandleClosed {
                handle: handle.to_string(),
            });
        };

        slot.state = HandleState::Executing;
        let result = f(&mut **connection);
        slot.state = HandleState::Idle;
        result
    }

    /// Close the handle and free its slot, even when the driver reports a
    /// close failure.
    pub fn close(&mut self, handle: Handle) -> Result<(), DbError> {
        let slot = self.slot_mut(handle, "close")?;
        slot.state = HandleState::Closed;
        let connection = slot.connection.take();
        if let Some(idx) = self.index(handle) {
            self.free.push(idx);
        }
        connection.map_or(Ok(()), |c| c.close())
    }

    /// Close every open handle, reporting each outcome.
    pub fn close_all(&mut self) -> Vec<(Handle, &'static str, Result<(), DbError>)> {
        let open: Vec<usize> = (0..self.slots.len())
            .filter(|idx| self.slots[*idx].state != HandleState::Closed)
            .collect();
        open.into_iter()
            .map(|idx| {
                let handle = self.handle_at(idx);
                let slot = &mut self.slots[idx];
                slot.state = HandleState::Closed;
                let result = slot.connection.take().map_or(Ok(()), |c| c.close());
                self.free.push(idx);
                (handle, slot.driver, result)
            })
            .collect()
    }

    /// State of a handle issued by this arena. Handles to a slot that has
    /// since been closed, or reused, are `Closed`.
    pub fn state(&self, handle: Handle) -> Option<HandleState> {
        let idx = self.index(handle)?;
        if self.is_current(idx, handle) {
            Some(self.slots[idx].state)
        } else {
            Some(HandleState::Closed)
        }
    }

    pub fn driver(&self, handle: Handle) -> Option<&'static str> {
        self.index(handle)
            .filter(|idx| self.slots[*idx].generation == handle.generation)
            .map(|idx| self.slots[idx].driver)
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.state != HandleState::Closed).count()
    }

    /// Slots allocated so far, open or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
