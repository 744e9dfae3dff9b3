//! Slot registry: the growable, never-shrinking list of pool positions

use crate::fairness::CallerId;

/// One position in the registry
#[derive(Debug)]
pub(crate) struct Slot<R> {
    /// Live resource; `None` while it is checked out or after it was discarded
    pub resource: Option<R>,
    /// Construction id of the resource that belongs to this slot
    pub resource_id: u64,
    pub owner: Option<CallerId>,
    pub sick: bool,
    /// Bumped on every grant so stale leases can be told apart
    pub epoch: u64,
}

impl<R> Slot<R> {
    fn new(resource: R, resource_id: u64) -> Self {
        Self {
            resource: Some(resource),
            resource_id,
            owner: None,
            sick: false,
            epoch: 0,
        }
    }

    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }

    /// Sick slots and slots that lost their resource are rebuilt before reuse
    #[cfg(test)]
    pub fn needs_rebuild(&self) -> bool {
        self.sick || self.resource.is_none()
    }
}

/// Why a check-in was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CheckInError {
    UnknownSlot,
    NotOwner,
}

#[derive(Debug)]
pub(crate) struct SlotRegistry<R> {
    slots: Vec<Slot<R>>,
}

impl<R> SlotRegistry<R> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Append an unowned slot and return its index
    pub fn push(&mut self, resource: R, resource_id: u64) -> usize {
        self.slots.push(Slot::new(resource, resource_id));
        self.slots.len() - 1
    }

    /// Index of the first free slot not held back for the `reserved`
    /// higher-priority waiters, scanning in registry order.
    pub fn grant_candidate(&self, reserved: usize) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_free())
            .nth(reserved)
            .map(|(index, _)| index)
    }

    /// Mark `index` as owned by `caller` and take its resource.
    ///
    /// A slot that is sick or lost its resource is rebuilt first through
    /// `rebuild`, which receives the stale resource (if any) and returns a
    /// replacement with its construction id. If rebuilding fails the slot
    /// stays unowned and still needs a rebuild.
    ///
    /// Returns the resource, the slot's new epoch and the resource id.
    pub fn assign_with<E>(
        &mut self,
        index: usize,
        caller: CallerId,
        rebuild: impl FnOnce(Option<R>) -> Result<(R, u64), E>,
    ) -> Result<(R, u64, u64), E> {
        let slot = &mut self.slots[index];
        debug_assert!(slot.is_free(), "slot {index} assigned while owned");

        let resource = match slot.resource.take() {
            Some(resource) if !slot.sick => resource,
            stale => {
                let (fresh, id) = rebuild(stale)?;
                slot.resource_id = id;
                slot.sick = false;
                fresh
            }
        };

        slot.owner = Some(caller);
        slot.epoch += 1;
        Ok((resource, slot.epoch, slot.resource_id))
    }

    /// Return a resource to the slot it was granted from
    pub fn check_in(
        &mut self,
        index: usize,
        caller: CallerId,
        epoch: u64,
        resource: R,
        faulty: bool,
    ) -> Result<(), (CheckInError, R)> {
        let Some(slot) = self.slots.get_mut(index) else {
            return Err((CheckInError::UnknownSlot, resource));
        };
        if slot.owner != Some(caller) || slot.epoch != epoch {
            return Err((CheckInError::NotOwner, resource));
        }

        slot.owner = None;
        slot.resource = Some(resource);
        if faulty {
            slot.sick = true;
        }
        Ok(())
    }

    /// Clear ownership of every slot held by `caller`
    pub fn release_all(&mut self, caller: CallerId) -> usize {
        let mut released = 0;
        for slot in self.slots.iter_mut().filter(|s| s.owner == Some(caller)) {
            slot.owner = None;
            released += 1;
        }
        released
    }

    pub fn owned_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_free()).count()
    }

    pub fn sick_count(&self) -> usize {
        self.slots.iter().filter(|s| s.sick).count()
    }

    #[cfg(test)]
    pub fn owner_of(&self, index: usize) -> Option<CallerId> {
        self.slots.get(index).and_then(|s| s.owner)
    }
}
