// Track-creation plumbing: the tracker asks a `TrackStore` to mint every physical track.
use serde::Serialize;

use crate::core::error::Error;
use crate::core::ids::{StringId, TrackId, TrackSetId, UniquePid};
use crate::core::state::TrackSetKind;

/// Metadata recorded alongside a freshly minted track.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct TrackDescriptor {
    pub set: TrackSetId,
    pub kind: TrackSetKind,
    pub upid: Option<UniquePid>,
    pub name: StringId,
}

/// Storage layer that owns the global track id space.
pub trait TrackStore {
    /// Mints a new globally unique track and records its metadata.
    fn create_track(&mut self, descriptor: TrackDescriptor) -> Result<TrackId, Error>;
}

impl<S: TrackStore + ?Sized> TrackStore for &mut S {
    fn create_track(&mut self, descriptor: TrackDescriptor) -> Result<TrackId, Error> {
        (**self).create_track(descriptor)
    }
}

/// In-memory track table; ids are dense row indices.
#[derive(Clone, Debug, Default)]
pub struct TrackTable {
    rows: Vec<TrackDescriptor>,
}

impl TrackTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: TrackId) -> Option<&TrackDescriptor> {
        self.rows.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrackId, &TrackDescriptor)> {
        // Every row index passed `TrackId::from_index` when it was pushed.
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| (TrackId::new(index as u32), row))
    }
}

impl TrackStore for TrackTable {
    fn create_track(&mut self, descriptor: TrackDescriptor) -> Result<TrackId, Error> {
        let id = TrackId::from_index(self.rows.len())?;
        self.rows.push(descriptor);
        Ok(id)
    }
}
