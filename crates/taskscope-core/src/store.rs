//! Workshop and file registry.
//!
//! The orchestrator owns workshop state through this trait; nothing else holds
//! workshop records. Implementations handle the storage backend.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::types::{Workshop, WorkshopFile};

/// Storage for workshops and their files.
pub trait WorkshopStore: Send + Sync {
    /// Fetch a workshop by ID.
    fn get_workshop(&self, id: &str) -> Result<Option<Workshop>>;

    /// Insert or replace a workshop.
    fn put_workshop(&self, workshop: Workshop) -> Result<()>;

    /// Delete a workshop. Returns whether it existed.
    fn delete_workshop(&self, id: &str) -> Result<bool>;

    /// All workshops, oldest first.
    fn list_workshops(&self) -> Result<Vec<Workshop>>;

    /// Fetch a file by ID.
    fn get_file(&self, id: &str) -> Result<Option<WorkshopFile>>;

    /// Insert or replace a file.
    fn put_file(&self, file: WorkshopFile) -> Result<()>;

    /// Delete a file. Returns whether it existed.
    fn delete_file(&self, id: &str) -> Result<bool>;
}

/// In-memory store. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryWorkshopStore {
    workshops: RwLock<HashMap<String, Workshop>>,
    files: RwLock<HashMap<String, WorkshopFile>>,
}

impl InMemoryWorkshopStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkshopStore for InMemoryWorkshopStore {
    fn get_workshop(&self, id: &str) -> Result<Option<Workshop>> {
        let workshops = self.workshops.read().map_err(|_| Error::LockPoisoned)?;
        Ok(workshops.get(id).cloned())
    }

    fn put_workshop(&self, workshop: Workshop) -> Result<()> {
        let mut workshops = self.workshops.write().map_err(|_| Error::LockPoisoned)?;
        workshops.insert(workshop.id.clone(), workshop);
        Ok(())
    }

    fn delete_workshop(&self, id: &str) -> Result<bool> {
        let mut workshops = self.workshops.write().map_err(|_| Error::LockPoisoned)?;
        Ok(workshops.remove(id).is_some())
    }

    fn list_workshops(&self) -> Result<Vec<Workshop>> {
        let workshops = self.workshops.read().map_err(|_| Error::LockPoisoned)?;
        let mut all: Vec<Workshop> = workshops.values().cloned().collect();
        all.sort_by_key(|w| w.created_at);
        Ok(all)
    }

    fn get_file(&self, id: &str) -> Result<Option<WorkshopFile>> {
        let files = self.files.read().map_err(|_| Error::LockPoisoned)?;
        Ok(files.get(id).cloned())
    }

    fn put_file(&self, file: WorkshopFile) -> Result<()> {
        let mut files = self.files.write().map_err(|_| Error::LockPoisoned)?;
        files.insert(file.id.clone(), file);
        Ok(())
    }

    fn delete_file(&self, id: &str) -> Result<bool> {
        let mut files = self.files.write().map_err(|_| Error::LockPoisoned)?;
        Ok(files.remove(id).is_some())
    }
}
