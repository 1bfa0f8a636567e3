//! Profile persistence.
//!
//! The hosted relational store is an external collaborator; the drivers only
//! need paged reads and per-record atomic writes, captured here as the
//! [`ProfileStore`] trait. [`JsonFileStore`] backs the CLI with a JSON file
//! (temp-file-and-rename per update), and [`MemoryStore`] backs tests and
//! dry runs.

use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use tracing::info;

use crate::profile::SkillSecurityProfile;

/// Paged, per-record profile persistence.
pub trait ProfileStore {
    /// Fetch one page of profiles. Offsets are stable across updates within
    /// a run (updates replace in place, never reorder).
    fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<SkillSecurityProfile>>;

    /// Replace the stored record with the same id. Atomic per record: either
    /// the whole record is updated or nothing is.
    fn update(&mut self, profile: &SkillSecurityProfile) -> Result<()>;

    /// Insert a new record.
    fn insert(&mut self, profile: SkillSecurityProfile) -> Result<()>;

    fn count(&self) -> usize;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Vec-backed store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    profiles: Vec<SkillSecurityProfile>,
}

impl MemoryStore {
    pub fn new(profiles: Vec<SkillSecurityProfile>) -> Self {
        Self { profiles }
    }

    pub fn get(&self, slug: &str) -> Option<&SkillSecurityProfile> {
        self.profiles.iter().find(|p| p.slug == slug)
    }
}

impl ProfileStore for MemoryStore {
    fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<SkillSecurityProfile>> {
        Ok(self
            .profiles
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn update(&mut self, profile: &SkillSecurityProfile) -> Result<()> {
        let slot = self
            .profiles
            .iter_mut()
            .find(|p| p.id == profile.id)
            .ok_or_else(|| eyre::eyre!("No profile with id {}", profile.id))?;
        *slot = profile.clone();
        Ok(())
    }

    fn insert(&mut self, profile: SkillSecurityProfile) -> Result<()> {
        if self.profiles.iter().any(|p| p.slug == profile.slug) {
            return Err(eyre::eyre!("Duplicate slug {}", profile.slug));
        }
        self.profiles.push(profile);
        Ok(())
    }

    fn count(&self) -> usize {
        self.profiles.len()
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// File-backed store: the whole profile set as a JSON array, rewritten via
/// temp file and rename on each update so an interrupted run never leaves a
/// torn file behind.
pub struct JsonFileStore {
    path: PathBuf,
    profiles: Vec<SkillSecurityProfile>,
}

impl JsonFileStore {
    /// Open an existing store, or start empty when the file doesn't exist.
    pub fn open(path: &Path) -> Result<Self> {
        let profiles = if path.exists() {
            let data = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("Failed to read store at {}", path.display()))?;
            serde_json::from_str(&data)
                .wrap_err_with(|| format!("Corrupt profile store at {}", path.display()))?
        } else {
            Vec::new()
        };
        info!(path = %path.display(), profiles = profiles.len(), "profile store opened");
        Ok(Self {
            path: path.to_path_buf(),
            profiles,
        })
    }

    fn persist(&self) -> Result<()> {
        let data = serde_json::to_vec_pretty(&self.profiles)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &data)
            .wrap_err_with(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .wrap_err_with(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

impl ProfileStore for JsonFileStore {
    fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<SkillSecurityProfile>> {
        Ok(self
            .profiles
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn update(&mut self, profile: &SkillSecurityProfile) -> Result<()> {
        let slot = self
            .profiles
            .iter_mut()
            .find(|p| p.id == profile.id)
            .ok_or_else(|| eyre::eyre!("No profile with id {}", profile.id))?;
        *slot = profile.clone();
        self.persist()
    }

    fn insert(&mut self, profile: SkillSecurityProfile) -> Result<()> {
        if self.profiles.iter().any(|p| p.slug == profile.slug) {
            return Err(eyre::eyre!("Duplicate slug {}", profile.slug));
        }
        self.profiles.push(profile);
        self.persist()
    }

    fn count(&self) -> usize {
        self.profiles.len()
    }
}

/// Page through every profile in a store.
pub fn for_each_page<S: ProfileStore + ?Sized>(
    store: &S,
    page_size: usize,
    mut f: impl FnMut(Vec<SkillSecurityProfile>) -> Result<()>,
) -> Result<()> {
    let mut offset = 0;
    loop {
        let page = store.fetch_page(offset, page_size)?;
        if page.is_empty() {
            break;
        }
        let fetched = page.len();
        f(page)?;
        offset += fetched;
        if fetched < page_size {
            break;
        }
    }
    Ok(())
}
