//! Off-screen host containers.
//!
//! Every export operation creates its own container with a random unique id,
//! mounts one view at a time into it and removes it when the operation ends.
//! Both steps are tied to guards so cleanup runs on every exit path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::distr::Alphanumeric;
use rand::Rng;

use crate::error::{ExportError, Result};
use crate::view::{SectionKind, View};

/// An off-screen mount point with a fixed layout width (CSS px).
#[derive(Debug, Clone, PartialEq)]
pub struct HostContainer {
    pub id: String,
    pub width: f32,
    /// Section of the view currently mounted, if any.
    pub mounted: Option<SectionKind>,
}

/// Registry of live host containers.
#[derive(Debug, Default)]
pub struct HostEnvironment {
    containers: Mutex<HashMap<String, HostContainer>>,
}

impl HostEnvironment {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, HostContainer>> {
        self.containers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a container; it is removed when the returned guard drops.
    pub fn create_container(self: &Arc<Self>, width: f32) -> HostGuard {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(10)
            .map(char::from)
            .collect();
        let id = format!("export-host-{}", suffix.to_ascii_lowercase());

        self.lock().insert(
            id.clone(),
            HostContainer {
                id: id.clone(),
                width,
                mounted: None,
            },
        );
        log::debug!("Created host container {id}");
        HostGuard {
            env: Arc::clone(self),
            id,
        }
    }

    pub fn container(&self, id: &str) -> Option<HostContainer> {
        self.lock().get(id).cloned()
    }

    pub fn container_count(&self) -> usize {
        self.lock().len()
    }

    /// Remove a container. Returns false if it was already gone.
    pub fn remove(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Mount a view into a container; the view detaches when the guard drops.
    ///
    /// A missing container is a configuration error, not a content problem.
    pub fn mount<'a>(&'a self, id: &str, view: &'a View) -> Result<MountGuard<'a>> {
        let width = {
            let mut containers = self.lock();
            let container = containers
                .get_mut(id)
                .ok_or_else(|| ExportError::Configuration(format!("host container `{id}` not found")))?;
            container.mounted = Some(view.section);
            container.width
        };
        Ok(MountGuard {
            env: self,
            id: id.to_string(),
            view,
            width,
        })
    }

    fn detach(&self, id: &str) {
        if let Some(container) = self.lock().get_mut(id) {
            container.mounted = None;
        }
    }
}

/// Owns a host container for the duration of one export operation.
#[derive(Debug)]
pub struct HostGuard {
    env: Arc<HostEnvironment>,
    id: String,
}

impl HostGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for HostGuard {
    fn drop(&mut self) {
        if self.env.remove(&self.id) {
            log::debug!("Removed host container {}", self.id);
        }
    }
}

/// A view mounted into a host container, ready to be rasterized.
#[derive(Debug)]
pub struct MountGuard<'a> {
    env: &'a HostEnvironment,
    id: String,
    view: &'a View,
    width: f32,
}

impl<'a> MountGuard<'a> {
    pub fn view(&self) -> &'a View {
        self.view
    }

    /// Layout width of the container the view is mounted in.
    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn host_id(&self) -> &str {
        &self.id
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        self.env.detach(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Block;

    #[test]
    fn guard_removes_container() {
        let env = HostEnvironment::new();
        let a = env.create_container(794.0);
        let b = env.create_container(794.0);
        assert_ne!(a.id(), b.id());
        assert!(a.id().starts_with("export-host-"));
        assert_eq!(env.container_count(), 2);
        drop(a);
        assert_eq!(env.container_count(), 1);
        drop(b);
        assert_eq!(env.container_count(), 0);
    }

    #[test]
    fn mount_and_detach() {
        let env = HostEnvironment::new();
        let host = env.create_container(600.0);
        let view = View::new(SectionKind::Msa, Block::column(vec![]));
        {
            let mounted = env.mount(host.id(), &view).unwrap();
            assert_eq!(mounted.width(), 600.0);
            assert_eq!(env.container(host.id()).unwrap().mounted, Some(SectionKind::Msa));
        }
        assert_eq!(env.container(host.id()).unwrap().mounted, None);
    }

    #[test]
    fn missing_container_is_configuration_error() {
        let env = HostEnvironment::new();
        let view = View::new(SectionKind::Invoice, Block::column(vec![]));
        let err = env.mount("export-host-missing", &view).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn removing_twice_is_harmless() {
        let env = HostEnvironment::new();
        let host = env.create_container(100.0);
        assert!(env.remove(host.id()));
        drop(host);
        assert_eq!(env.container_count(), 0);
    }
}
