use core::fmt;
use spin::Mutex;

const MAX_COMPONENTS: usize = 8;

/// Kernel initialization status tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed(&'static str),
}

/// Kernel component status
#[derive(Debug, Clone, Copy)]
pub struct ComponentStatus {
    pub name: &'static str,
    pub status: InitStatus,
}

impl ComponentStatus {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            status: InitStatus::NotStarted,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, InitStatus::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, InitStatus::Failed(_))
    }
}

/// Fixed-capacity list of components in registration order.
pub struct ComponentRegistry {
    entries: [ComponentStatus; MAX_COMPONENTS],
    len: usize,
}

impl ComponentRegistry {
    pub const fn new() -> Self {
        Self {
            entries: [ComponentStatus::new(""); MAX_COMPONENTS],
            len: 0,
        }
    }

    pub fn components(&self) -> &[ComponentStatus] {
        &self.entries[..self.len]
    }

    pub fn register(&mut self, name: &'static str) -> bool {
        if self.components().iter().any(|c| c.name == name) {
            return true;
        }
        if self.len == MAX_COMPONENTS {
            return false;
        }
        self.entries[self.len] = ComponentStatus::new(name);
        self.len += 1;
        true
    }

    pub fn update(&mut self, name: &'static str, status: InitStatus) {
        if let Some(comp) = self.entries[..self.len].iter_mut().find(|c| c.name == name) {
            comp.status = status;
        }
    }

    pub fn status_of(&self, name: &str) -> Option<InitStatus> {
        self.components().iter().find(|c| c.name == name).map(|c| c.status)
    }

    pub fn all_ready(&self) -> bool {
        !self.components().is_empty() && self.components().iter().all(|c| c.is_complete())
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static INIT_STATUS: Mutex<ComponentRegistry> = Mutex::new(ComponentRegistry::new());

/// Track kernel component initialization
pub fn register_component(name: &'static str) {
    if !INIT_STATUS.lock().register(name) {
        log::warn!("status table full, not tracking {}", name);
    }
}

/// Update component status
pub fn update_component_status(name: &'static str, status: InitStatus) {
    INIT_STATUS.lock().update(name, status);
}

/// Check if all components are initialized
pub fn all_components_ready() -> bool {
    INIT_STATUS.lock().all_ready()
}

/// Log every component and its status.
pub fn report() {
    for comp in INIT_STATUS.lock().components() {
        if comp.is_failed() {
            log::error!("{:<14} {}", comp.name, comp.status);
        } else {
            log::info!("{:<14} {}", comp.name, comp.status);
        }
    }
    if !all_components_ready() {
        log::warn!("some kernel components are not ready");
    }
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStatus::NotStarted => write!(f, "Not Started"),
            InitStatus::InProgress => write!(f, "In Progress"),
            InitStatus::Completed => write!(f, "Completed"),
            InitStatus::Failed(err) => write!(f, "Failed: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_tracks_status() {
        let mut registry = ComponentRegistry::new();
        assert!(!registry.all_ready());

        registry.register("Heap");
        registry.register("Scheduler");
        registry.register("Heap");
        assert_eq!(registry.components().len(), 2);
        assert_eq!(registry.status_of("Heap"), Some(InitStatus::NotStarted));

        registry.update("Heap", InitStatus::Completed);
        registry.update("Scheduler", InitStatus::Failed("no stack"));
        assert!(!registry.all_ready());
        assert!(registry.components()[1].is_failed());

        registry.update("Scheduler", InitStatus::Completed);
        assert!(registry.all_ready());
        assert_eq!(registry.status_of("Interrupts"), None);
    }

    #[test]
    fn test_registry_capacity() {
        let mut registry = ComponentRegistry::new();
        let names = ["a", "b", "c", "d", "e", "f", "g", "h"];
        assert!(names.iter().all(|&name| registry.register(name)));
        assert!(!registry.register("i"));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(InitStatus::Failed("boom").to_string(), "Failed: boom");
        assert_eq!(InitStatus::Completed.to_string(), "Completed");
    }
}
