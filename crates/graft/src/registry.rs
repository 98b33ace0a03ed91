//! Process-wide module registry and load events.
//!
//! Every module load funnels through [`ModuleRegistry::load`], which stores
//! the module and then emits a "module became available" event to each
//! subscribed [`LoadObserver`]. Observers receive mutable access to the
//! freshly loaded module only — they can install wrappers on its symbols but
//! cannot alter which module was loaded, reach other registry entries, or
//! trigger further loads from inside the event. That makes the hook point
//! undetectable to loaders: a load returns exactly the module that was
//! loaded, observers or not.

use indexmap::IndexMap;

use crate::module::Module;

/// Observer notified after each module load completes.
///
/// The `name` identifies the subscriber: [`ModuleRegistry::subscribe`]
/// refuses a second observer with the same name, so an engine that lazily
/// hooks on every operation installs itself exactly once.
pub trait LoadObserver {
    /// The subscriber's identity for the double-subscribe guard.
    fn name(&self) -> &str;

    /// Called synchronously, on the loading thread, after `module` has been
    /// stored in the registry.
    fn module_loaded(&mut self, module: &mut Module);
}

/// Registry of loaded modules, keyed by module name.
///
/// Insertion-ordered; owned by the host for the process lifetime. Nothing
/// here is persisted.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: IndexMap<String, Module>,
    observers: Vec<Box<dyn LoadObserver>>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .field("observers", &self.observers.iter().map(|o| o.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl ModuleRegistry {
    /// Creates an empty registry with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a module: stores it under its name and notifies every
    /// subscribed observer.
    ///
    /// Loading a name again replaces the stored module and fires the event
    /// again — each load of a name is its own availability event, applying
    /// only to the module introduced by that load.
    pub fn load(&mut self, module: Module) -> &mut Module {
        let name = module.name().to_owned();
        self.modules.insert(name.clone(), module);

        // Observers run against the stored module so wrappers they install
        // land in the registry's binding, not a temporary.
        let mut observers = std::mem::take(&mut self.observers);
        let stored = self.modules.get_mut(&name).expect("module stored above");
        for observer in &mut observers {
            observer.module_loaded(stored);
        }
        self.observers = observers;

        self.modules.get_mut(&name).expect("module stored above")
    }

    /// Looks up a loaded module.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    /// Looks up a loaded module mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.modules.get_mut(name)
    }

    /// Returns whether a module with this name has been loaded.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Subscribes a load observer, unless one with the same name is already
    /// installed. Returns whether the observer was installed.
    pub fn subscribe(&mut self, observer: Box<dyn LoadObserver>) -> bool {
        if self.observers.iter().any(|o| o.name() == observer.name()) {
            return false;
        }
        self.observers.push(observer);
        true
    }

    /// Returns whether an observer with this name is subscribed.
    #[must_use]
    pub fn is_subscribed(&self, name: &str) -> bool {
        self.observers.iter().any(|o| o.name() == name)
    }
}
