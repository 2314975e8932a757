use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

/// Answer of an import resolver for one `@import` URL.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportResolution {
    pub url: String,
    pub body: String,
    pub resolved: bool,
}

impl ImportResolution {
    /// Let the compiler look the import up on disk itself.
    pub fn declined() -> ImportResolution {
        ImportResolution::default()
    }

    /// Load the stylesheet from another location.
    pub fn redirect<S: Into<String>>(url: S) -> ImportResolution {
        ImportResolution {
            url: url.into(),
            body: String::new(),
            resolved: true,
        }
    }

    /// Use `body` as the content of the imported stylesheet.
    pub fn contents<S: Into<String>, B: Into<String>>(url: S, body: B) -> ImportResolution {
        ImportResolution {
            url: url.into(),
            body: body.into(),
            resolved: true,
        }
    }
}

type ResolveFn = dyn Fn(&str, &str) -> ImportResolution + Send + Sync;

/// Host callback `(url, previous url) -> resolution` consulted for every import.
#[derive(Clone)]
pub struct ImportResolver(Arc<ResolveFn>);

impl ImportResolver {
    pub fn new<F>(f: F) -> ImportResolver
    where
        F: Fn(&str, &str) -> ImportResolution + Send + Sync + 'static,
    {
        ImportResolver(Arc::new(f))
    }

    pub fn resolve(&self, url: &str, prev: &str) -> ImportResolution {
        (self.0)(url, prev)
    }
}

impl std::fmt::Debug for ImportResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ImportResolver({:p})", Arc::as_ptr(&self.0))
    }
}

/// Slot number under which a resolver is registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResolverIndex(usize);

impl ResolverIndex {
    pub fn get(&self) -> usize {
        self.0
    }
}

#[derive(Default)]
struct Slots {
    entries: Vec<Option<ImportResolver>>,
    free: Vec<usize>,
}

// Compilers only ever see a `ResolverIndex`, never the callback itself.
static GLOBAL_REGISTRY: Lazy<Arc<ResolverRegistry>> =
    Lazy::new(|| Arc::new(ResolverRegistry::new()));

/// Table of import resolvers indexed by small integers.
///
/// Freed slots are reused, so the table never grows past the number of
/// resolvers registered at the same time.
pub struct ResolverRegistry {
    slots: Mutex<Slots>,
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.lock();
        write!(
            f,
            "ResolverRegistry {{ {} registered, {} slots }}",
            slots.entries.len() - slots.free.len(),
            slots.entries.len(),
        )
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        ResolverRegistry::new()
    }
}

impl ResolverRegistry {
    pub fn new() -> ResolverRegistry {
        ResolverRegistry {
            slots: Mutex::new(Slots::default()),
        }
    }

    /// Process-wide table, initialised on first use.
    pub fn global() -> Arc<ResolverRegistry> {
        GLOBAL_REGISTRY.clone()
    }

    pub fn register(&self, resolver: ImportResolver) -> ResolverHandle<'_> {
        let mut slots = self.slots.lock();
        let idx = match slots.free.pop() {
            Some(idx) => {
                slots.entries[idx] = Some(resolver);
                idx
            }
            None => {
                slots.entries.push(Some(resolver));
                slots.entries.len() - 1
            }
        };
        log::trace!("Registered import resolver in slot {idx}");
        ResolverHandle {
            registry: self,
            index: ResolverIndex(idx),
        }
    }

    pub fn get(&self, index: ResolverIndex) -> Option<ImportResolver> {
        self.slots
            .lock()
            .entries
            .get(index.0)
            .and_then(|slot| slot.clone())
    }

    /// Number of resolvers currently registered.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock();
        slots.entries.len() - slots.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots ever allocated.
    pub fn slots(&self) -> usize {
        self.slots.lock().entries.len()
    }

    fn release(&self, index: ResolverIndex) {
        let mut guard = self.slots.lock();
        let slots = &mut *guard;
        match slots.entries.get_mut(index.0) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                slots.free.push(index.0);
                log::trace!("Released import resolver slot {}", index.0);
            }
            _ => log::warn!("Import resolver slot {} released twice", index.0),
        }
    }
}

/// Keeps a resolver registered until dropped.
#[must_use = "the resolver is unregistered as soon as the handle is dropped"]
#[derive(Debug)]
pub struct ResolverHandle<'a> {
    registry: &'a ResolverRegistry,
    index: ResolverIndex,
}

impl ResolverHandle<'_> {
    pub fn index(&self) -> ResolverIndex {
        self.index
    }
}

impl Drop for ResolverHandle<'_> {
    fn drop(&mut self) {
        self.registry.release(self.index);
    }
}
