use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use crate::counters::SYMBOL_IDS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u64);

#[derive(Debug, Default)]
struct SymbolTableImpl {
    names: HashMap<SymbolId, Arc<str>>,
    ids: HashMap<Arc<str>, SymbolId>,
}

/// Shared name table. Ids come from the process-wide counter, so ids from
/// two tables never collide.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable(Arc<RwLock<SymbolTableImpl>>);

impl SymbolId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl SymbolTableImpl {
    fn get_or_add(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = SymbolId(SYMBOL_IDS.next());
        let name: Arc<str> = Arc::from(name);
        self.ids.insert(name.clone(), id);
        self.names.insert(id, name);
        id
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, name: &str) -> SymbolId {
        if let Some(&id) = self.0.read().ids.get(name) {
            return id;
        }
        self.0.write().get_or_add(name)
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.0.read().ids.get(name).copied()
    }

    pub fn name(&self, id: SymbolId) -> Option<Arc<str>> {
        self.0.read().names.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.read().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn interning_is_idempotent() {
        let table = SymbolTable::new();
        let a = table.intern("each");
        let b = table.intern("each");
        let c = table.intern("map");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.name(a).as_deref(), Some("each"));
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("select"), None);
    }

    #[test]
    fn tables_share_the_id_space() {
        let first = SymbolTable::new();
        let second = SymbolTable::new();
        assert_ne!(first.intern("x"), second.intern("x"));
    }

    #[test]
    fn concurrent_interning_agrees() {
        let table = SymbolTable::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let table = table.clone();
                thread::spawn(move || table.intern("shared"))
            })
            .collect();
        let ids: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("worker panicked"))
            .collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }
}
