//! Ruby hashes: a key/value table with pluggable key equality and a
//! default value or default proc for missing keys.

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use hashbrown::HashTable;

use crate::{HashRef, ProcRef, RubyError, RubyResult, Shared, Value};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HashFlags: u8 {
        const FROZEN = 1 << 0;
        const TAINTED = 1 << 1;
        const UNTRUSTED = 1 << 2;
    }
}

/// Key equality used by a [`RubyHash`]. Keys that are equal must hash
/// equal.
pub trait EqualityStrategy: Send + Sync + fmt::Debug {
    fn equals(&self, a: &Value, b: &Value) -> bool;
    fn hash_of(&self, value: &Value) -> u64;
}

/// `eql?` semantics: strings by content, numbers by type and value, arrays
/// element-wise, everything else by identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEquality;

/// Hash contribution of an array met again while hashing its own elements.
const RECURSIVE_ARRAY: u64 = 0x7265_6375_7273_6976;

impl DefaultEquality {
    /// `path` holds the array pairs being compared further up, so a pair
    /// met again compares equal instead of recursing forever.
    fn equals_on(&self, a: &Value, b: &Value, path: &mut Vec<(usize, usize)>) -> bool {
        match (a, b) {
            (Value::String(x), Value::String(y)) => {
                x.ptr_eq(y) || *x.read() == *y.read()
            }
            (Value::Array(x), Value::Array(y)) => {
                if x.ptr_eq(y) {
                    return true;
                }
                let pair = (x.object_id(), y.object_id());
                if path.contains(&pair) {
                    return true;
                }
                path.push(pair);
                let (x, y) = (x.read(), y.read());
                let equal = x.len() == y.len()
                    && x.iter().zip(y.iter()).all(|(a, b)| self.equals_on(a, b, path));
                path.pop();
                equal
            }
            _ => a.identical(b),
        }
    }

    /// `path` holds the arrays being hashed further up; one met again
    /// contributes a fixed marker.
    fn hash_on(&self, value: &Value, path: &mut Vec<usize>) -> u64 {
        let mut hasher = ahash::AHasher::default();
        std::mem::discriminant(value).hash(&mut hasher);
        match value {
            Value::Nil => {}
            Value::Bool(b) => b.hash(&mut hasher),
            Value::Fixnum(n) => n.hash(&mut hasher),
            Value::Float(f) => f.to_bits().hash(&mut hasher),
            Value::Symbol(id) => id.hash(&mut hasher),
            Value::String(s) => hasher.write_u64(s.read().hash_code()),
            Value::Array(a) => {
                let id = a.object_id();
                if path.contains(&id) {
                    hasher.write_u64(RECURSIVE_ARRAY);
                } else {
                    path.push(id);
                    for item in a.read().iter() {
                        hasher.write_u64(self.hash_on(item, path));
                    }
                    path.pop();
                }
            }
            Value::Hash(h) => hasher.write_usize(h.object_id()),
            Value::Proc(p) => hasher.write_usize(p.object_id()),
        }
        hasher.finish()
    }
}

impl EqualityStrategy for DefaultEquality {
    fn equals(&self, a: &Value, b: &Value) -> bool {
        self.equals_on(a, b, &mut Vec::new())
    }

    fn hash_of(&self, value: &Value) -> u64 {
        self.hash_on(value, &mut Vec::new())
    }
}

#[derive(Debug, Clone)]
struct Entry {
    hash: u64,
    key: Value,
    value: Value,
}

#[derive(Debug, Clone)]
pub struct RubyHash {
    table: HashTable<Entry>,
    strategy: Arc<dyn EqualityStrategy>,
    default_value: Option<Value>,
    default_proc: Option<ProcRef>,
    flags: HashFlags,
}

impl Default for RubyHash {
    fn default() -> Self {
        Self::new()
    }
}

impl RubyHash {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_strategy(capacity, Arc::new(DefaultEquality))
    }

    pub fn with_strategy(capacity: usize, strategy: Arc<dyn EqualityStrategy>) -> Self {
        Self {
            table: HashTable::with_capacity(capacity),
            strategy,
            default_value: None,
            default_proc: None,
            flags: HashFlags::empty(),
        }
    }

    /// Hash over `pairs`; a later pair replaces an earlier equal key.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut hash = Self::new();
        for (key, value) in pairs {
            hash.store(key, value);
        }
        hash
    }

    /// Copy of the pairs, defaults and taint. The copy is never frozen.
    pub fn duplicate(&self) -> Self {
        let mut copy = self.clone();
        copy.flags.remove(HashFlags::FROZEN);
        copy
    }

    // flags

    pub fn is_frozen(&self) -> bool {
        self.flags.contains(HashFlags::FROZEN)
    }

    pub fn freeze(&mut self) {
        self.flags.insert(HashFlags::FROZEN);
    }

    pub fn require_not_frozen(&self) -> RubyResult<()> {
        if self.is_frozen() {
            return Err(RubyError::frozen("Hash"));
        }
        Ok(())
    }

    pub fn is_tainted(&self) -> bool {
        self.flags.contains(HashFlags::TAINTED)
    }

    pub fn taint(&mut self) {
        self.flags.insert(HashFlags::TAINTED);
    }

    pub fn is_untrusted(&self) -> bool {
        self.flags.contains(HashFlags::UNTRUSTED)
    }

    pub fn untrust(&mut self) {
        self.flags.insert(HashFlags::UNTRUSTED);
    }

    // lookup

    fn find(&self, key: &Value) -> Option<&Entry> {
        let hash = self.strategy.hash_of(key);
        self.table
            .find(hash, |entry| entry.hash == hash && self.strategy.equals(&entry.key, key))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.find(key).is_some()
    }

    /// Stored value, without any default.
    pub fn lookup(&self, key: &Value) -> Option<&Value> {
        self.find(key).map(|entry| &entry.value)
    }

    /// Stored value or the default value. Never inserts and never runs the
    /// default proc, see [`Shared::fetch`] for that.
    pub fn get(&self, key: &Value) -> Value {
        match self.lookup(key) {
            Some(value) => value.clone(),
            None => self.default_value(),
        }
    }

    // mutation

    /// Unfrozen string keys are stored as frozen copies, so mutating the
    /// original string cannot move the key.
    fn prepare_key(key: Value) -> Value {
        if let Value::String(s) = &key {
            if !s.read().is_frozen() {
                return Value::string(s.read().duplicate().frozen());
            }
        }
        key
    }

    fn store(&mut self, key: Value, value: Value) {
        let hash = self.strategy.hash_of(&key);
        let strategy = &self.strategy;
        match self.table.entry(
            hash,
            |entry| entry.hash == hash && strategy.equals(&entry.key, &key),
            |entry| entry.hash,
        ) {
            hashbrown::hash_table::Entry::Occupied(mut slot) => {
                slot.get_mut().value = value;
            }
            hashbrown::hash_table::Entry::Vacant(slot) => {
                slot.insert(Entry {
                    hash,
                    key: Self::prepare_key(key),
                    value,
                });
            }
        }
    }

    pub fn set(&mut self, key: Value, value: Value) -> RubyResult<()> {
        self.require_not_frozen()?;
        self.store(key, value);
        Ok(())
    }

    pub fn remove(&mut self, key: &Value) -> RubyResult<Option<Value>> {
        self.require_not_frozen()?;
        let hash = self.strategy.hash_of(key);
        let strategy = &self.strategy;
        match self
            .table
            .find_entry(hash, |entry| entry.hash == hash && strategy.equals(&entry.key, key))
        {
            Ok(slot) => Ok(Some(slot.remove().0.value)),
            Err(_) => Ok(None),
        }
    }

    pub fn clear(&mut self) -> RubyResult<()> {
        self.require_not_frozen()?;
        self.table.clear();
        Ok(())
    }

    /// Copies every pair of `other` into `self`, replacing equal keys.
    pub fn merge_from(&mut self, other: &RubyHash) -> RubyResult<()> {
        self.require_not_frozen()?;
        for (key, value) in other.iter() {
            self.store(key.clone(), value.clone());
        }
        Ok(())
    }

    /// Swaps the key equality and rehashes every pair under it.
    pub fn set_equality_strategy(
        &mut self,
        strategy: Arc<dyn EqualityStrategy>,
    ) -> RubyResult<()> {
        self.require_not_frozen()?;
        log::debug!("rehashing {} entries under {:?}", self.len(), strategy);
        let entries = std::mem::take(&mut self.table);
        self.strategy = strategy;
        self.table.reserve(entries.len(), |entry| entry.hash);
        for entry in entries {
            self.store(entry.key, entry.value);
        }
        Ok(())
    }

    pub fn equality_strategy(&self) -> &Arc<dyn EqualityStrategy> {
        &self.strategy
    }

    // iteration

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.table.iter().map(|entry| (&entry.key, &entry.value))
    }

    pub fn keys(&self) -> Vec<Value> {
        self.iter().map(|(key, _)| key.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.iter().map(|(_, value)| value.clone()).collect()
    }

    // defaults

    /// The default value, `nil` when none was set.
    pub fn default_value(&self) -> Value {
        self.default_value.clone().unwrap_or_default()
    }

    pub fn set_default_value(&mut self, value: Option<Value>) -> RubyResult<()> {
        self.require_not_frozen()?;
        self.default_value = value;
        Ok(())
    }

    /// The default proc as a value of its own, `nil` when none was set.
    pub fn default_proc(&self) -> Value {
        self.default_proc.clone().map_or(Value::Nil, Value::Proc)
    }

    pub fn set_default_proc(&mut self, proc: Option<ProcRef>) -> RubyResult<()> {
        self.require_not_frozen()?;
        self.default_proc = proc;
        Ok(())
    }
}

impl Shared<RubyHash> {
    /// Stored value, else the default proc's result for `(hash, key)`,
    /// else the default value. The proc runs without the hash locked, so it
    /// may store into the hash.
    pub fn fetch(&self, key: &Value) -> RubyResult<Value> {
        let generator = {
            let hash = self.read();
            if let Some(value) = hash.lookup(key) {
                return Ok(value.clone());
            }
            match &hash.default_proc {
                Some(proc) => proc.read().clone(),
                None => return Ok(hash.default_value()),
            }
        };
        let this: HashRef = self.clone();
        generator.call2(Value::Hash(this), key.clone())?.into_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlockContext, BlockDispatcher, BlockResult, MutableString, Proc, Scope};
    use proptest::prelude::*;

    #[test]
    fn default_value_is_a_read_fallback() {
        let mut hash = RubyHash::new();
        hash.set_default_value(Some(Value::Fixnum(0))).unwrap();
        assert!(matches!(hash.get(&Value::Fixnum(9)), Value::Fixnum(0)));
        assert!(!hash.contains_key(&Value::Fixnum(9)));
        assert_eq!(hash.len(), 0);
        assert!(hash.keys().is_empty());
    }

    #[test]
    fn string_keys_compare_by_content() {
        let mut hash = RubyHash::new();
        hash.set(Value::str("a"), Value::Fixnum(1)).unwrap();
        let bytes = MutableString::from_bytes(b"a".to_vec(), &crate::encoding::UTF_8);
        assert!(matches!(hash.get(&Value::string(bytes)), Value::Fixnum(1)));
        hash.set(Value::str("a"), Value::Fixnum(2)).unwrap();
        assert_eq!(hash.len(), 1, "equal key replaces the value");
    }

    #[test]
    fn string_keys_are_frozen_copies() {
        let key = Value::str("k");
        let mut hash = RubyHash::new();
        hash.set(key.clone(), Value::Nil).unwrap();
        key.as_string().unwrap().write().append_char('!').unwrap();
        assert!(hash.contains_key(&Value::str("k")));
        let stored = hash.keys().remove(0);
        assert!(stored.as_string().unwrap().read().is_frozen());
        assert!(!stored.identical(&key));
    }

    #[test]
    fn frozen_hash_rejects_set() {
        let mut hash = RubyHash::new();
        hash.set(Value::Fixnum(1), Value::Fixnum(10)).unwrap();
        hash.freeze();
        let err = hash.set(Value::Fixnum(1), Value::Fixnum(20)).unwrap_err();
        assert_eq!(err.to_string(), "can't modify frozen Hash");
        assert!(matches!(hash.get(&Value::Fixnum(1)), Value::Fixnum(10)));
        assert!(hash.remove(&Value::Fixnum(1)).is_err());
        assert!(hash.clear().is_err());
        assert!(!hash.duplicate().is_frozen());
    }

    #[test]
    fn remove_and_clear() {
        let mut hash = RubyHash::from_pairs([
            (Value::Fixnum(1), Value::str("one")),
            (Value::Fixnum(2), Value::str("two")),
        ]);
        let removed = hash.remove(&Value::Fixnum(1)).unwrap().unwrap();
        assert_eq!(removed.as_string().unwrap().read().to_string(), "one");
        assert!(hash.remove(&Value::Fixnum(1)).unwrap().is_none());
        hash.clear().unwrap();
        assert!(hash.is_empty());
    }

    #[test]
    fn arrays_are_structural_keys() {
        let mut hash = RubyHash::new();
        let key = Value::array(vec![Value::Fixnum(1), Value::str("x")]);
        hash.set(key, Value::Bool(true)).unwrap();
        let probe = Value::array(vec![Value::Fixnum(1), Value::str("x")]);
        assert!(hash.contains_key(&probe));
        assert!(!hash.contains_key(&Value::Float(1.0)));
    }

    #[derive(Debug)]
    struct CaseInsensitive;

    impl EqualityStrategy for CaseInsensitive {
        fn equals(&self, a: &Value, b: &Value) -> bool {
            match (a, b) {
                (Value::String(x), Value::String(y)) => {
                    x.read().to_string().eq_ignore_ascii_case(&y.read().to_string())
                }
                _ => a.identical(b),
            }
        }

        fn hash_of(&self, value: &Value) -> u64 {
            match value {
                Value::String(s) => {
                    let mut hasher = ahash::AHasher::default();
                    s.read().to_string().to_ascii_lowercase().hash(&mut hasher);
                    hasher.finish()
                }
                other => DefaultEquality.hash_of(other),
            }
        }
    }

    #[test]
    fn strategy_swap_rehashes() {
        let mut hash = RubyHash::from_pairs([(Value::str("Key"), Value::Fixnum(1))]);
        assert!(!hash.contains_key(&Value::str("KEY")));
        hash.set_equality_strategy(Arc::new(CaseInsensitive)).unwrap();
        assert!(hash.contains_key(&Value::str("KEY")));
        hash.set(Value::str("key"), Value::Fixnum(2)).unwrap();
        assert_eq!(hash.len(), 1);
    }

    #[test]
    fn frozen_hash_keeps_its_strategy() {
        let mut hash = RubyHash::from_pairs([(Value::str("Key"), Value::Fixnum(1))]);
        hash.freeze();
        let err = hash.set_equality_strategy(Arc::new(CaseInsensitive)).unwrap_err();
        assert_eq!(err.to_string(), "can't modify frozen Hash");
        assert!(!hash.contains_key(&Value::str("KEY")), "old strategy still in place");
    }

    #[test]
    fn self_containing_array_is_a_usable_key() {
        let a = Value::array(vec![Value::Fixnum(1)]);
        a.as_array().unwrap().write().push(a.clone());
        let mut hash = RubyHash::new();
        hash.set(a.clone(), Value::str("loop")).unwrap();
        assert!(hash.contains_key(&a));
        assert_eq!(DefaultEquality.hash_of(&a), DefaultEquality.hash_of(&a));

        let b = Value::array(vec![Value::Fixnum(1)]);
        b.as_array().unwrap().write().push(b.clone());
        assert!(DefaultEquality.equals(&a, &b));
        assert_eq!(DefaultEquality.hash_of(&a), DefaultEquality.hash_of(&b));
        assert!(hash.contains_key(&b));
    }

    #[test]
    fn merge_and_duplicate_keep_defaults() {
        let mut a = RubyHash::from_pairs([(Value::Fixnum(1), Value::Fixnum(1))]);
        a.set_default_value(Some(Value::Fixnum(-1))).unwrap();
        a.taint();
        let b = RubyHash::from_pairs([
            (Value::Fixnum(1), Value::Fixnum(10)),
            (Value::Fixnum(2), Value::Fixnum(20)),
        ]);
        a.merge_from(&b).unwrap();
        assert!(matches!(a.get(&Value::Fixnum(1)), Value::Fixnum(10)));
        let copy = a.duplicate();
        assert_eq!(copy.len(), 2);
        assert!(copy.is_tainted());
        assert!(matches!(copy.get(&Value::Fixnum(7)), Value::Fixnum(-1)));
    }

    fn memoizing_proc() -> ProcRef {
        let body = Arc::new(|_: &BlockContext, args: Vec<Value>| -> RubyResult<BlockResult> {
            let hash = args[0].as_hash()?.clone();
            let key = args[1].as_fixnum()?;
            let value = Value::Fixnum(key * 2);
            hash.write().set(args[1].clone(), value.clone())?;
            Ok(BlockResult::Normal(value))
        });
        let proc = Proc::new_block(Value::Nil, Scope::top_level(Value::Nil), BlockDispatcher::new(2), body);
        Shared::new(proc)
    }

    #[test]
    fn fetch_runs_default_proc_unlocked() {
        let hash: HashRef = Shared::new(RubyHash::new());
        hash.write().set_default_proc(Some(memoizing_proc())).unwrap();
        assert!(matches!(hash.fetch(&Value::Fixnum(21)).unwrap(), Value::Fixnum(42)));
        assert!(hash.read().contains_key(&Value::Fixnum(21)), "proc stored the key");
        assert!(matches!(hash.read().get(&Value::Fixnum(5)), Value::Nil));
        assert!(matches!(hash.read().default_proc(), Value::Proc(_)));
    }

    #[test]
    fn default_value_and_proc_are_independent() {
        let mut hash = RubyHash::new();
        hash.set_default_value(Some(Value::Fixnum(3))).unwrap();
        hash.set_default_proc(Some(memoizing_proc())).unwrap();
        assert!(matches!(hash.default_value(), Value::Fixnum(3)));
        hash.set_default_proc(None).unwrap();
        assert!(matches!(hash.default_value(), Value::Fixnum(3)));
        assert!(hash.default_proc().is_nil());
    }

    proptest! {
        #[test]
        fn structurally_equal_arrays_hash_equal(items in proptest::collection::vec(any::<i64>(), 0..6), text in "[a-z]{0,4}") {
            let build = || {
                let mut values: Vec<Value> = items.iter().copied().map(Value::Fixnum).collect();
                values.push(Value::str(&text));
                Value::array(values)
            };
            let (a, b) = (build(), build());
            prop_assert!(DefaultEquality.equals(&a, &b));
            prop_assert_eq!(DefaultEquality.hash_of(&a), DefaultEquality.hash_of(&b));
        }
    }
}
