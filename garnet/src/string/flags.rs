use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StringFlags: u32 {
        const FROZEN = 1 << 0;
        const TAINTED = 1 << 1;
        const UNTRUSTED = 1 << 2;
        const ASCII_KNOWN = 1 << 3;
        const IS_ASCII = 1 << 4;
        const SUPPLEMENTARY_KNOWN = 1 << 5;
        const HAS_SUPPLEMENTARY = 1 << 6;

        const TAINT_FLAGS = Self::TAINTED.bits() | Self::UNTRUSTED.bits();
        const CACHED = Self::ASCII_KNOWN.bits()
            | Self::IS_ASCII.bits()
            | Self::SUPPLEMENTARY_KNOWN.bits()
            | Self::HAS_SUPPLEMENTARY.bits();
    }
}

/// Flag word that readers may fill in through a shared reference.
#[derive(Debug, Default)]
pub(crate) struct FlagCell(AtomicU32);

/// Hash code memoized against the string's version counter.
#[derive(Debug, Default)]
pub(crate) struct HashCache {
    value: AtomicU64,
    // version + 1, 0 while empty
    stamp: AtomicU64,
}

impl FlagCell {
    pub fn new(flags: StringFlags) -> Self {
        Self(AtomicU32::new(flags.bits()))
    }

    pub fn get(&self) -> StringFlags {
        StringFlags::from_bits_retain(self.0.load(Ordering::Acquire))
    }

    pub fn contains(&self, flags: StringFlags) -> bool {
        self.get().contains(flags)
    }

    pub fn insert(&self, flags: StringFlags) {
        self.0.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub fn remove(&self, flags: StringFlags) {
        self.0.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    pub fn set(&self, flags: StringFlags, value: bool) {
        if value {
            self.insert(flags)
        } else {
            self.remove(flags)
        }
    }

    /// Records a computed property: `known` is set and `value` follows
    /// `state`.
    pub fn learn(&self, known: StringFlags, value: StringFlags, state: bool) {
        self.set(value, state);
        self.insert(known);
    }

    pub fn forget(&self, known: StringFlags, value: StringFlags) {
        self.remove(known | value);
    }
}

impl Clone for FlagCell {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl HashCache {
    pub fn get(&self, version: u64) -> Option<u64> {
        (self.stamp.load(Ordering::Acquire) == version.wrapping_add(1))
            .then(|| self.value.load(Ordering::Relaxed))
    }

    pub fn store(&self, version: u64, value: u64) {
        self.value.store(value, Ordering::Relaxed);
        self.stamp.store(version.wrapping_add(1), Ordering::Release);
    }
}

impl Clone for HashCache {
    fn clone(&self) -> Self {
        Self {
            value: AtomicU64::new(self.value.load(Ordering::Relaxed)),
            stamp: AtomicU64::new(self.stamp.load(Ordering::Acquire)),
        }
    }
}
