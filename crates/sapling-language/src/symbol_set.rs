use crate::Symbol;

/// A growable bitset of symbols.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct SymbolSet {
    bits: Vec<u64>,
}

impl SymbolSet {
    const BITS_PER_SLOT: usize = u64::BITS as usize;

    pub const fn new() -> Self {
        Self { bits: Vec::new() }
    }

    /// A set pre-sized to hold symbols below `symbol_count`.
    pub fn with_capacity(symbol_count: usize) -> Self {
        Self { bits: vec![0; symbol_count.div_ceil(Self::BITS_PER_SLOT)] }
    }

    const fn slot(symbol: Symbol) -> (usize, u64) {
        let index = symbol.index();
        (index / Self::BITS_PER_SLOT, 1 << (index % Self::BITS_PER_SLOT))
    }

    /// Returns `true` if `symbol` was not already present.
    pub fn insert(&mut self, symbol: Symbol) -> bool {
        let (slot, mask) = Self::slot(symbol);
        if slot >= self.bits.len() {
            self.bits.resize(slot + 1, 0);
        }
        let absent = self.bits[slot] & mask == 0;
        self.bits[slot] |= mask;
        absent
    }

    pub fn remove(&mut self, symbol: Symbol) -> bool {
        let (slot, mask) = Self::slot(symbol);
        match self.bits.get_mut(slot) {
            Some(bits) if *bits & mask != 0 => {
                *bits &= !mask;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        let (slot, mask) = Self::slot(symbol);
        self.bits.get(slot).is_some_and(|bits| bits & mask != 0)
    }

    pub fn union_with(&mut self, other: &Self) {
        if other.bits.len() > self.bits.len() {
            self.bits.resize(other.bits.len(), 0);
        }
        for (bits, other) in self.bits.iter_mut().zip(&other.bits) {
            *bits |= other;
        }
    }

    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.bits.iter().zip(&other.bits).all(|(a, b)| a & b == 0)
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&bits| bits == 0)
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|bits| bits.count_ones() as usize).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.bits.iter().enumerate().flat_map(|(slot, &bits)| {
            (0..Self::BITS_PER_SLOT)
                .filter(move |bit| bits & (1 << bit) != 0)
                .map(move |bit| Symbol((slot * Self::BITS_PER_SLOT + bit) as u16))
        })
    }
}

impl FromIterator<Symbol> for SymbolSet {
    fn from_iter<I: IntoIterator<Item = Symbol>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<Symbol> for SymbolSet {
    fn extend<I: IntoIterator<Item = Symbol>>(&mut self, iter: I) {
        for symbol in iter {
            self.insert(symbol);
        }
    }
}

impl std::fmt::Debug for SymbolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_contains_remove() {
        let mut set = SymbolSet::with_capacity(10);
        assert!(set.insert(Symbol(3)));
        assert!(!set.insert(Symbol(3)));
        assert!(set.insert(Symbol(200)));

        assert!(set.contains(Symbol(3)));
        assert!(set.contains(Symbol(200)));
        assert!(!set.contains(Symbol(4)));
        assert!(!set.contains(Symbol(5000)));
        assert_eq!(set.len(), 2);

        assert!(set.remove(Symbol(3)));
        assert!(!set.remove(Symbol(3)));
        assert_eq!(set.iter().collect::<Vec<_>>(), [Symbol(200)]);
    }

    #[test]
    fn union_and_disjoint() {
        let mut a: SymbolSet = [Symbol(1), Symbol(2)].into_iter().collect();
        let b: SymbolSet = [Symbol(70)].into_iter().collect();
        assert!(a.is_disjoint(&b));

        a.union_with(&b);
        assert!(!a.is_disjoint(&b));
        assert_eq!(a.iter().collect::<Vec<_>>(), [Symbol(1), Symbol(2), Symbol(70)]);
    }
}
