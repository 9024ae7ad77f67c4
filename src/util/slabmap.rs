use std::{
    marker::PhantomData,
    ops::{Index, IndexMut},
};

use slab::Slab;

/// Arena of entries addressed by a typed id. Entries may point at each other
/// by id, which is how the context frames form their parent chain.
#[derive(Debug, Clone)]
pub struct SlabMap<K, V> {
    slab: Slab<V>,
    _p: PhantomData<K>,
}

impl<K, V> Default for SlabMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SlabMap<K, V> {
    pub fn new() -> Self {
        Self {
            slab: Slab::new(),
            _p: PhantomData,
        }
    }
}

impl<K, V> SlabMap<K, V>
where
    K: Copy + From<usize>,
    usize: From<K>,
{
    pub fn insert(&mut self, val: V) -> K {
        self.slab.insert(val).into()
    }
    pub fn remove(&mut self, key: K) -> Option<V> {
        self.slab.try_remove(key.into())
    }
    pub fn get(&self, key: K) -> Option<&V> {
        self.slab.get(key.into())
    }
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.slab.get_mut(key.into())
    }

    /// Follows `link` from `start` until it yields `None` or reaches a
    /// removed entry.
    pub fn chain<'a>(
        &'a self,
        start: K,
        link: impl Fn(&V) -> Option<K> + 'a,
    ) -> impl Iterator<Item = (K, &'a V)> + 'a {
        let mut next = Some(start);
        std::iter::from_fn(move || {
            let key = next?;
            let entry = self.get(key)?;
            next = link(entry);
            Some((key, entry))
        })
    }
}

impl<K, V> Index<K> for SlabMap<K, V>
where
    usize: From<K>,
{
    type Output = V;

    fn index(&self, index: K) -> &Self::Output {
        &self.slab[index.into()]
    }
}
impl<K, V> IndexMut<K> for SlabMap<K, V>
where
    usize: From<K>,
{
    fn index_mut(&mut self, index: K) -> &mut Self::Output {
        &mut self.slab[index.into()]
    }
}

#[cfg(test)]
mod tests {
    use super::SlabMap;

    #[test]
    fn chain_stops_at_removed_entries() {
        let mut map: SlabMap<usize, Option<usize>> = SlabMap::new();
        let root = map.insert(None);
        let mid = map.insert(Some(root));
        let leaf = map.insert(Some(mid));

        let walk = |map: &SlabMap<usize, Option<usize>>| {
            map.chain(leaf, |p| *p).map(|(k, _)| k).collect::<Vec<_>>()
        };
        assert_eq!(walk(&map), [leaf, mid, root]);
        map.remove(mid);
        assert_eq!(walk(&map), [leaf]);
    }
}
