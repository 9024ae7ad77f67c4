use std::{
    fmt::Display,
    hash::{Hash, Hasher},
    rc::Rc,
};

/// A named scoreboard cell. Equality only looks at the name.
#[derive(Debug, Clone)]
pub struct CellAddress {
    pub name: Rc<str>,
    /// Temporaries belong to the expression that produced them and may be
    /// mutated in place.
    pub temporary: bool,
}

/// A path inside the compiler's structured storage.
#[derive(Debug, Clone)]
pub struct StorageAddress {
    pub path: Rc<str>,
    pub temporary: bool,
}

impl CellAddress {
    pub fn named(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            temporary: false,
        }
    }
    pub fn temporary(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            temporary: true,
        }
    }
    pub fn pinned(&self) -> Self {
        Self {
            name: self.name.clone(),
            temporary: false,
        }
    }
}

impl StorageAddress {
    pub fn named(path: impl Into<Rc<str>>) -> Self {
        Self {
            path: path.into(),
            temporary: false,
        }
    }
    pub fn temporary(path: impl Into<Rc<str>>) -> Self {
        Self {
            path: path.into(),
            temporary: true,
        }
    }
    pub fn pinned(&self) -> Self {
        Self {
            path: self.path.clone(),
            temporary: false,
        }
    }
}

impl PartialEq for CellAddress {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for CellAddress {}
impl Hash for CellAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl PartialEq for StorageAddress {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}
impl Eq for StorageAddress {}
impl Hash for StorageAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state)
    }
}

impl Display for CellAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
impl Display for StorageAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// Where a variable lives at runtime: a cell for numeric kinds and a storage
/// path for everything else. Aggregates derive one slot per member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    pub cell: CellAddress,
    pub storage: StorageAddress,
}

impl Slot {
    pub fn new(cell: impl Into<Rc<str>>, storage: impl Into<Rc<str>>) -> Self {
        Self {
            cell: CellAddress::named(cell),
            storage: StorageAddress::named(storage),
        }
    }

    pub fn member(&self, field: &str) -> Self {
        Self::new(
            format!("{}.{}", self.cell.name, field),
            format!("{}.{}", self.storage.path, field),
        )
    }

    pub fn element(&self, index: usize) -> Self {
        Self::new(
            format!("{}.e{}", self.cell.name, index),
            format!("{}.e{}", self.storage.path, index),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_slots_extend_both_paths() {
        let slot = Slot::new(".exp3_p", "3_p");
        let x = slot.member("pos").element(1);
        assert_eq!(&*x.cell.name, ".exp3_p.pos.e1");
        assert_eq!(&*x.storage.path, "3_p.pos.e1");
        assert!(!x.cell.temporary);
    }

    #[test]
    fn temporaries_compare_by_name() {
        let a = CellAddress::named(".tmp0");
        assert_eq!(a, CellAddress::temporary(".tmp0"));
        assert_ne!(a, CellAddress::named(".tmp1"));
    }
}
