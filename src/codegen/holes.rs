use std::collections::BTreeMap;

use super::CodegenError;

/// Compilation-wide table of synthesis holes.
///
/// Every hole that ends up in a sketch is registered here exactly once,
/// under its fully prefixed name. Collisions are programmer errors and
/// fatal.
#[derive(Debug, Default, Clone)]
pub struct HoleRegistry {
    holes: BTreeMap<String, u32>,
}

impl HoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, width: u32) -> Result<(), CodegenError> {
        if self.holes.contains_key(name) {
            return Err(CodegenError {
                message: format!("hole '{name}' was registered twice"),
            });
        }
        self.holes.insert(name.to_owned(), width);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.holes.get(name).copied()
    }

    /// All registered hole names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.holes.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &u32)> {
        self.holes.iter()
    }

    /// The number of configuration bits the synthesizer has to fill.
    pub fn total_bits(&self) -> u32 {
        self.holes.values().sum()
    }

    pub fn len(&self) -> usize {
        self.holes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holes.is_empty()
    }
}

impl<'a> IntoIterator for &'a HoleRegistry {
    type Item = (&'a String, &'a u32);
    type IntoIter = std::collections::btree_map::Iter<'a, String, u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.holes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_hole_is_fatal() {
        let mut registry = HoleRegistry::new();
        registry.add("alu_0_0_Mux2_0_global", 1).expect("should work");

        assert!(registry.add("alu_0_0_Mux2_0_global", 1).is_err());
    }

    #[test]
    fn test_total_bits() {
        let mut registry = HoleRegistry::new();
        registry.add("a", 1).expect("should work");
        registry.add("b", 2).expect("should work");
        registry.add("c", 4).expect("should work");

        assert_eq!(registry.total_bits(), 7);
        assert_eq!(registry.names(), vec!["a", "b", "c"]);
    }
}
