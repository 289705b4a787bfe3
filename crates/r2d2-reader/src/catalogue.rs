//! Variable catalogue of the remapped 3D products.

use serde::Serialize;

use crate::error::{ReaderError, Result};

/// Names of the primary variables in storage order. Runs store the first
/// `mtype` of them.
pub const PRIMARY_VARIABLES: [&str; 9] = ["ro", "vx", "vy", "vz", "bx", "by", "bz", "se", "ph"];

/// Quantities stored after the primary block in every fragment.
pub const DERIVED_VARIABLES: [&str; 3] = ["pr", "te", "op"];

/// Where a variable lives inside a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Field {
    /// Slot of the primary block.
    Primary(usize),
    /// Position among the trailing derived blocks.
    Derived(usize),
}

/// Variable selection for a read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Variables {
    /// Every variable in the catalogue.
    #[default]
    All,
    Only(Vec<String>),
}

impl From<&str> for Variables {
    fn from(name: &str) -> Self {
        if name == "all" {
            Self::All
        } else {
            Self::Only(vec![name.to_string()])
        }
    }
}

impl From<&[&str]> for Variables {
    fn from(names: &[&str]) -> Self {
        Self::Only(names.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Variables {
    fn from(names: [&str; N]) -> Self {
        Self::Only(names.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<String>> for Variables {
    fn from(names: Vec<String>) -> Self {
        Self::Only(names)
    }
}

/// Names and fragment positions of the readable variables.
#[derive(Debug, Clone, Serialize)]
pub struct VariableCatalogue {
    mtype: usize,
    primary: Vec<&'static str>,
}

impl VariableCatalogue {
    /// Catalogue for a run storing `mtype` primary variables.
    pub fn new(mtype: usize) -> Self {
        let primary = PRIMARY_VARIABLES.iter().take(mtype).copied().collect();
        Self { mtype, primary }
    }

    /// Number of primary slots per fragment, named or not.
    pub fn mtype(&self) -> usize {
        self.mtype
    }

    pub fn primary_names(&self) -> &[&'static str] {
        &self.primary
    }

    /// All readable names, primary first.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.primary.iter().copied().chain(DERIVED_VARIABLES)
    }

    pub fn resolve(&self, name: &str) -> Result<Field> {
        if let Some(m) = self.primary.iter().position(|&p| p == name) {
            return Ok(Field::Primary(m));
        }
        if let Some(d) = DERIVED_VARIABLES.iter().position(|&p| p == name) {
            return Ok(Field::Derived(d));
        }
        let expected: Vec<&str> = self.names().collect();
        Err(ReaderError::unknown_variable(name, &expected))
    }

    /// Resolve a selection into `(name, field)` pairs, failing on the first
    /// unknown name.
    pub fn select(&self, variables: &Variables) -> Result<Vec<(String, Field)>> {
        match variables {
            Variables::All => self
                .names()
                .map(|n| Ok((n.to_string(), self.resolve(n)?)))
                .collect(),
            Variables::Only(names) => names
                .iter()
                .map(|n| Ok((n.clone(), self.resolve(n)?)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        let catalogue = VariableCatalogue::new(8);
        assert_eq!(catalogue.resolve("ro").unwrap(), Field::Primary(0));
        assert_eq!(catalogue.resolve("se").unwrap(), Field::Primary(7));
        assert_eq!(catalogue.resolve("te").unwrap(), Field::Derived(1));
        // ph is the ninth primary and not stored with mtype 8
        assert!(catalogue.resolve("ph").is_err());
    }

    #[test]
    fn test_unknown_variable_lists_names() {
        let catalogue = VariableCatalogue::new(2);
        match catalogue.resolve("bx") {
            Err(ReaderError::UnknownVariable { name, expected }) => {
                assert_eq!(name, "bx");
                assert_eq!(expected, vec!["ro", "vx", "pr", "te", "op"]);
            }
            other => panic!("expected unknown variable, got {:?}", other),
        }
    }

    #[test]
    fn test_select() {
        let catalogue = VariableCatalogue::new(9);
        assert_eq!(catalogue.select(&Variables::All).unwrap().len(), 12);

        let picked = catalogue.select(&Variables::from(["vz", "op"])).unwrap();
        assert_eq!(picked[0], ("vz".to_string(), Field::Primary(3)));
        assert_eq!(picked[1], ("op".to_string(), Field::Derived(2)));

        assert!(catalogue.select(&Variables::from("xx")).is_err());
        assert_eq!(Variables::from("all"), Variables::All);
    }
}
