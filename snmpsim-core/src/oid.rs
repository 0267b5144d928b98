use std::fmt::{self, Display};
use std::str::FromStr;
use thiserror::Error as ThisError;

/// An object identifier: the dotted numeric path naming a managed value.
///
/// Components compare element-wise, so the derived ordering is the
/// lexicographic order SNMP uses to walk a MIB.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Oid(Vec<u32>);

impl Oid {
    /// Creates an identifier from its components.
    pub fn new(components: impl Into<Vec<u32>>) -> Self {
        Self(components.into())
    }

    /// Parses a dotted-decimal string such as `1.3.6.1.2.1.1.1.0`.
    ///
    /// Every component must be a non-empty run of ASCII digits that fits in a
    /// `u32`. Leading zeros are accepted and dropped, so the result always
    /// formats back to its canonical spelling.
    pub fn parse(s: &str) -> Result<Self, OidError> {
        let mut components = Vec::new();
        for (position, component) in s.split('.').enumerate() {
            if component.is_empty() {
                Err(OidError::EmptyComponent {
                    oid: s.to_string(),
                    position,
                })?
            }
            if !component.bytes().all(|b| b.is_ascii_digit()) {
                Err(OidError::NotNumeric {
                    oid: s.to_string(),
                    component: component.to_string(),
                })?
            }
            let value = component.parse::<u32>().map_err(|_| OidError::OutOfRange {
                oid: s.to_string(),
                component: component.to_string(),
            })?;
            components.push(value);
        }
        Ok(Self(components))
    }

    /// Canonical dotted-decimal form, used as the value store key.
    pub fn to_key(&self) -> String {
        self.to_string()
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut components = self.0.iter();
        if let Some(first) = components.next() {
            write!(f, "{first}")?;
        }
        for component in components {
            write!(f, ".{component}")?;
        }
        Ok(())
    }
}

impl FromStr for Oid {
    type Err = OidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Vec<u32>> for Oid {
    fn from(components: Vec<u32>) -> Self {
        Self(components)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(components: [u32; N]) -> Self {
        Self(components.to_vec())
    }
}

impl From<Oid> for Vec<u32> {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

/// Reasons a string is not a valid OID. All of them are reported as a
/// malformed OID.
#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum OidError {
    #[error("Malformed OID '{oid}': component {position} is empty")]
    EmptyComponent { oid: String, position: usize },
    #[error("Malformed OID '{oid}': '{component}' is not a number")]
    NotNumeric { oid: String, component: String },
    #[error("Malformed OID '{oid}': '{component}' does not fit in 32 bits")]
    OutOfRange { oid: String, component: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats() -> anyhow::Result<()> {
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0")?;
        assert_eq!(oid.components(), &[1, 3, 6, 1, 2, 1, 1, 1, 0]);
        assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.1.0");
        Ok(())
    }

    #[test]
    fn leading_zeros_normalize() -> anyhow::Result<()> {
        let spelled = Oid::parse("1.3.06.001.4.1.0")?;
        let canonical = Oid::parse("1.3.6.1.4.1.0")?;
        assert_eq!(spelled, canonical);
        assert_eq!(spelled.to_key(), "1.3.6.1.4.1.0");
        Ok(())
    }

    #[test]
    fn format_then_parse_is_identity() -> anyhow::Result<()> {
        for components in [vec![0], vec![1, 3], vec![2, 999, u32::MAX, 0, 7]] {
            let oid = Oid::new(components);
            assert_eq!(Oid::parse(&oid.to_string())?, oid);
        }
        Ok(())
    }

    #[test]
    fn single_component() -> anyhow::Result<()> {
        assert_eq!(Oid::parse("42")?, Oid::from([42]));
        Ok(())
    }

    #[test]
    fn rejects_empty_components() {
        for bad in ["", ".1.3", "1.3.", "1..3"] {
            assert!(
                matches!(Oid::parse(bad), Err(OidError::EmptyComponent { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_non_numeric() {
        for bad in ["1.3.x", "1.-3", "1.+3", "1. 3", "iso.3"] {
            assert!(
                matches!(Oid::parse(bad), Err(OidError::NotNumeric { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(Oid::parse("1.4294967295").is_ok());
        assert!(matches!(
            Oid::parse("1.4294967296"),
            Err(OidError::OutOfRange { .. })
        ));
    }

    #[test]
    fn orders_lexicographically() -> anyhow::Result<()> {
        let mut oids = vec![
            Oid::parse("1.3.6.1.2")?,
            Oid::parse("1.3.6.1.10")?,
            Oid::parse("1.3.6.1")?,
            Oid::parse("1.3.6.1.2.1")?,
        ];
        oids.sort();
        let sorted: Vec<String> = oids.iter().map(Oid::to_string).collect();
        assert_eq!(sorted, ["1.3.6.1", "1.3.6.1.2", "1.3.6.1.2.1", "1.3.6.1.10"]);
        Ok(())
    }
}
