use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// OSGi-style `major.minor.micro.qualifier` version.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
    pub qualifier: String,
}

impl Version {
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::empty());
        }

        let mut parts = s.splitn(4, '.');
        let mut number = |label: &str| -> Result<u32, String> {
            match parts.next() {
                None => Ok(0),
                Some(p) => p
                    .parse::<u32>()
                    .map_err(|_| format!("invalid {} component in version '{}'", label, s)),
            }
        };

        let major = number("major")?;
        let minor = number("minor")?;
        let micro = number("micro")?;
        let qualifier = parts.next().unwrap_or("").to_string();

        if !qualifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(format!("invalid qualifier in version '{}'", s));
        }

        Ok(Self {
            major,
            minor,
            micro,
            qualifier,
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.micro.cmp(&other.micro))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_order() {
        let a: Version = "1.2".parse().unwrap();
        let b: Version = "1.2.0.beta".parse().unwrap();
        let c: Version = "1.10.0".parse().unwrap();

        assert_eq!(a, Version::new(1, 2, 0));
        assert!(a < b);
        assert!(b < c);
        assert_eq!(b.to_string(), "1.2.0.beta");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("1.x".parse::<Version>().is_err());
        assert!("1.0.0.bad qualifier".parse::<Version>().is_err());
    }
}
