//! RCS revision numbers: dotted sequences of digits such as `1.4` or
//! `1.4.2.1`. An even number of dot-separated components names a commit on
//! some branch; an odd number names the branch itself.

use std::fmt::Display;
use std::str::FromStr;

use crate::error::RcsError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Num {
    Branch(Vec<u64>),
    Commit(Vec<u64>),
}

impl Num {
    /// True if `other` (a commit) lies on `self` (a branch): either directly
    /// on it, or on a branch that forks off one of its ancestor commits.
    pub fn contains(&self, other: &Num) -> Result<bool, RcsError> {
        let (Num::Branch(branch), Num::Commit(commit)) = (self, other) else {
            return Err(RcsError::BadRevision(format!("{self}.contains({other})")));
        };

        if commit.len() > branch.len() + 1 {
            return Ok(false);
        }

        for i in (0..branch.len() - 1).step_by(2) {
            match commit.get(i) {
                Some(b) if *b != branch[i] => return Ok(false),
                Some(_) => match commit.get(i + 1) {
                    Some(rev) if *rev > branch[i + 1] => return Ok(false),
                    Some(_) => {}
                    None => {
                        return Err(RcsError::BadRevision(format!("{other}")));
                    }
                },
                None => return Ok(true),
            }
        }

        if let Some(leaf) = commit.get(branch.len() - 1) {
            if *leaf != branch[branch.len() - 1] {
                return Ok(false);
            }
        }

        Ok(true)
    }

    #[must_use]
    pub fn to_branch(&self) -> Self {
        match self {
            Num::Branch(_) => self.clone(),
            Num::Commit(parts) => Num::Branch(parts[..parts.len() - 1].to_vec()),
        }
    }

    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(self, Num::Branch(_))
    }

    #[must_use]
    pub fn components(&self) -> &[u64] {
        match self {
            Num::Branch(v) | Num::Commit(v) => v,
        }
    }
}

impl TryFrom<&[u8]> for Num {
    type Error = RcsError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let s = std::str::from_utf8(value)
            .map_err(|_| RcsError::BadRevision(String::from_utf8_lossy(value).into_owned()))?;
        Self::from_str(s)
    }
}

impl FromStr for Num {
    type Err = RcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u64> = s
            .split('.')
            .filter_map(|part| match part.parse::<u64>() {
                // A zero component marks a CVS "magic" branch number; it
                // carries no information we need and is dropped.
                Ok(0) => None,
                Ok(v) => Some(Ok(v)),
                Err(_) => Some(Err(RcsError::BadRevision(s.to_string()))),
            })
            .collect::<Result<_, _>>()?;

        if parts.is_empty() {
            return Err(RcsError::BadRevision(s.to_string()));
        }

        if parts.len() % 2 == 0 {
            Ok(Num::Commit(parts))
        } else {
            Ok(Num::Branch(parts))
        }
    }
}

impl Display for Num {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use itertools::Itertools;
        write!(f, "{}", self.components().iter().join("."))
    }
}
