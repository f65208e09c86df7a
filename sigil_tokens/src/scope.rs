//! OAuth2 scopes and scope sets

use std::{collections::btree_set, collections::BTreeSet, fmt};

use aliri_braid::braid;
use serde::{Deserialize, Serialize};

/// An OAuth2 scope
///
/// Scopes are compared case-sensitively.
#[braid(serde)]
pub struct Scope;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum ScopesDto {
    String(String),
    Array(Vec<Scope>),
}

impl From<Option<ScopesDto>> for ScopeSet {
    fn from(dto: Option<ScopesDto>) -> Self {
        match dto {
            Some(ScopesDto::String(s)) => Self::from_space_delimited(&s),
            Some(ScopesDto::Array(arr)) => arr.into_iter().collect(),
            None => Self::new(),
        }
    }
}

impl From<ScopeSet> for ScopesDto {
    fn from(s: ScopeSet) -> Self {
        ScopesDto::String(s.to_string())
    }
}

/// A set of scopes for defining access permissions
///
/// Duplicates are dropped and the order in which scopes were supplied is
/// irrelevant: two sets built from the same scopes in different orders are
/// equal and hash identically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(from = "Option<ScopesDto>", into = "ScopesDto")]
pub struct ScopeSet(BTreeSet<Scope>);

impl ScopeSet {
    /// Produces an empty scope set
    #[inline]
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Parses a space-delimited scope string, as found in token responses
    pub fn from_space_delimited(scopes: &str) -> Self {
        scopes.split_whitespace().map(Scope::from).collect()
    }

    /// Adds a scope to the set, returning whether it was newly added
    #[inline]
    pub fn insert(&mut self, scope: Scope) -> bool {
        self.0.insert(scope)
    }

    /// Adds a scope to the set
    #[inline]
    #[must_use]
    pub fn and(mut self, scope: impl Into<Scope>) -> Self {
        self.insert(scope.into());
        self
    }

    /// Whether the set contains `scope`
    #[inline]
    pub fn contains(&self, scope: &ScopeRef) -> bool {
        self.0.contains(scope)
    }

    /// Checks to see whether this set of scopes contains all of
    /// the scopes required.
    #[inline]
    pub fn contains_all<I, T>(&self, required_scopes: I) -> bool
    where
        I: IntoIterator<Item = T>,
        T: AsRef<ScopeRef>,
    {
        required_scopes
            .into_iter()
            .all(|v| self.0.contains(v.as_ref()))
    }

    /// Produces an iterator of the scopes in this set, in a stable order
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            iter: self.0.iter(),
        }
    }

    /// An ordered view of the scopes in this set
    pub fn to_vec(&self) -> Vec<Scope> {
        self.0.iter().cloned().collect()
    }

    /// The number of scopes in the set
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Renders the scopes space-delimited, as sent in a `scope` parameter
impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for scope in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(scope.as_str())?;
            first = false;
        }
        Ok(())
    }
}

impl<S: Into<Scope>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<Scope>> Extend<S> for ScopeSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into))
    }
}

impl IntoIterator for ScopeSet {
    type Item = Scope;
    type IntoIter = btree_set::IntoIter<Scope>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ScopeSet {
    type Item = &'a ScopeRef;
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over a set of borrowed scopes
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    iter: btree_set::Iter<'a, Scope>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a ScopeRef;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|s| &**s)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}
