//! Scope sets and the resource-or-scope request target.

// std
use std::{collections::BTreeSet, slice::Iter};
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError, ser::SerializeSeq};
// self
use crate::_prelude::*;

/// Errors emitted when validating scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Normalized set of OAuth scopes.
///
/// Scopes are deduplicated and sorted so equality, ordering, and hashing are
/// independent of the order the caller listed them in. The set relations
/// ([`contains_all`](Self::contains_all), [`intersects`](Self::intersects)) drive the
/// cache matching rules.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeSet(Arc<[String]>);
impl ScopeSet {
	/// Creates a normalized scope set from any iterator.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Ok(Self(normalize(scopes)?))
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no scopes are defined.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if the normalized set contains the provided scope.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.binary_search_by(|candidate| candidate.as_str().cmp(scope)).is_ok()
	}

	/// Returns true if every scope in `other` is also present in `self`.
	pub fn contains_all(&self, other: &ScopeSet) -> bool {
		other.iter().all(|scope| self.contains(scope))
	}

	/// Returns true if the two sets share at least one scope.
	pub fn intersects(&self, other: &ScopeSet) -> bool {
		other.iter().any(|scope| self.contains(scope))
	}

	/// Iterator over normalized scopes.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(|s| s.as_str())
	}

	/// Returns the normalized string representation (space-delimited).
	pub fn normalized(&self) -> String {
		self.0.join(" ")
	}

	/// Returns a new set with `extra` merged in.
	pub fn with(&self, extra: &str) -> Result<Self, ScopeValidationError> {
		Self::new(self.iter().chain([extra]).map(str::to_owned))
	}

	/// Returns the underlying slice of scope strings.
	pub fn as_slice(&self) -> &[String] {
		&self.0
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeSet").field(&self.0).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl TryFrom<Vec<String>> for ScopeSet {
	type Error = ScopeValidationError;

	fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl<'a> IntoIterator for &'a ScopeSet {
	type IntoIter = ScopeIter<'a>;
	type Item = &'a str;

	fn into_iter(self) -> Self::IntoIter {
		ScopeIter { inner: self.0.iter() }
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.is_empty() {
			return Ok(Self::default());
		}
		if s.chars().all(char::is_whitespace) {
			return Err(ScopeValidationError::Empty);
		}

		Self::new(s.split_whitespace())
	}
}
impl Serialize for ScopeSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut seq = serializer.serialize_seq(Some(self.0.len()))?;

		for scope in self.0.iter() {
			seq.serialize_element(scope)?;
		}

		seq.end()
	}
}
impl<'de> Deserialize<'de> for ScopeSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let values = <Vec<String>>::deserialize(deserializer)?;

		ScopeSet::new(values).map_err(DeError::custom)
	}
}

/// Iterator over scope strings.
pub struct ScopeIter<'a> {
	inner: Iter<'a, String>,
}
impl<'a> Iterator for ScopeIter<'a> {
	type Item = &'a str;

	fn next(&mut self) -> Option<Self::Item> {
		self.inner.next().map(|s| s.as_str())
	}
}

/// What a token is requested for: a v1 resource URI or a v2 scope set.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceOrScope {
	/// Single resource identifier (`resource=` on the wire).
	Resource(String),
	/// Scope set (`scope=` on the wire).
	Scopes(ScopeSet),
}
impl ResourceOrScope {
	/// Builds a resource target.
	pub fn resource(resource: impl Into<String>) -> Self {
		Self::Resource(resource.into())
	}

	/// Builds a scope target after validating each entry.
	pub fn scopes<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Ok(Self::Scopes(ScopeSet::new(scopes)?))
	}

	/// Returns true for an empty resource or an empty scope set.
	pub fn is_empty(&self) -> bool {
		match self {
			Self::Resource(resource) => resource.is_empty(),
			Self::Scopes(scopes) => scopes.is_empty(),
		}
	}

	/// Exact equality; resources compare case-insensitively.
	pub fn same_as(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Resource(lhs), Self::Resource(rhs)) => lhs.eq_ignore_ascii_case(rhs),
			(Self::Scopes(lhs), Self::Scopes(rhs)) => lhs == rhs,
			_ => false,
		}
	}

	/// Returns true if `self` covers everything `requested` asks for.
	pub fn contains(&self, requested: &Self) -> bool {
		match (self, requested) {
			(Self::Scopes(cached), Self::Scopes(requested)) => cached.contains_all(requested),
			_ => self.same_as(requested),
		}
	}

	/// Returns true if `self` and `other` overlap at all.
	pub fn intersects(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Scopes(lhs), Self::Scopes(rhs)) => lhs.intersects(rhs),
			_ => self.same_as(other),
		}
	}

	/// Stable string used inside canonical cache keys.
	pub fn canonical(&self) -> String {
		match self {
			Self::Resource(resource) => format!("resource:{}", resource.to_ascii_lowercase()),
			Self::Scopes(scopes) => format!("scope:{}", scopes.normalized()),
		}
	}
}
impl Display for ResourceOrScope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Resource(resource) => f.write_str(resource),
			Self::Scopes(scopes) => Display::fmt(scopes, f),
		}
	}
}

fn normalize<I, S>(scopes: I) -> Result<Arc<[String]>, ScopeValidationError>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	let mut set = BTreeSet::new();

	for scope in scopes {
		let owned: String = scope.into();

		if owned.is_empty() {
			return Err(ScopeValidationError::Empty);
		}
		if owned.chars().any(char::is_whitespace) {
			return Err(ScopeValidationError::ContainsWhitespace { scope: owned });
		}

		set.insert(owned);
	}

	Ok(Arc::from(set.into_iter().collect::<Vec<_>>()))
}
