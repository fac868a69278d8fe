//! Form parameter set sent to the token endpoint.

// crates.io
use url::form_urlencoded;
use zeroize::Zeroizing;
// self
use crate::_prelude::*;

const SENSITIVE: &[&str] =
	&["client_secret", "client_assertion", "assertion", "refresh_token", "code", "password"];

/// Ordered `application/x-www-form-urlencoded` parameters.
///
/// Values are wiped on drop and secret-bearing parameters are redacted in `Debug`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RequestParameters(BTreeMap<String, Zeroizing<String>>);
impl RequestParameters {
	/// Creates an empty parameter set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a parameter, returning true when it replaced an existing value.
	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
		self.0.insert(name.into(), Zeroizing::new(value.into())).is_some()
	}

	pub(crate) fn insert_secret(&mut self, name: &str, value: Zeroizing<String>) {
		self.0.insert(name.to_owned(), value);
	}

	/// Returns the value of a parameter.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.get(name).map(|value| value.as_str())
	}

	/// Returns true if the parameter is present.
	pub fn contains(&self, name: &str) -> bool {
		self.0.contains_key(name)
	}

	/// Number of parameters.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true when no parameters are set.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterates over `(name, value)` pairs in name order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
	}

	/// Encodes the parameters as a form body.
	pub fn to_form_body(&self) -> Zeroizing<String> {
		let mut serializer = form_urlencoded::Serializer::new(String::new());

		for (name, value) in self.iter() {
			serializer.append_pair(name, value);
		}

		Zeroizing::new(serializer.finish())
	}
}
impl Debug for RequestParameters {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut map = f.debug_map();

		for (name, value) in self.iter() {
			if SENSITIVE.contains(&name) {
				map.entry(&name, &"<redacted>");
			} else {
				map.entry(&name, &value);
			}
		}

		map.finish()
	}
}
