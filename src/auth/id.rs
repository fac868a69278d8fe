//! Strongly typed identifiers used by credentials, cache keys, and queries.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, max = $max:expr) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view, $max)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value, $max)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

// Object ids, tenant ids and app ids are GUIDs; B2C policy names are short labels.
const GUID_LIKE_MAX_LEN: usize = 128;
// RFC 5321 path limit for addresses used as UPNs.
const DISPLAYABLE_MAX_LEN: usize = 320;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty or whitespace.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (client, user, tenant, policy).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (client, user, tenant, policy).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (client, user, tenant, policy).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { ClientId, "OAuth 2.0 client (application) id.", "Client", max = GUID_LIKE_MAX_LEN }
def_id! {
	UniqueId,
	"Immutable user object identifier issued by the STS.",
	"UniqueId",
	max = GUID_LIKE_MAX_LEN
}
def_id! {
	DisplayableId,
	"Human-readable user identifier such as a UPN or email.",
	"DisplayableId",
	max = DISPLAYABLE_MAX_LEN
}
def_id! { TenantId, "Directory tenant identifier.", "Tenant", max = GUID_LIKE_MAX_LEN }
def_id! { Policy, "B2C user-flow policy partitioning the cache.", "Policy", max = 128 }

impl DisplayableId {
	/// Case-insensitive comparison; displayable ids follow email semantics.
	pub fn matches(&self, other: &str) -> bool {
		self.0.eq_ignore_ascii_case(other)
	}

	/// Lowercased form used inside canonical cache keys.
	pub fn canonical(&self) -> String {
		self.0.to_ascii_lowercase()
	}
}

fn validate_view(kind: &'static str, view: &str, max: usize) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > max {
		return Err(IdentifierError::TooLong { kind, max });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_blank_and_padded_values() {
		assert!(ClientId::new("").is_err());
		assert!(ClientId::new(" 00000000-0000-0000-0000-000000000001").is_err());
		assert!(Policy::new("b2c_1 signin").is_err());
		assert!(TenantId::new(format!("tenant{}id", '\u{00A0}')).is_err());

		let client = ClientId::new("00000000-0000-0000-0000-000000000001")
			.expect("GUID client id should be valid.");

		assert_eq!(format!("{client:?}"), "Client(00000000-0000-0000-0000-000000000001)");
	}

	#[test]
	fn length_limits_depend_on_the_identifier() {
		let guid_like = "a".repeat(GUID_LIKE_MAX_LEN + 1);
		let address = format!("{}@contoso.com", "a".repeat(GUID_LIKE_MAX_LEN));

		assert!(matches!(
			UniqueId::new(&guid_like),
			Err(IdentifierError::TooLong { kind: "UniqueId", max: GUID_LIKE_MAX_LEN })
		));
		DisplayableId::new(&address).expect("Long UPNs within the address limit should pass.");
		assert!(DisplayableId::new("a".repeat(DISPLAYABLE_MAX_LEN + 1)).is_err());
	}

	#[test]
	fn deserialization_enforces_validation() {
		let policy: Policy =
			serde_json::from_str("\"B2C_1_SignIn\"").expect("Policy should deserialize.");

		assert_eq!(policy.as_ref(), "B2C_1_SignIn");
		assert!(serde_json::from_str::<UniqueId>("\"\"").is_err());
		assert!(serde_json::from_str::<ClientId>("\"with space\"").is_err());
	}

	#[test]
	fn displayable_ids_compare_case_insensitively() {
		let upn = DisplayableId::new("Alice@Contoso.com").expect("UPN fixture should be valid.");

		assert!(upn.matches("alice@contoso.com"));
		assert!(!upn.matches("bob@contoso.com"));
		assert_eq!(upn.canonical(), "alice@contoso.com");
		assert_eq!(upn.as_ref(), "Alice@Contoso.com", "Original casing must be preserved.");
	}

	#[test]
	fn borrowed_lookup_by_str() {
		let tenants = HashMap::from([(
			TenantId::new("72f988bf-86f1-41af-91ab-2d7cd011db47")
				.expect("Tenant fixture should be valid."),
			"microsoft",
		)]);

		assert_eq!(tenants.get("72f988bf-86f1-41af-91ab-2d7cd011db47"), Some(&"microsoft"));
	}
}
