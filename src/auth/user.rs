//! Subject classification and user identity derived from STS responses.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{
	_prelude::*,
	auth::{DisplayableId, TenantId, UniqueId},
};

/// Who a cached token belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
	/// Application-only token (client credentials).
	App,
	/// Token issued to a user through a public or confidential client.
	User,
	/// Token issued to a confidential client acting for a user (on-behalf-of).
	UserPlusClient,
}
impl SubjectType {
	/// Returns a stable label used in canonical keys.
	pub const fn as_str(self) -> &'static str {
		match self {
			SubjectType::App => "app",
			SubjectType::User => "user",
			SubjectType::UserPlusClient => "user_plus_client",
		}
	}
}
impl Display for SubjectType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Identifies which user a silent acquisition targets.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum UserIdentifier {
	/// Match on the immutable object id.
	UniqueId(UniqueId),
	/// Match on the displayable id (case-insensitive).
	DisplayableId(DisplayableId),
}
impl UserIdentifier {
	/// Splits the identifier into the optional fields carried by cache queries.
	pub fn into_parts(self) -> (Option<UniqueId>, Option<DisplayableId>) {
		match self {
			Self::UniqueId(id) => (Some(id), None),
			Self::DisplayableId(id) => (None, Some(id)),
		}
	}
}

/// User information extracted from an id_token and optional client_info.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
	/// Object id (`oid`), falling back to `sub`.
	pub unique_id: Option<UniqueId>,
	/// UPN, preferred username, or email.
	pub displayable_id: Option<DisplayableId>,
	/// Home account id (`uid.utid` from client_info), used to index refresh tokens.
	pub home_object_id: Option<String>,
	/// Tenant (`tid`) that issued the id_token.
	pub tenant_id: Option<TenantId>,
	/// Given name claim.
	pub given_name: Option<String>,
	/// Family name claim.
	pub family_name: Option<String>,
	/// Identity provider (`idp`, falling back to `iss`).
	pub identity_provider: Option<String>,
}
impl UserIdentity {
	/// Builds an identity from the raw id_token and client_info strings.
	///
	/// Returns `None` when neither input yields any claims. Malformed inputs are treated as
	/// absent so an unreadable id_token never fails an otherwise successful exchange.
	pub fn from_response(id_token: Option<&str>, client_info: Option<&str>) -> Option<Self> {
		let claims = id_token.and_then(decode_jwt_payload::<IdTokenClaims>);
		let home = client_info.and_then(decode_segment::<ClientInfo>);

		if claims.is_none() && home.is_none() {
			return None;
		}

		let mut identity = Self::default();

		if let Some(claims) = claims {
			identity.unique_id = first_valid([claims.oid.as_deref(), claims.sub.as_deref()]);
			identity.displayable_id = first_valid([
				claims.upn.as_deref(),
				claims.preferred_username.as_deref(),
				claims.email.as_deref(),
			]);
			identity.tenant_id = claims.tid.as_deref().and_then(|tid| TenantId::new(tid).ok());
			identity.given_name = claims.given_name;
			identity.family_name = claims.family_name;
			identity.identity_provider = claims.idp.or(claims.iss);
		}
		if let Some(info) = home {
			identity.home_object_id = Some(format!("{}.{}", info.uid, info.utid));
		}

		Some(identity)
	}

	/// Key used to index refresh tokens: the home account id, else the unique id.
	pub fn home_key(&self) -> Option<String> {
		self.home_object_id
			.clone()
			.or_else(|| self.unique_id.as_ref().map(|id| id.to_string()))
	}
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
	oid: Option<String>,
	sub: Option<String>,
	upn: Option<String>,
	preferred_username: Option<String>,
	email: Option<String>,
	tid: Option<String>,
	given_name: Option<String>,
	family_name: Option<String>,
	idp: Option<String>,
	iss: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientInfo {
	uid: String,
	utid: String,
}

fn first_valid<T, const N: usize>(candidates: [Option<&str>; N]) -> Option<T>
where
	T: FromStr,
{
	candidates.into_iter().flatten().filter(|v| !v.trim().is_empty()).find_map(|v| v.parse().ok())
}

fn decode_jwt_payload<T>(jwt: &str) -> Option<T>
where
	T: for<'de> Deserialize<'de>,
{
	let mut segments = jwt.split('.');
	let _header = segments.next()?;

	decode_segment(segments.next()?)
}

fn decode_segment<T>(segment: &str) -> Option<T>
where
	T: for<'de> Deserialize<'de>,
{
	let bytes = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()?;

	serde_json::from_slice(&bytes).ok()
}
