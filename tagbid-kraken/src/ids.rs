//! User and sync ids sent with every bid request.
//!
//! Both ids come from first-party cookies holding URL-encoded JSON. A missing
//! cookie or field encodes an empty object (`e30=`); a cookie that cannot be
//! decoded encodes as the empty string.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use serde_json::{Map, Value};

/// Cookie holding the sync ids.
pub const CRB_COOKIE: &str = "krg_crb";
/// Cookie holding the user id.
pub const UID_COOKIE: &str = "krg_uid";

// Decoding accepts values with or without padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Source of cookie values, looked up by name.
pub trait CookieSource: Send + Sync {
    /// Raw (still URL-encoded) value of cookie `name`.
    fn cookie(&self, name: &str) -> Option<String>;
}

impl<F> CookieSource for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn cookie(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// No cookies at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCookies;

impl CookieSource for NoCookies {
    fn cookie(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Cookies parsed from a `Cookie:` header style string (`a=1; b=2`).
#[derive(Debug, Clone, Default)]
pub struct CookieHeader(String);

impl CookieHeader {
    /// Wrap a header value.
    pub fn new(header: impl Into<String>) -> Self {
        Self(header.into())
    }
}

impl CookieSource for CookieHeader {
    fn cookie(&self, name: &str) -> Option<String> {
        self.0.split(';').find_map(|pair| {
            let value = pair.trim_start().strip_prefix(name)?.strip_prefix('=')?;
            Some(value.to_string())
        })
    }
}

/// Encoded ids as sent in `kargoIDs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KargoIds {
    /// Base64 JSON of the sync ids.
    pub crb: String,
    /// Base64 JSON of the user id payload.
    pub kid: String,
}

impl KargoIds {
    /// Read both ids from `cookies`.
    #[must_use]
    pub fn from_cookies(cookies: &dyn CookieSource) -> Self {
        Self {
            crb: encoded_crb(cookies.cookie(CRB_COOKIE).as_deref()).unwrap_or_default(),
            kid: encoded_kid(cookies.cookie(UID_COOKIE).as_deref()).unwrap_or_default(),
        }
    }
}

fn encoded_crb(raw: Option<&str>) -> Option<String> {
    let crb = parse_cookie(raw)?;
    let mut sync_ids = empty_object();
    if let Some(v) = crb.get("v").filter(|v| truthy(v)) {
        let bytes = LENIENT.decode(v.as_str()?).ok()?;
        let inner: Value = serde_json::from_slice(&bytes).ok()?;
        if let Some(ids) = inner.get("syncIds").filter(|ids| truthy(ids)) {
            sync_ids = ids.clone();
        }
    }
    encode(&sync_ids)
}

fn encoded_kid(raw: Option<&str>) -> Option<String> {
    let uid = parse_cookie(raw)?;
    let data = uid
        .get("v")
        .filter(|v| truthy(v))
        .cloned()
        .unwrap_or_else(empty_object);
    encode(&data)
}

/// A missing cookie parses as JSON `null`.
fn parse_cookie(raw: Option<&str>) -> Option<Value> {
    let Some(raw) = raw else {
        return Some(Value::Null);
    };
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    serde_json::from_str(&decoded).ok()
}

fn encode(value: &Value) -> Option<String> {
    let json = serde_json::to_string(value).ok()?;
    Some(base64::engine::general_purpose::STANDARD.encode(json))
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
