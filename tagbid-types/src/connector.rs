//! Gateway metadata types usable across crates.

/// Typed key identifying a demand gateway in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GatewayKey(pub &'static str);

impl GatewayKey {
    /// Construct a new typed gateway key from a static name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the inner static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl From<GatewayKey> for &'static str {
    fn from(k: GatewayKey) -> Self {
        k.0
    }
}
