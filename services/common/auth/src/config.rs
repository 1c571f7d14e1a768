/// Runtime configuration for an HS256 token codec.
#[derive(Clone)]
pub struct JwtConfig {
    /// Shared signing secret.
    pub secret: Vec<u8>,
    /// Expected issuer claim (iss). Not checked when `None`.
    pub issuer: Option<String>,
    /// Expected audience claim (aud). Not checked when `None`.
    pub audience: Option<String>,
}

impl JwtConfig {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            issuer: None,
            audience: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}
