use core::fmt::{Debug, Display, Formatter, Result as FmtResult};

use derive_more::FromStr;
use url::{ParseError, Url};

const REPLACEMENT_TOKEN: &str = "*";

/// A URL that hides credentials when formatted.
///
/// Beacon node providers commonly embed API keys in the user info part of the URL.
/// Those must never reach the logs.
#[derive(Clone, PartialEq, Eq, Hash, FromStr)]
pub struct RedactingUrl {
    url: Url,
}

impl Display for RedactingUrl {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        match self.redacted() {
            Some(url) => Display::fmt(&url, formatter),
            None => formatter.write_str("unsanitizable URL"),
        }
    }
}

impl Debug for RedactingUrl {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        Debug::fmt(&self.to_string(), formatter)
    }
}

impl From<Url> for RedactingUrl {
    fn from(url: Url) -> Self {
        Self { url }
    }
}

impl RedactingUrl {
    #[must_use]
    pub fn into_url(self) -> Url {
        self.url
    }

    /// Appends `path` to the path of this URL.
    ///
    /// Unlike [`Url::join`], this keeps any path prefix the base URL already has,
    /// so `https://node.example/key/` joined with `/eth/v1/x` becomes
    /// `https://node.example/key/eth/v1/x`.
    pub fn join_path(&self, path: &str) -> Result<Self, ParseError> {
        let mut base = self.url.clone();

        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }

        let url = base.join(path.trim_start_matches('/'))?;

        Ok(Self { url })
    }

    fn redacted(&self) -> Option<Url> {
        let mut url = self.url.clone();

        if !url.username().is_empty() {
            url.set_username(REPLACEMENT_TOKEN).ok()?;
        }

        if url.password().is_some() {
            url.set_password(Some(REPLACEMENT_TOKEN)).ok()?;
        }

        Some(url)
    }
}
