use types::redacting_url::RedactingUrl;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EndpointStatus {
    Online,
    Offline,
}

impl EndpointStatus {
    const fn is_offline(self) -> bool {
        matches!(self, Self::Offline)
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Endpoint {
    index: usize,
    status: EndpointStatus,
    url: RedactingUrl,
}

impl Endpoint {
    pub const fn url(&self) -> &RedactingUrl {
        &self.url
    }

    pub const fn is_fallback(&self) -> bool {
        self.index > 0
    }
}

/// Beacon node URLs in order of preference.
///
/// Requests go to the current endpoint. A failing endpoint is marked offline and the
/// cursor moves to the next one. Once the list is exhausted it starts over from the first.
pub struct Endpoints {
    current: usize,
    endpoints: Vec<Endpoint>,
}

impl Endpoints {
    pub fn new(urls: impl IntoIterator<Item = RedactingUrl>) -> Self {
        let endpoints = urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| Endpoint {
                index,
                status: EndpointStatus::Online,
                url,
            })
            .collect();

        Self {
            current: 0,
            endpoints,
        }
    }

    pub fn all_offline(&self) -> bool {
        self.endpoints
            .iter()
            .all(|endpoint| endpoint.status.is_offline())
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Returns the endpoint to use for the next request, wrapping around after the last one.
    pub fn current_or_first(&mut self) -> Option<&Endpoint> {
        if self.current >= self.endpoints.len() {
            self.current = 0;
        }

        self.endpoints.get(self.current)
    }

    pub fn peek_next(&self) -> Option<&Endpoint> {
        self.endpoints
            .get(self.current.saturating_add(1))
            .or_else(|| self.endpoints.first())
    }

    pub fn set_status(&mut self, status: EndpointStatus) {
        if let Some(current) = self.endpoints.get_mut(self.current) {
            current.status = status;
        }
    }

    pub fn advance(&mut self) {
        self.current = self.current.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    #[test]
    fn test_empty_endpoints() {
        let mut endpoints = Endpoints::new([]);

        assert!(endpoints.is_empty());
        assert!(endpoints.all_offline());

        assert_eq!(endpoints.current_or_first(), None);
        assert_eq!(endpoints.peek_next(), None);
    }

    #[test]
    fn test_endpoints_wrap_around() -> Result<()> {
        let primary = "http://beacon-1:5052".parse::<RedactingUrl>()?;
        let fallback = "http://beacon-2:5052".parse::<RedactingUrl>()?;
        let mut endpoints = Endpoints::new([primary.clone(), fallback.clone()]);

        assert!(!endpoints.all_offline(), "initially endpoints are online");

        let current = endpoints.current_or_first().cloned();
        assert_eq!(current.as_ref().map(Endpoint::url), Some(&primary));
        assert_eq!(current.map(|endpoint| endpoint.is_fallback()), Some(false));
        assert_eq!(endpoints.peek_next().map(Endpoint::url), Some(&fallback));

        endpoints.set_status(EndpointStatus::Offline);
        endpoints.advance();

        let current = endpoints.current_or_first().cloned();
        assert_eq!(current.as_ref().map(Endpoint::url), Some(&fallback));
        assert_eq!(current.map(|endpoint| endpoint.is_fallback()), Some(true));
        assert_eq!(endpoints.peek_next().map(Endpoint::url), Some(&primary));
        assert!(!endpoints.all_offline());

        endpoints.set_status(EndpointStatus::Offline);
        endpoints.advance();

        assert!(endpoints.all_offline());

        // Offline endpoints are still tried once the list is exhausted.
        let current = endpoints.current_or_first().cloned();
        assert_eq!(current.as_ref().map(Endpoint::url), Some(&primary));

        endpoints.set_status(EndpointStatus::Online);

        assert!(!endpoints.all_offline());

        Ok(())
    }
}
