//! Parameters returned by the authorization endpoint.

use url::Url;

/// Response parameters carried by a login callback URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
}

impl CallbackParams {
    /// Reads the parameters from the fragment, or from the query when the
    /// fragment is empty.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let raw = url
            .fragment()
            .filter(|f| !f.is_empty())
            .or_else(|| url.query())
            .unwrap_or_default();

        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            let value = value.into_owned();
            match key.as_ref() {
                "code" => params.code = Some(value),
                "state" => params.state = Some(value),
                "error" => params.error = Some(value),
                "error_description" => params.error_description = Some(value),
                "access_token" => params.access_token = Some(value),
                "id_token" => params.id_token = Some(value),
                "token_type" => params.token_type = Some(value),
                "expires_in" => params.expires_in = value.parse().ok(),
                _ => {}
            }
        }
        params
    }

    /// The error reported by the server, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|error| {
            self.error_description
                .as_ref()
                .map_or_else(|| error.clone(), |desc| format!("{error}: {desc}"))
        })
    }
}
