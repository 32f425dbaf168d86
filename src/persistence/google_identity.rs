use crate::app_env::AppConfig;
use crate::domain;
use crate::domain::auth::ProviderProfile;
use crate::external_connections::ExternalConnectivity;
use anyhow::{Context, Error};
use reqwest::Url;
use serde::Deserialize;

const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Driven adapter for Google's OAuth2 endpoints. Stateless aside from the
/// client credentials; all HTTP goes through the shared traced client.
pub struct GoogleIdentity {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleIdentity {
    pub fn new(config: &AppConfig) -> GoogleIdentity {
        GoogleIdentity {
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: format!(
                "{}/api/auth/google/callback",
                config.base_url.trim_end_matches('/')
            ),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    id: String,
    email: String,
    name: String,
    picture: Option<String>,
}

impl domain::auth::driven_ports::IdentityProvider for GoogleIdentity {
    fn authorize_url(&self) -> String {
        let url = Url::parse_with_params(
            AUTHORIZE_ENDPOINT,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
            ],
        )
        .expect("the authorization endpoint constant must be a valid URL");

        url.into()
    }

    async fn exchange_code(
        &self,
        code: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<ProviderProfile, Error> {
        let http_client = ext_cxn.http_client();

        let token_response: TokenResponse = http_client
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("sending the token exchange request")?
            .error_for_status()
            .context("the token endpoint rejected the authorization code")?
            .json()
            .await
            .context("reading the token exchange response")?;

        let profile: UserInfoResponse = http_client
            .get(USERINFO_ENDPOINT)
            .bearer_auth(&token_response.access_token)
            .send()
            .await
            .context("sending the userinfo request")?
            .error_for_status()
            .context("the userinfo endpoint rejected the access token")?
            .json()
            .await
            .context("reading the userinfo response")?;

        Ok(ProviderProfile {
            id: profile.id,
            email: profile.email,
            name: profile.name,
            picture: profile.picture,
        })
    }
}
