use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

use colored::Colorize;
use error_stack::{IntoReport, Report, ResultExt};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use tiny_http::{Header, Response, Server};
use url::Url;

use super::{AuthError, AuthResult, CachedToken, TokenCache};
use crate::config::AppConfig;

const CALLBACK_PAGE: &str = r#"<html>
<head><title>Authentication Successful</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 80px;">
<h1>Authentication Successful!</h1>
<p>You can close this window and return to spotify-backup.</p>
</body>
</html>"#;

/// Authorization-code-with-PKCE flow against the Spotify accounts service,
/// backed by a per-account [`TokenCache`].
pub struct SpotifyAuth {
    client: BasicClient,
    redirect_uri: Url,
    cache: TokenCache,
}

impl SpotifyAuth {
    pub fn new(config: &AppConfig, cache: TokenCache) -> AuthResult<Self> {
        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            config.client_secret.clone().map(ClientSecret::new),
            AuthUrl::new(AppConfig::AUTH_URL.to_string())
                .into_report()
                .change_context(AuthError)?,
            Some(
                TokenUrl::new(AppConfig::TOKEN_URL.to_string())
                    .into_report()
                    .change_context(AuthError)?,
            ),
        )
        // Spotify expects client_id in the body for PKCE exchanges and refreshes
        .set_auth_type(AuthType::RequestBody)
        .set_redirect_uri(RedirectUrl::from_url(config.redirect_uri.clone()));

        Ok(Self {
            client,
            redirect_uri: config.redirect_uri.clone(),
            cache,
        })
    }

    /// Returns a usable access token: the cached one, a refreshed one, or one
    /// obtained through the full browser flow, in that order of preference.
    pub async fn access_token(&self) -> AuthResult<String> {
        if let Some(cached) = self.cache.load()? {
            if !covers_scopes(&cached.scope) {
                log::info!("cached token lacks required scopes, authenticating again");
            } else if !cached.is_expired() {
                log::debug!("using cached token from {}", self.cache.path().display());
                return Ok(cached.access_token);
            } else if let Some(refresh_token) = cached.refresh_token.as_deref() {
                match self.refresh(refresh_token).await {
                    Ok(token) => {
                        self.cache.save(&token)?;
                        return Ok(token.access_token);
                    }
                    Err(err) => log::warn!("token refresh failed, authenticating again: {err:?}"),
                }
            }
        }

        let token = self.login().await?;
        self.cache.save(&token)?;
        Ok(token.access_token)
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<CachedToken> {
        log::debug!("refreshing Spotify access token");
        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|err| {
                Report::new(AuthError).attach_printable(format!("Token refresh failed: {err}"))
            })?;
        Ok(cached_token_from(&response, Some(refresh_token)))
    }

    async fn login(&self) -> AuthResult<CachedToken> {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(
                AppConfig::SCOPES
                    .iter()
                    .map(|scope| Scope::new(scope.to_string())),
            )
            .set_pkce_challenge(pkce_challenge)
            .url();

        println!("{}", "Spotify authorization required.".cyan());
        println!("Open this URL to authorize access: {}", auth_url.to_string().blue());
        if webbrowser::open(auth_url.as_str()).is_err() {
            println!("{}", "Failed to open browser automatically".yellow());
        }

        let callback_url = match loopback_bind_address(&self.redirect_uri) {
            Some(bind_address) => self.capture_callback(&bind_address).await?,
            None => Self::prompt_for_callback()?,
        };
        let code = parse_callback(&callback_url, csrf_token.secret())?;

        log::debug!("exchanging authorization code for an access token");
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(async_http_client)
            .await
            .map_err(|err| {
                Report::new(AuthError).attach_printable(format!("Token exchange failed: {err}"))
            })?;
        println!("{}", "Spotify authentication successful.".green());

        Ok(cached_token_from(&response, None))
    }

    async fn capture_callback(&self, bind_address: &str) -> AuthResult<Url> {
        let server = Server::http(bind_address).map_err(|err| {
            Report::new(AuthError)
                .attach_printable(format!("Failed to listen on {bind_address}: {err}"))
        })?;
        println!("Waiting for authentication callback on {}", self.redirect_uri);

        let timeout = Duration::from_secs(AppConfig::OAUTH_CALLBACK_TIMEOUT_SECS);
        let start = Instant::now();
        loop {
            if start.elapsed() > timeout {
                return Err(Report::new(AuthError).attach_printable("Authentication timeout"));
            }

            let request = server
                .recv_timeout(Duration::from_millis(100))
                .into_report()
                .change_context(AuthError)?;
            let Some(request) = request else {
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            };

            let received = self
                .redirect_uri
                .join(request.url())
                .into_report()
                .change_context(AuthError)?;
            if received.path() != self.redirect_uri.path() {
                let _ = request.respond(Response::from_string("Not Found").with_status_code(404));
                continue;
            }

            let mut response = Response::from_string(CALLBACK_PAGE);
            if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"text/html"[..]) {
                response = response.with_header(header);
            }
            let _ = request.respond(response);
            return Ok(received);
        }
    }

    fn prompt_for_callback() -> AuthResult<Url> {
        print!("Paste the URL you were redirected to: ");
        io::stdout().flush().into_report().change_context(AuthError)?;
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .into_report()
            .change_context(AuthError)?;
        Url::parse(line.trim())
            .into_report()
            .change_context(AuthError)
            .attach_printable("The pasted value is not a URL")
    }
}

fn cached_token_from(response: &BasicTokenResponse, previous_refresh: Option<&str>) -> CachedToken {
    let lifetime = response
        .expires_in()
        .and_then(|duration| chrono::Duration::from_std(duration).ok())
        .unwrap_or_else(|| chrono::Duration::hours(1));
    let scope = match response.scopes() {
        Some(scopes) => scopes
            .iter()
            .map(|scope| scope.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        None => AppConfig::scope_string(),
    };
    CachedToken {
        access_token: response.access_token().secret().to_string(),
        // Spotify may omit the refresh token on refresh; keep the previous one then
        refresh_token: response
            .refresh_token()
            .map(|token| token.secret().to_string())
            .or_else(|| previous_refresh.map(str::to_string)),
        expires_at: chrono::Utc::now() + lifetime,
        scope,
    }
}

fn covers_scopes(granted: &str) -> bool {
    let granted = granted.split_whitespace().collect::<Vec<_>>();
    AppConfig::SCOPES.iter().all(|scope| granted.contains(scope))
}

/// The address to listen on when the redirect URI points back at this machine.
fn loopback_bind_address(redirect_uri: &Url) -> Option<String> {
    let host = redirect_uri.host_str()?;
    let port = redirect_uri.port()?;
    match host {
        "localhost" | "127.0.0.1" | "[::1]" => Some(format!("{host}:{port}")),
        _ => None,
    }
}

fn parse_callback(callback_url: &Url, expected_state: &str) -> AuthResult<String> {
    let mut code = None;
    let mut state = None;
    for (key, value) in callback_url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => {
                return Err(Report::new(AuthError)
                    .attach_printable(format!("Authorization was denied: {value}")))
            }
            _ => {}
        }
    }
    if state.as_deref() != Some(expected_state) {
        return Err(Report::new(AuthError).attach_printable("State mismatch in the callback"));
    }
    code.ok_or_else(|| {
        Report::new(AuthError).attach_printable("Could not find 'code' in callback URL")
    })
}
