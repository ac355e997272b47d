use async_trait::async_trait;
use regex::Regex;
use reqwest::{cookie::Jar, Client, Response};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::RunSettings;
use crate::domain::{
    error::{AuthError, HarvestError},
    models::{Credentials, QueryParams},
    ports::{ReportSession, SessionAuthenticator},
};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Element ids and form names of the two-step login form.
#[derive(Debug, Clone)]
pub struct LoginForm {
    pub identity_id: &'static str,
    pub identity_name: &'static str,
    pub secret_id: &'static str,
    pub secret_name: &'static str,
}

impl Default for LoginForm {
    fn default() -> Self {
        Self {
            identity_id: "user_session_email",
            identity_name: "user_session[email]",
            secret_id: "user_session_password",
            secret_name: "user_session[password]",
        }
    }
}

/// Performs the login with a cookie-jar client, then hands the jar to a
/// separate request-only client.
pub struct HttpSessionAuthenticator {
    base_url: String,
    login_path: String,
    user_info_path: String,
    auth_timeout: Duration,
    request_timeout: Duration,
    form: LoginForm,
}

impl HttpSessionAuthenticator {
    pub fn new(settings: &RunSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            login_path: settings.login_path.clone(),
            user_info_path: settings.user_info_path.clone(),
            auth_timeout: settings.auth_timeout,
            request_timeout: settings.request_timeout,
            form: LoginForm::default(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_page(step: &'static str, response: Result<Response, reqwest::Error>) -> Result<String, AuthError> {
        let response = response.map_err(|e| AuthError::Transport(format!("{} step: {}", step, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected { step, status: status.as_u16() });
        }
        response
            .text()
            .await
            .map_err(|e| AuthError::Transport(format!("{} step body: {}", step, e)))
    }

    /// Blocks until the user-info endpoint answers with success, or `timeout` elapses.
    async fn wait_for_authenticated(&self, client: &Client) -> Result<(), AuthError> {
        let url = self.url(&self.user_info_path);
        debug!("Waiting up to {:?} for {} to succeed", self.auth_timeout, url);

        let poll = async {
            let mut attempts = 0u32;
            loop {
                attempts += 1;
                match client.get(&url).send().await {
                    Ok(resp) if resp.status().is_success() => return attempts,
                    Ok(resp) => debug!("user-info check {} answered {}", attempts, resp.status()),
                    Err(e) => debug!("user-info check {} failed: {}", attempts, e),
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        let attempts = tokio::time::timeout(self.auth_timeout, poll)
            .await
            .map_err(|_| AuthError::Timeout(self.auth_timeout))?;
        debug!("Authenticated signal observed after {} check(s)", attempts);
        Ok(())
    }

    async fn login(&self, client: &Client, credentials: &Credentials) -> Result<(), AuthError> {
        let login_url = self.url(&self.login_path);

        info!("Opening login page: {}", login_url);
        let page = Self::read_page("open", client.get(&login_url).send().await).await?;
        require_field(&page, "identity", self.form.identity_id)?;
        let token = extract_authenticity_token(&page);

        debug!("Submitting identity");
        let mut fields = vec![(self.form.identity_name, credentials.identity.as_str())];
        if let Some(token) = token.as_deref() {
            fields.push(("authenticity_token", token));
        }
        let page = Self::read_page("identity", client.post(&login_url).form(&fields).send().await).await?;

        // The secret field only exists once the identity step has been accepted.
        require_field(&page, "secret", self.form.secret_id)?;
        let token = extract_authenticity_token(&page).or(token);

        debug!("Submitting secret");
        let mut fields = vec![
            (self.form.identity_name, credentials.identity.as_str()),
            (self.form.secret_name, credentials.secret.as_str()),
        ];
        if let Some(token) = token.as_deref() {
            fields.push(("authenticity_token", token));
        }
        Self::read_page("secret", client.post(&login_url).form(&fields).send().await).await?;

        self.wait_for_authenticated(client).await
    }
}

#[async_trait]
impl SessionAuthenticator for HttpSessionAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Box<dyn ReportSession>, HarvestError> {
        let jar = Arc::new(Jar::default());
        let login_client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let outcome = self.login(&login_client, credentials).await;
        drop(login_client);
        outcome?;
        info!("Login successful");

        let api_client = Client::builder()
            .cookie_provider(jar)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let base_url = Url::parse(&self.base_url)
            .map_err(|e| HarvestError::Configuration(format!("invalid base url '{}': {}", self.base_url, e)))?;

        Ok(Box::new(HttpReportSession { client: Some(api_client), base_url }))
    }
}

fn require_field(page: &str, step: &'static str, id: &str) -> Result<(), AuthError> {
    if has_field(page, id) {
        Ok(())
    } else {
        warn!("Login page for {} step has no '{}' field", step, id);
        Err(AuthError::MissingField { step, field: id.to_string() })
    }
}

pub fn has_field(page: &str, id: &str) -> bool {
    let pattern = format!(r#"id\s*=\s*["']{}["']"#, regex::escape(id));
    Regex::new(&pattern).map_or(false, |re| re.is_match(page))
}

/// Pulls the hidden `authenticity_token` value out of a form, if present.
pub fn extract_authenticity_token(page: &str) -> Option<String> {
    static TOKEN: OnceLock<Option<Regex>> = OnceLock::new();
    let re = TOKEN
        .get_or_init(|| {
            Regex::new(r#"name\s*=\s*["']authenticity_token["'][^>]*?value\s*=\s*["']([^"']*)["']"#).ok()
        })
        .as_ref()?;
    re.captures(page).map(|c| c[1].to_string())
}

/// Request-only capability over an authenticated cookie jar.
pub struct HttpReportSession {
    client: Option<Client>,
    base_url: Url,
}

impl HttpReportSession {
    fn build_url(&self, path: &str, params: &QueryParams) -> Result<Url, String> {
        let mut url = self.base_url.join(path).map_err(|e| e.to_string())?;
        if !params.is_empty() {
            url.set_query(Some(&params.encode()));
        }
        Ok(url)
    }
}

#[async_trait]
impl ReportSession for HttpReportSession {
    async fn get_json(&self, report: &str, path: &str, params: &QueryParams) -> Result<serde_json::Value, HarvestError> {
        let fail = |status: String, excerpt: String| HarvestError::ReportFetch {
            report: report.to_string(),
            endpoint: path.to_string(),
            query: params.encode(),
            status,
            excerpt,
        };

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| fail("none".into(), "session already released".into()))?;
        let url = self.build_url(path, params).map_err(|e| fail("none".into(), e))?;

        info!("GET {}", url);
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| fail("no response".into(), e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| fail(status.to_string(), format!("failed to read body: {}", e)))?;

        if !status.is_success() {
            return Err(fail(status.to_string(), HarvestError::excerpt(&body)));
        }

        serde_json::from_str(&body).map_err(|e| {
            fail(status.to_string(), format!("invalid JSON ({}): {}", e, HarvestError::excerpt(&body)))
        })
    }

    async fn release(&mut self) {
        if self.client.take().is_some() {
            debug!("HTTP report session released");
        }
    }
}
