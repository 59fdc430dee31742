use std::{sync::Arc, time::Duration};

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::{config::HttpHost, prelude::*};
use super::{
    BotConfig,
    schema::{BotUser, SendMessage, TgResponse, Update},
};


/// Added to the long polling timeout to get the HTTP timeout of `getUpdates`.
const POLL_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// Timeout for all requests except `getUpdates`.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Talks to the Telegram Bot API. Cheap to clone.
#[derive(Clone)]
pub(crate) struct TelegramClient {
    http_client: reqwest::Client,
    api_url: HttpHost,
    token: Arc<SecretString>,
}

impl TelegramClient {
    /// Creates a client if a bot token is configured.
    pub(crate) fn from_config(config: &BotConfig) -> Result<Option<Self>> {
        let Some(token) = &config.token else {
            return Ok(None);
        };

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("todolist/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Some(Self {
            http_client,
            api_url: config.api_url.clone(),
            token: Arc::new(token.clone()),
        }))
    }

    /// Long polls for updates with an ID of at least `offset`.
    pub(crate) async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>> {
        let query = [
            ("offset", offset.to_string()),
            ("timeout", timeout.as_secs().to_string()),
            ("allowed_updates", r#"["message"]"#.to_owned()),
        ];
        let req = self.http_client.get(self.method_url("getUpdates"))
            .query(&query)
            .timeout(timeout + POLL_TIMEOUT_MARGIN);

        self.send("getUpdates", req).await
    }

    pub(crate) async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let req = self.http_client.post(self.method_url("sendMessage"))
            .json(&SendMessage { chat_id, text })
            .timeout(REQUEST_TIMEOUT);

        let _: serde_json::Value = self.send("sendMessage", req).await?;
        trace!("Sent message to chat {chat_id}");
        Ok(())
    }

    /// Returns information about the bot. Useful to check the token.
    pub(crate) async fn get_me(&self) -> Result<BotUser> {
        let req = self.http_client.get(self.method_url("getMe")).timeout(REQUEST_TIMEOUT);
        self.send("getMe", req).await
    }

    fn method_url(&self, method: &str) -> String {
        self.api_url.join(&format!("/bot{}/{method}", self.token.expose_secret()))
    }

    /// Sends the request and unpacks the response envelope. The URL contains
    /// the token, so errors only mention the API method.
    async fn send<T: DeserializeOwned>(
        &self,
        method: &str,
        req: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = req.send().await
            .map_err(|e| anyhow!("{}", e.without_url()))
            .with_context(|| format!("HTTP request '{method}' to {} failed", self.api_url))?;

        let status = response.status();
        let body = response.bytes().await
            .map_err(|e| anyhow!("{}", e.without_url()))
            .with_context(|| format!("failed to read response of '{method}'"))?;

        serde_json::from_slice::<TgResponse<T>>(&body)
            .with_context(|| format!("invalid response to '{method}' (status {status})"))?
            .into_result()
            .with_context(|| format!("Telegram method '{method}' failed"))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>) -> BotConfig {
        BotConfig {
            token: token.map(|t| SecretString::from(t.to_owned())),
            api_url: "https://api.telegram.org".parse().unwrap(),
            poll_timeout: Duration::from_secs(60),
            error_backoff: Duration::from_secs(5),
            verification_code_length: 8,
        }
    }

    #[test]
    fn no_token_no_client() {
        assert!(TelegramClient::from_config(&config(None)).unwrap().is_none());
    }

    #[test]
    fn method_urls() {
        let client = TelegramClient::from_config(&config(Some("123:abc"))).unwrap().unwrap();
        assert_eq!(client.method_url("getMe"), "https://api.telegram.org/bot123:abc/getMe");
    }
}
