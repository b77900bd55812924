//! Typed client for the signaling protocol.
//!
//! Every call is a JSON POST. Any status or body the protocol does not
//! allow comes back as a [`ProtocolError`]; nothing is retried.

use reqwest::{Client, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{ClientConfig, base_url};
use crate::error::ProtocolError;
use crate::protocol::{
    CallSignal, NickRequest, PresenceEvent, SignInRequest, SignInResponse, endpoint,
};

/// Python-style truthiness of a JSON value.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[derive(Debug, Clone)]
pub struct SignalingClient {
    http: Client,
    base_url: String,
}

impl SignalingClient {
    /// `server` is a host (`localhost:5000`) or a full root URL.
    pub fn new(http: Client, server: &str) -> Self {
        Self {
            http,
            base_url: base_url(server),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ProtocolError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::new(http, &config.server))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<Response, ProtocolError> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::trace!(%url, "POST");
        // `.json()` sets `Content-Type: application/json`.
        Ok(self.http.post(url).json(body).send().await?)
    }

    fn expect_status(
        endpoint: &'static str,
        response: &Response,
        expected: StatusCode,
    ) -> Result<(), ProtocolError> {
        if response.status() != expected {
            return Err(ProtocolError::UnexpectedStatus {
                endpoint,
                expected: expected.as_u16(),
                actual: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(
        endpoint: &'static str,
        response: Response,
    ) -> Result<T, ProtocolError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|source| ProtocolError::Json { endpoint, source })
    }

    /// POST expecting `204 No Content`.
    async fn post_no_content<B: Serialize + ?Sized>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<(), ProtocolError> {
        let response = self.post_json(endpoint, body).await?;
        Self::expect_status(endpoint, &response, StatusCode::NO_CONTENT)?;
        let text = response.text().await?;
        if !text.is_empty() {
            return Err(ProtocolError::UnexpectedBody {
                endpoint,
                body: text,
            });
        }
        Ok(())
    }

    /// Bare `signin` request. Returns once the server echoed `nick`.
    pub async fn signin(&self, nick: &str) -> Result<(), ProtocolError> {
        let body = SignInRequest {
            assertion: nick.to_string(),
        };
        let response = self.post_json(endpoint::SIGNIN, &body).await?;
        Self::expect_status(endpoint::SIGNIN, &response, StatusCode::OK)?;
        let answer: SignInResponse = Self::read_json(endpoint::SIGNIN, response).await?;
        if answer.nick != nick {
            return Err(ProtocolError::NickMismatch {
                expected: nick.to_string(),
                actual: answer.nick,
            });
        }
        Ok(())
    }

    pub async fn request_presence(&self, nick: &str) -> Result<(), ProtocolError> {
        self.post_no_content(endpoint::PRESENCE_REQUEST, &NickRequest::new(nick))
            .await
    }

    /// Full sign-in: `signin`, `presenceRequest`, then one poll to flush
    /// the stream. Whatever that poll returned is kept on the session.
    pub async fn sign_in(&self, nick: &str) -> Result<Session<'_>, ProtocolError> {
        self.signin(nick).await?;
        self.request_presence(nick).await?;

        let flushed = self.poll_stream(nick).await?;
        if flushed.is_empty() {
            tracing::debug!("signed in");
        } else {
            tracing::debug!(count = flushed.len(), "signed in with queued events");
        }
        Ok(Session {
            client: self,
            nick: nick.to_string(),
            flushed,
        })
    }

    pub async fn sign_out(&self, nick: &str) -> Result<(), ProtocolError> {
        let response = self
            .post_json(endpoint::SIGNOUT, &NickRequest::new(nick))
            .await?;
        Self::expect_status(endpoint::SIGNOUT, &response, StatusCode::OK)?;
        let body: Value = Self::read_json(endpoint::SIGNOUT, response).await?;
        if !is_truthy(&body) {
            return Err(ProtocolError::UnexpectedBody {
                endpoint: endpoint::SIGNOUT,
                body: body.to_string(),
            });
        }
        Ok(())
    }

    /// One long-poll. Waits until the server has events or gives up.
    pub async fn poll_stream(&self, nick: &str) -> Result<Vec<PresenceEvent>, ProtocolError> {
        self.poll(NickRequest::new(nick)).await
    }

    /// A `firstRequest` poll, answered immediately without draining.
    pub async fn poll_first(&self, nick: &str) -> Result<Vec<PresenceEvent>, ProtocolError> {
        self.poll(NickRequest {
            nick: nick.to_string(),
            first_request: true,
        })
        .await
    }

    async fn poll(&self, request: NickRequest) -> Result<Vec<PresenceEvent>, ProtocolError> {
        let response = self.post_json(endpoint::STREAM, &request).await?;
        Self::expect_status(endpoint::STREAM, &response, StatusCode::OK)?;
        Self::read_json(endpoint::STREAM, response).await
    }

    /// General call-control POST; `signal.data` must name the `peer`.
    pub async fn send_call_signal(
        &self,
        endpoint: &'static str,
        signal: &CallSignal,
    ) -> Result<(), ProtocolError> {
        self.post_no_content(endpoint, signal).await
    }

    pub async fn send_call_offer(&self, from: &str, to: &str) -> Result<(), ProtocolError> {
        self.send_call_signal(endpoint::CALL_OFFER, &CallSignal::new(from, to))
            .await
    }

    pub async fn accept_call(&self, from: &str, to: &str) -> Result<(), ProtocolError> {
        self.send_call_signal(endpoint::CALL_ACCEPTED, &CallSignal::new(from, to))
            .await
    }

    pub async fn hangup_call(&self, from: &str, to: &str) -> Result<(), ProtocolError> {
        self.send_call_signal(endpoint::CALL_HANGUP, &CallSignal::new(from, to))
            .await
    }

    /// Tells the signed-in `nick` that its instant-share link for `email`
    /// was opened.
    pub async fn instant_share(&self, nick: &str, email: &str) -> Result<(), ProtocolError> {
        let invalid = || ProtocolError::InvalidUrl {
            url: self.base_url.clone(),
        };
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .push(endpoint::INSTANT_SHARE)
            .push(email);

        tracing::trace!(%url, "POST");
        let response = self
            .http
            .post(url)
            .json(&NickRequest::new(nick))
            .send()
            .await?;
        Self::expect_status(endpoint::INSTANT_SHARE, &response, StatusCode::OK)
    }

    pub async fn send_ice_candidate(
        &self,
        from: &str,
        to: &str,
        candidate: Value,
    ) -> Result<(), ProtocolError> {
        let signal = CallSignal::new(from, to).with_field("candidate", candidate);
        self.send_call_signal(endpoint::ICE_CANDIDATE, &signal).await
    }
}

/// A signed-in nickname. Owned by the task that signed in.
#[derive(Debug)]
pub struct Session<'a> {
    client: &'a SignalingClient,
    nick: String,
    /// Events drained by the sign-in poll
    flushed: Vec<PresenceEvent>,
}

impl<'a> Session<'a> {
    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn client(&self) -> &'a SignalingClient {
        self.client
    }

    /// Events that were already queued when the session signed in.
    pub fn flushed(&self) -> &[PresenceEvent] {
        &self.flushed
    }

    pub async fn poll(&self) -> Result<Vec<PresenceEvent>, ProtocolError> {
        self.client.poll_stream(&self.nick).await
    }

    pub async fn offer(&self, peer: &str) -> Result<(), ProtocolError> {
        self.client.send_call_offer(&self.nick, peer).await
    }

    pub async fn accept(&self, peer: &str) -> Result<(), ProtocolError> {
        self.client.accept_call(&self.nick, peer).await
    }

    pub async fn hangup(&self, peer: &str) -> Result<(), ProtocolError> {
        self.client.hangup_call(&self.nick, peer).await
    }

    pub async fn ice_candidate(&self, peer: &str, candidate: Value) -> Result<(), ProtocolError> {
        self.client
            .send_ice_candidate(&self.nick, peer, candidate)
            .await
    }

    /// Ends the session. The nickname must sign in again to be used.
    pub async fn sign_out(self) -> Result<(), ProtocolError> {
        self.client.sign_out(&self.nick).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness_matches_python() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!({"ok": 1})));
        assert!(is_truthy(&json!(1)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
    }

    #[test]
    fn client_normalises_server_url() {
        let client = SignalingClient::new(Client::new(), "example.org:8080");
        assert_eq!(client.base_url(), "http://example.org:8080/");
    }
}
