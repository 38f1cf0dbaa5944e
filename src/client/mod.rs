//! HTTP client for the FreshCart API.
//!
//! Wraps `reqwest` with bearer-token handling: every authenticated call goes
//! through the [`TokenCoordinator`], and a 401 triggers one refresh and one replay.
//! Cart totals can be estimated locally with the same fee table the server uses;
//! the server's figures always win.

pub mod token;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::TokenPair;
use crate::models::{Cart, Money, Order, PaymentMethod, User, Wallet};
use crate::pricing::{self, PriceBreakdown, PricingError};

pub use token::TokenCoordinator;

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(Arc<reqwest::Error>),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("not signed in")]
    NotAuthenticated,
    #[error("session expired; sign in again")]
    SessionExpired,
    #[error("request rejected after refreshing the access token")]
    Unauthorized,
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(Arc::new(err))
    }
}

#[derive(Deserialize)]
struct AuthEnvelope {
    user: User,
    #[serde(flatten)]
    tokens: TokenPair,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct ApiClient {
    http: Client,
    base_url: Url,
    tokens: TokenCoordinator,
}

impl ApiClient {
    /// # Errors
    ///
    /// [`ClientError::Http`] if the `reqwest` client cannot be built, or
    /// [`ClientError::InvalidUrl`] for a malformed `base_url`.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("freshcart-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Relative joins need exactly one trailing slash on the base.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;

        Ok(Self {
            http,
            base_url,
            tokens: TokenCoordinator::new(),
        })
    }

    pub fn tokens(&self) -> &TokenCoordinator {
        &self.tokens
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidUrl(format!("{path}: {e}")))?;
        Ok(self.http.request(method, url))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn exchange_refresh_token(&self, refresh_token: String) -> Result<TokenPair, ClientError> {
        let response = self
            .request(Method::POST, "api/auth/refresh-token")?
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::SessionExpired);
        }
        let envelope: AuthEnvelope = Self::decode(response).await?;
        Ok(envelope.tokens)
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: &str,
    ) -> Result<Response, ClientError> {
        let mut request = self.request(method, path)?.bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Sends an authenticated request, refreshing and replaying once on a 401.
    ///
    /// # Errors
    ///
    /// [`ClientError::Unauthorized`] if the replay is rejected too, otherwise any
    /// transport, refresh, or API error.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ClientError> {
        let token = self
            .tokens
            .acquire_token(|refresh_token| self.exchange_refresh_token(refresh_token))
            .await?;

        let response = self.send_once(method.clone(), path, body, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::decode(response).await;
        }

        tracing::debug!(path, "access token rejected; refreshing");
        let token = self
            .tokens
            .refresh(&token, |refresh_token| self.exchange_refresh_token(refresh_token))
            .await?;

        let response = self.send_once(method, path, body, &token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        Self::decode(response).await
    }

    pub async fn login(&self, uid: &str) -> Result<User, ClientError> {
        let response = self
            .request(Method::POST, "api/auth/login")?
            .json(&json!({ "uid": uid }))
            .send()
            .await?;
        let envelope: AuthEnvelope = Self::decode(response).await?;
        self.tokens.set_session(envelope.tokens).await;
        Ok(envelope.user)
    }

    /// Revokes the refresh token on the server and forgets the session locally.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if let Some(refresh_token) = self.tokens.refresh_token().await {
            let response = self
                .request(Method::POST, "api/auth/logout")?
                .json(&json!({ "refreshToken": refresh_token }))
                .send()
                .await;
            if let Err(err) = response {
                tracing::warn!(error = %err, "logout request failed; clearing session anyway");
            }
        }
        self.tokens.clear().await;
        Ok(())
    }

    pub async fn me(&self) -> Result<User, ClientError> {
        self.send(Method::GET, "api/users/me", None).await
    }

    pub async fn cart(&self) -> Result<Cart, ClientError> {
        self.send(Method::GET, "api/cart", None).await
    }

    /// Adds to the cart and checks the server's totals against `estimate`.
    ///
    /// The returned cart is always the server's; a mismatch is only logged.
    pub async fn add_to_cart(
        &self,
        product_id: &str,
        quantity: u32,
        estimate: Option<&PriceBreakdown>,
    ) -> Result<Cart, ClientError> {
        let body = json!({ "productId": product_id, "quantity": quantity });
        let cart: Cart = self.send(Method::POST, "api/cart/items", Some(&body)).await?;
        if let Some(estimate) = estimate {
            pricing::reconcile(estimate, confirmed_totals(&cart)?);
        }
        Ok(cart)
    }

    pub async fn set_quantity(&self, product_id: &str, quantity: u32) -> Result<Cart, ClientError> {
        let body = json!({ "quantity": quantity });
        self.send(Method::PUT, &format!("api/cart/items/{product_id}"), Some(&body))
            .await
    }

    pub async fn place_order(
        &self,
        payment_method: PaymentMethod,
        delivery_address: &str,
    ) -> Result<Order, ClientError> {
        let body = json!({
            "paymentMethod": payment_method,
            "deliveryAddress": delivery_address,
        });
        self.send(Method::POST, "api/orders", Some(&body)).await
    }

    pub async fn wallet(&self) -> Result<Wallet, ClientError> {
        self.send(Method::GET, "api/wallet", None).await
    }
}

/// Local totals for `cart` after adding `quantity` units at `unit_price`.
///
/// # Errors
///
/// [`ClientError::Pricing`] if the resulting subtotal is negative.
pub fn estimate_after_add(cart: &Cart, unit_price: Money, quantity: u32) -> Result<PriceBreakdown, ClientError> {
    Ok(pricing::quote(cart.subtotal + unit_price.times(quantity))?)
}

/// The server's figures for `cart` as a breakdown.
fn confirmed_totals(cart: &Cart) -> Result<PriceBreakdown, ClientError> {
    let mut breakdown = pricing::quote(cart.subtotal)?;
    breakdown.delivery_fee = cart.delivery_fee;
    breakdown.total_amount = cart.total_amount;
    Ok(breakdown)
}
