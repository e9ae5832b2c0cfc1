//! REST client for the cart and order endpoints.

use crate::model::{
    AddToCart, CartBucket, Identity, ItemId, Order, OrderId, PlaceOrderRequest, RestaurantRef,
    StatusChange,
};
use crate::remote::{CartAuthority, OrderAuthority, RemoteError};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// HTTP implementation of both authorities against one API base URL.
#[derive(Debug, Clone)]
pub struct HttpAuthority {
    base_url: String,
    http: Client,
}

impl HttpAuthority {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str, identity: &Identity) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(&identity.token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(%status, "Remote request failed");
        Err(error_from_response(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        Ok(self.send(request).await?.json().await?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    current_restaurant: Option<RestaurantRef>,
}

/// Maps a non-2xx response onto the error taxonomy.
fn error_from_response(status: StatusCode, body: &str) -> RemoteError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    match status {
        StatusCode::CONFLICT => match parsed.as_ref().and_then(|b| b.current_restaurant.clone()) {
            Some(current) => RemoteError::Conflict(current),
            None => RemoteError::Status {
                status: status.as_u16(),
                message: "conflict without current restaurant".to_string(),
            },
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthenticated,
        StatusCode::NOT_FOUND => RemoteError::NotFound(
            parsed
                .and_then(|b| b.message)
                .unwrap_or_else(|| "resource".to_string()),
        ),
        _ => RemoteError::Status {
            status: status.as_u16(),
            message: parsed
                .and_then(|b| b.message)
                .unwrap_or_else(|| body.to_string()),
        },
    }
}

#[async_trait]
impl CartAuthority for HttpAuthority {
    #[instrument(skip(self), fields(identity = %identity))]
    async fn fetch(&self, identity: &Identity) -> Result<Vec<CartBucket>, RemoteError> {
        debug!("GET /cart");
        self.send_json(self.request(Method::GET, "/cart", identity))
            .await
    }

    #[instrument(skip(self, request), fields(identity = %identity, restaurant = %request.restaurant_id))]
    async fn add(&self, identity: &Identity, request: &AddToCart) -> Result<CartBucket, RemoteError> {
        debug!(?request, "POST /cart");
        self.send_json(self.request(Method::POST, "/cart", identity).json(request))
            .await
    }

    #[instrument(skip(self), fields(identity = %identity))]
    async fn update_quantity(
        &self,
        identity: &Identity,
        item_id: &ItemId,
        quantity: u32,
    ) -> Result<(), RemoteError> {
        let body = serde_json::json!({ "quantity": quantity });
        self.send(
            self.request(Method::PATCH, &format!("/cart/{item_id}"), identity)
                .json(&body),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(identity = %identity))]
    async fn remove(&self, identity: &Identity, item_id: &ItemId) -> Result<(), RemoteError> {
        self.send(self.request(Method::DELETE, &format!("/cart/{item_id}"), identity))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(identity = %identity))]
    async fn clear(&self, identity: &Identity) -> Result<(), RemoteError> {
        self.send(self.request(Method::DELETE, "/cart", identity))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderAuthority for HttpAuthority {
    #[instrument(skip(self, request), fields(identity = %identity))]
    async fn place_order(
        &self,
        identity: &Identity,
        request: &PlaceOrderRequest,
    ) -> Result<Order, RemoteError> {
        debug!(?request, "POST /orders/place-order");
        self.send_json(
            self.request(Method::POST, "/orders/place-order", identity)
                .json(request),
        )
        .await
    }

    #[instrument(skip(self), fields(identity = %identity))]
    async fn get_order(&self, identity: &Identity, id: &OrderId) -> Result<Order, RemoteError> {
        self.send_json(self.request(Method::GET, &format!("/orders/{id}"), identity))
            .await
    }

    #[instrument(skip(self), fields(identity = %identity))]
    async fn update_status(
        &self,
        identity: &Identity,
        id: &OrderId,
        change: &StatusChange,
    ) -> Result<Order, RemoteError> {
        self.send_json(
            self.request(Method::PATCH, &format!("/orders/{id}"), identity)
                .json(change),
        )
        .await
    }

    #[instrument(skip(self), fields(identity = %identity))]
    async fn order_history(&self, identity: &Identity) -> Result<Vec<Order>, RemoteError> {
        self.send_json(self.request(Method::GET, "/orders/order-history", identity))
            .await
    }
}
