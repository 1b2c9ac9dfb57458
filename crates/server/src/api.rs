//! JSON endpoints consumed by the mobile client.
//!
//! Every handler is a thin translation layer: it decodes the request body,
//! calls [`MarketEngine`], [`CommunityService`] or [`AgentRuntime`], and maps
//! `ApplicationError` to a status code through `InterfaceError`.

use std::sync::Arc;

use axum::extract::{FromRequest, Request, State};
use axum::{http::StatusCode, routing::get, routing::post, Json, Router};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};
use uuid::Uuid;

use farmlink_agent::{AgentRequest, AgentRuntime};
use farmlink_core::domain::community::CommunityMessage;
use farmlink_core::domain::delivery::DeliveryAgentCode;
use farmlink_core::domain::order::OrderId;
use farmlink_core::domain::product::{Location, ProductId};
use farmlink_core::domain::session::{SessionId, UserId};
use farmlink_core::market::{
    order_views, product_views, BrowseQuery, DeliveryUpdate, OrderView, ProductView, PurchaseItem,
    RatingRequest, SellRequest,
};
use farmlink_core::{
    ApplicationError, CommunityService, InterfaceError, MarketEngine, NewCommunityMessage,
};

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppContext {
    pub market: MarketEngine,
    pub community: CommunityService,
    pub agent: Arc<AgentRuntime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub error: String,
}

pub type ApiFailure = (StatusCode, Json<ApiError>);

pub fn router(context: AppContext) -> Router {
    Router::new()
        .route("/get_or_create_session", post(get_or_create_session))
        .route("/stream_query_agent", post(stream_query_agent))
        .route("/list_products", post(list_products))
        .route("/purchase_product", post(purchase_product))
        .route("/list_orders", post(list_orders))
        .route("/list_user_products", post(list_user_products))
        .route("/get_agent_dashboard_orders", post(get_agent_dashboard_orders))
        .route("/delivery_update", post(delivery_update))
        .route("/rate_product", post(rate_product))
        .route("/sell_product", post(sell_product))
        .route("/getCommunityMessages", get(get_community_messages))
        .route("/sendCommunityMessage", post(send_community_message))
        .with_state(context)
}

fn failure(operation: &'static str, error: ApplicationError) -> ApiFailure {
    let interface = error.into_interface(Uuid::new_v4().to_string());
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(
            event_name = "api.request.failed",
            operation,
            correlation_id = interface.correlation_id(),
            error = interface.message(),
            "request failed"
        );
    }
    (status, Json(ApiError { error: interface.message().to_string() }))
}

/// `Json` body whose decode failures are answered like every other
/// validation error: 400 with an `{error}` body.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiFailure;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(failure(
                "decode_request",
                ApplicationError::validation(format!("Invalid request body: {}", rejection.body_text())),
            )),
        }
    }
}

fn required(value: &str, field: &'static str) -> Result<(), ApiFailure> {
    if value.trim().is_empty() {
        return Err(failure("validate", ApplicationError::validation(format!("{field} is required."))));
    }
    Ok(())
}

fn location(state: Option<String>, district: Option<String>) -> Option<Location> {
    let state = state.filter(|value| !value.trim().is_empty())?;
    let district = district.filter(|value| !value.trim().is_empty())?;
    Some(Location::new(state.trim(), district.trim()))
}

// Sessions

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SessionRequest {
    pub user_id: String,
    pub state: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub state: Map<String, Value>,
}

pub async fn get_or_create_session(
    State(context): State<AppContext>,
    ApiJson(request): ApiJson<SessionRequest>,
) -> Result<Json<SessionResponse>, ApiFailure> {
    required(&request.user_id, "user_id")?;
    let session = context
        .market
        .get_or_create_session(&UserId(request.user_id), &request.state)
        .await
        .map_err(|error| failure("get_or_create_session", error))?;

    Ok(Json(SessionResponse { session_id: session.id.0.clone(), state: session.state_snapshot() }))
}

// Agent

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StreamQueryRequest {
    pub user_id: String,
    pub session_id: String,
    pub message: Option<String>,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StreamQueryResponse {
    pub response: String,
}

pub async fn stream_query_agent(
    State(context): State<AppContext>,
    ApiJson(request): ApiJson<StreamQueryRequest>,
) -> Result<Json<StreamQueryResponse>, ApiFailure> {
    let reply = context
        .agent
        .handle(AgentRequest {
            user_id: UserId(request.user_id),
            session_id: SessionId(request.session_id),
            message: request.message,
            audio_url: request.audio_url,
            image_url: request.image_url,
        })
        .await
        .map_err(|error| failure("stream_query_agent", error))?;

    Ok(Json(StreamQueryResponse { response: reply.response }))
}

// Listings

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListProductsRequest {
    pub user_id: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub product_type: Option<String>,
    pub product_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub products: Vec<ProductView>,
}

pub async fn list_products(
    State(context): State<AppContext>,
    ApiJson(request): ApiJson<ListProductsRequest>,
) -> Result<Json<ProductsResponse>, ApiFailure> {
    let products = context
        .market
        .browse(BrowseQuery {
            requester: request.user_id.filter(|id| !id.trim().is_empty()).map(UserId),
            location: location(request.state, request.district),
            category: request.product_type,
            name: request.product_name,
        })
        .await
        .map_err(|error| failure("list_products", error))?;

    Ok(Json(ProductsResponse { products: product_views(&products) }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserRequest {
    pub user_id: String,
}

pub async fn list_user_products(
    State(context): State<AppContext>,
    ApiJson(request): ApiJson<UserRequest>,
) -> Result<Json<ProductsResponse>, ApiFailure> {
    let products = context
        .market
        .products_for_seller(&UserId(request.user_id))
        .await
        .map_err(|error| failure("list_user_products", error))?;

    Ok(Json(ProductsResponse { products: product_views(&products) }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SellProductRequest {
    pub seller_id: Option<String>,
    pub user_id: Option<String>,
    pub seller_name: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub product_name: String,
    pub product_type: Option<String>,
    pub price_per_kg: Option<Decimal>,
    pub quantity_available: i64,
}

#[derive(Debug, Serialize)]
pub struct SellProductResponse {
    pub message: String,
    pub product_id: String,
}

pub async fn sell_product(
    State(context): State<AppContext>,
    ApiJson(request): ApiJson<SellProductRequest>,
) -> Result<Json<SellProductResponse>, ApiFailure> {
    let seller_id = request.seller_id.or(request.user_id).unwrap_or_default();
    required(&seller_id, "seller_id")?;

    let outcome = context
        .market
        .sell(SellRequest {
            seller_id: UserId(seller_id),
            seller_name: request.seller_name,
            location: location(request.state, request.district),
            product_name: request.product_name,
            category: request.product_type,
            price_per_kg: request.price_per_kg,
            quantity: request.quantity_available,
        })
        .await
        .map_err(|error| failure("sell_product", error))?;

    Ok(Json(SellProductResponse {
        message: outcome.message(),
        product_id: outcome.product_id().0.clone(),
    }))
}

// Purchases and orders

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PurchaseLine {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PurchaseRequest {
    pub user_id: String,
    pub product_list: Vec<PurchaseLine>,
}

#[derive(Debug, Serialize)]
pub struct PurchasedOrder {
    pub product_id: String,
    pub order_id: String,
    pub quantity: u32,
    pub remaining_quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct FailedOrder {
    pub product_id: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub status: &'static str,
    pub successful_orders: Vec<PurchasedOrder>,
    pub failed_orders: Vec<FailedOrder>,
}

/// Answers 200 for full or partial success and 400 when every item failed;
/// the body has the same shape either way.
pub async fn purchase_product(
    State(context): State<AppContext>,
    ApiJson(request): ApiJson<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseResponse>), ApiFailure> {
    required(&request.user_id, "user_id")?;
    if request.product_list.is_empty() {
        return Err(failure(
            "purchase_product",
            ApplicationError::validation("product_list must contain at least one item."),
        ));
    }

    let items: Vec<PurchaseItem> = request
        .product_list
        .into_iter()
        .map(|line| PurchaseItem { product_id: ProductId(line.product_id), quantity: line.quantity })
        .collect();
    let batch = context
        .market
        .purchase_many(&UserId(request.user_id.clone()), &items)
        .await
        .map_err(|error| failure("purchase_product", error))?;

    let status = batch.status();
    info!(
        event_name = "api.purchase.completed",
        user_id = %request.user_id,
        status = status.as_str(),
        successful = batch.successful.len(),
        failed = batch.failed.len(),
        "purchase request processed"
    );

    let response = PurchaseResponse {
        status: status.as_str(),
        successful_orders: batch
            .successful
            .into_iter()
            .map(|receipt| PurchasedOrder {
                product_id: receipt.order.product_id.0,
                order_id: receipt.order.id.0,
                quantity: receipt.order.quantity,
                remaining_quantity: receipt.remaining_quantity,
                total_price: receipt.total_price,
            })
            .collect(),
        failed_orders: batch
            .failed
            .into_iter()
            .map(|item| FailedOrder { product_id: item.product_id.0, error: item.error.to_string() })
            .collect(),
    };
    let code =
        if response.successful_orders.is_empty() { StatusCode::BAD_REQUEST } else { StatusCode::OK };
    Ok((code, Json(response)))
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<OrderView>,
}

pub async fn list_orders(
    State(context): State<AppContext>,
    ApiJson(request): ApiJson<UserRequest>,
) -> Result<Json<OrdersResponse>, ApiFailure> {
    let orders = context
        .market
        .orders_for_buyer(&UserId(request.user_id))
        .await
        .map_err(|error| failure("list_orders", error))?;

    Ok(Json(OrdersResponse { orders: order_views(&orders) }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AgentOrdersRequest {
    pub agent_id: String,
}

pub async fn get_agent_dashboard_orders(
    State(context): State<AppContext>,
    ApiJson(request): ApiJson<AgentOrdersRequest>,
) -> Result<Json<OrdersResponse>, ApiFailure> {
    let orders = context
        .market
        .orders_for_agent(&DeliveryAgentCode(request.agent_id))
        .await
        .map_err(|error| failure("get_agent_dashboard_orders", error))?;

    Ok(Json(OrdersResponse { orders: order_views(&orders) }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeliveryUpdateRequest {
    pub agent_id: String,
    pub order_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn delivery_update(
    State(context): State<AppContext>,
    ApiJson(request): ApiJson<DeliveryUpdateRequest>,
) -> Result<Json<MessageResponse>, ApiFailure> {
    let order_id = request.order_id.clone();
    let status = context
        .market
        .update_delivery(DeliveryUpdate {
            agent_code: DeliveryAgentCode(request.agent_id),
            order_id: OrderId(request.order_id),
            status: request.status,
        })
        .await
        .map_err(|error| failure("delivery_update", error))?;

    Ok(Json(MessageResponse {
        message: format!("Order {order_id} marked as {}.", status.as_str()),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RateProductRequest {
    pub order_id: String,
    pub product_id: String,
    pub rating: i64,
    pub user_id: String,
}

pub async fn rate_product(
    State(context): State<AppContext>,
    ApiJson(request): ApiJson<RateProductRequest>,
) -> Result<Json<MessageResponse>, ApiFailure> {
    required(&request.order_id, "order_id")?;
    required(&request.product_id, "product_id")?;
    required(&request.user_id, "user_id")?;

    let receipt = context
        .market
        .rate(RatingRequest {
            order_id: OrderId(request.order_id),
            product_id: ProductId(request.product_id),
            rating: request.rating,
            user_id: UserId(request.user_id),
        })
        .await
        .map_err(|error| failure("rate_product", error))?;

    Ok(Json(MessageResponse {
        message: rating_message(&receipt.product_id, receipt.rating, receipt.rating_count),
    }))
}

fn rating_message(product_id: &ProductId, average: f64, count: u32) -> String {
    let noun = if count == 1 { "rating" } else { "ratings" };
    format!("Thanks for rating! Product {} now averages {average:.1} from {count} {noun}.", product_id.0)
}

// Community

#[derive(Debug, Serialize)]
pub struct CommunityMessageView {
    pub id: String,
    #[serde(rename = "senderId")]
    pub sender_id: String,
    #[serde(rename = "senderName")]
    pub sender_name: String,
    pub text: String,
    pub text_ta: Option<String>,
    pub text_hi: Option<String>,
    pub audio_url: Option<String>,
    pub timestamp: String,
}

impl From<CommunityMessage> for CommunityMessageView {
    fn from(message: CommunityMessage) -> Self {
        Self {
            id: message.id.0,
            sender_id: message.sender_id.0,
            sender_name: message.sender_name,
            text: message.text,
            text_ta: message.text_ta,
            text_hi: message.text_hi,
            audio_url: message.audio_url,
            timestamp: message.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommunityMessagesResponse {
    pub messages: Vec<CommunityMessageView>,
}

pub async fn get_community_messages(
    State(context): State<AppContext>,
) -> Result<Json<CommunityMessagesResponse>, ApiFailure> {
    let messages = context
        .community
        .recent()
        .await
        .map_err(|error| failure("get_community_messages", error))?;

    Ok(Json(CommunityMessagesResponse {
        messages: messages.into_iter().map(CommunityMessageView::from).collect(),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendCommunityMessageRequest {
    #[serde(rename = "senderId")]
    pub sender_id: String,
    #[serde(rename = "senderName")]
    pub sender_name: String,
    pub text: String,
    pub audio_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendCommunityMessageResponse {
    pub message: &'static str,
    pub id: String,
}

pub async fn send_community_message(
    State(context): State<AppContext>,
    ApiJson(request): ApiJson<SendCommunityMessageRequest>,
) -> Result<(StatusCode, Json<SendCommunityMessageResponse>), ApiFailure> {
    let stored = context
        .community
        .post(NewCommunityMessage {
            sender_id: UserId(request.sender_id),
            sender_name: request.sender_name,
            text: request.text,
            audio_url: request.audio_url,
        })
        .await
        .map_err(|error| failure("send_community_message", error))?;

    Ok((
        StatusCode::CREATED,
        Json(SendCommunityMessageResponse { message: "Message sent successfully", id: stored.id.0 }),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{body::Body, extract::State, http::Request, http::StatusCode, Json};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::{json, Map};
    use tower::ServiceExt;

    use farmlink_agent::market_price::{MarketPriceSource, PriceQuery, PriceRecord};
    use farmlink_agent::AgentRuntime;
    use farmlink_core::community::{NoopNotifier, NoopTranslator};
    use farmlink_core::domain::delivery::{DeliveryAgent, DeliveryAgentCode, DeliveryAgentId};
    use farmlink_core::domain::product::{Location, Product, ProductId};
    use farmlink_core::domain::session::UserId;
    use farmlink_core::market::MarketStore;
    use farmlink_core::{ApplicationError, CommunityService, MarketEngine};
    use farmlink_db::{InMemoryCommunityStore, InMemoryMarketStore};

    use super::*;

    struct NoPrices;

    #[async_trait]
    impl MarketPriceSource for NoPrices {
        async fn fetch(&self, _query: &PriceQuery) -> Result<Vec<PriceRecord>, ApplicationError> {
            Ok(Vec::new())
        }
    }

    async fn context() -> AppContext {
        let store = Arc::new(InMemoryMarketStore::new());
        store
            .insert_delivery_agent(&DeliveryAgent {
                id: DeliveryAgentId("agent-1".to_string()),
                code: DeliveryAgentCode("DA-001".to_string()),
                orders_assigned: Vec::new(),
            })
            .await
            .expect("agent");
        store
            .insert_product(&Product {
                id: ProductId("prod-onion".to_string()),
                name: "Onion".to_string(),
                category: "vegetable".to_string(),
                price_per_kg: Decimal::new(3000, 2),
                quantity_available: 10,
                seller_id: UserId("seller-1".to_string()),
                seller_name: "Murugan".to_string(),
                location: Location::new("Tamil Nadu", "Villupuram"),
                rating: None,
                rating_count: 0,
                listed_at: Utc::now(),
            })
            .await
            .expect("product");

        let market = MarketEngine::new(store);
        let community = CommunityService::new(
            Arc::new(InMemoryCommunityStore::default()),
            Arc::new(NoopTranslator),
            Arc::new(NoopNotifier),
            "community",
            50,
        );
        let agent = Arc::new(AgentRuntime::new(market.clone(), Arc::new(NoPrices), None));
        AppContext { market, community, agent }
    }

    fn farmer_state() -> Map<String, serde_json::Value> {
        json!({ "state": "Tamil Nadu", "district": "Villupuram", "name": "Lakshmi" })
            .as_object()
            .cloned()
            .expect("object")
    }

    async fn open_session(context: &AppContext, user_id: &str) -> String {
        let Json(session) = get_or_create_session(
            State(context.clone()),
            ApiJson(SessionRequest { user_id: user_id.to_string(), state: farmer_state() }),
        )
        .await
        .expect("session");
        session.session_id
    }

    fn purchase(user_id: &str, product_id: &str, quantity: i64) -> PurchaseRequest {
        PurchaseRequest {
            user_id: user_id.to_string(),
            product_list: vec![PurchaseLine { product_id: product_id.to_string(), quantity }],
        }
    }

    #[tokio::test]
    async fn session_is_created_once_and_echoes_state() {
        let context = context().await;
        let first = open_session(&context, "buyer-1").await;
        let second = open_session(&context, "buyer-1").await;
        assert_eq!(first, second);

        let (status, Json(body)) = get_or_create_session(
            State(context),
            ApiJson(SessionRequest { user_id: "  ".to_string(), state: Map::new() }),
        )
        .await
        .expect_err("blank user");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "user_id is required.");
    }

    #[tokio::test]
    async fn purchase_then_list_orders_and_agent_dashboard() {
        let context = context().await;
        open_session(&context, "buyer-1").await;

        let (status, Json(body)) =
            purchase_product(State(context.clone()), ApiJson(purchase("buyer-1", "prod-onion", 4)))
                .await
                .expect("purchase");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "success");
        assert_eq!(body.successful_orders[0].remaining_quantity, 6);
        assert_eq!(body.successful_orders[0].total_price, Decimal::new(12000, 2));

        let Json(orders) = list_orders(
            State(context.clone()),
            ApiJson(UserRequest { user_id: "buyer-1".to_string() }),
        )
        .await
        .expect("orders");
        assert_eq!(orders.orders.len(), 1);
        assert_eq!(orders.orders[0].agent_assigned.as_deref(), Some("DA-001"));

        let Json(dashboard) = get_agent_dashboard_orders(
            State(context),
            ApiJson(AgentOrdersRequest { agent_id: "DA-001".to_string() }),
        )
        .await
        .expect("dashboard");
        assert_eq!(dashboard.orders.len(), 1);
        assert_eq!(dashboard.orders[0].order_id, orders.orders[0].order_id);
    }

    #[tokio::test]
    async fn purchase_where_every_item_fails_is_a_bad_request() {
        let context = context().await;
        let (status, Json(body)) =
            purchase_product(State(context), ApiJson(purchase("buyer-1", "prod-onion", 11)))
                .await
                .expect("batch response");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.status, "failed");
        assert_eq!(body.failed_orders[0].error, "Insufficient quantity. Only 10 available.");
    }

    #[tokio::test]
    async fn seller_cannot_buy_own_listing() {
        let context = context().await;
        let (status, Json(body)) =
            purchase_product(State(context), ApiJson(purchase("seller-1", "prod-onion", 1)))
                .await
                .expect("batch response");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.failed_orders[0].error, "You cannot purchase your own product.");
    }

    #[tokio::test]
    async fn delivery_and_rating_flow() {
        let context = context().await;
        open_session(&context, "buyer-1").await;
        let (_, Json(bought)) =
            purchase_product(State(context.clone()), ApiJson(purchase("buyer-1", "prod-onion", 2)))
                .await
                .expect("purchase");
        let order_id = bought.successful_orders[0].order_id.clone();

        let Json(update) = delivery_update(
            State(context.clone()),
            ApiJson(DeliveryUpdateRequest {
                agent_id: "DA-001".to_string(),
                order_id: order_id.clone(),
                status: "Delivered".to_string(),
            }),
        )
        .await
        .expect("delivery update");
        assert_eq!(update.message, format!("Order {order_id} marked as delivered."));

        let Json(rated) = rate_product(
            State(context.clone()),
            ApiJson(RateProductRequest {
                order_id: order_id.clone(),
                product_id: "prod-onion".to_string(),
                rating: 4,
                user_id: "buyer-1".to_string(),
            }),
        )
        .await
        .expect("rating");
        assert!(rated.message.ends_with("averages 4.0 from 1 rating."));

        let (status, _) = rate_product(
            State(context),
            ApiJson(RateProductRequest {
                order_id,
                product_id: "prod-onion".to_string(),
                rating: 5,
                user_id: "buyer-1".to_string(),
            }),
        )
        .await
        .expect_err("order already closed");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sell_uses_session_identity_and_lists_for_seller() {
        let context = context().await;
        open_session(&context, "farmer-9").await;

        let Json(sold) = sell_product(
            State(context.clone()),
            ApiJson(SellProductRequest {
                user_id: Some("farmer-9".to_string()),
                product_name: "Tomatoes".to_string(),
                product_type: Some("Vegetable".to_string()),
                price_per_kg: Some(Decimal::new(18, 0)),
                quantity_available: 25,
                ..SellProductRequest::default()
            }),
        )
        .await
        .expect("sell");
        assert_eq!(sold.message, "Successfully listed new product 'Tomato' for sale.");

        let Json(mine) = list_user_products(
            State(context.clone()),
            ApiJson(UserRequest { user_id: "farmer-9".to_string() }),
        )
        .await
        .expect("own listings");
        assert_eq!(mine.products.len(), 1);
        assert_eq!(mine.products[0].product_id, sold.product_id);

        let Json(visible) = list_products(
            State(context),
            ApiJson(ListProductsRequest { user_id: Some("farmer-9".to_string()), ..Default::default() }),
        )
        .await
        .expect("browse");
        let names: Vec<&str> =
            visible.products.iter().map(|product| product.product_name.as_str()).collect();
        assert_eq!(names, vec!["Onion"]);
    }

    #[tokio::test]
    async fn browse_without_location_or_session_is_rejected() {
        let context = context().await;
        let (status, Json(body)) =
            list_products(State(context), ApiJson(ListProductsRequest::default()))
                .await
                .expect_err("no location");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.starts_with("Location (state and district) is not available"));
    }

    #[tokio::test]
    async fn community_messages_round_trip_with_client_field_names() {
        let context = context().await;
        let (status, Json(sent)) = send_community_message(
            State(context.clone()),
            ApiJson(SendCommunityMessageRequest {
                sender_id: "farmer-1".to_string(),
                sender_name: "Selvi".to_string(),
                text: "Rain expected tomorrow".to_string(),
                audio_url: None,
            }),
        )
        .await
        .expect("send");
        assert_eq!(status, StatusCode::CREATED);

        let Json(history) = get_community_messages(State(context)).await.expect("history");
        let encoded = serde_json::to_value(&history).expect("encode");
        assert_eq!(encoded["messages"][0]["id"], json!(sent.id));
        assert_eq!(encoded["messages"][0]["senderId"], json!("farmer-1"));
        assert_eq!(encoded["messages"][0]["senderName"], json!("Selvi"));
        assert_eq!(encoded["messages"][0]["text_ta"], json!(null));
    }

    #[tokio::test]
    async fn stream_query_requires_a_known_session() {
        let context = context().await;
        let session_id = open_session(&context, "buyer-1").await;

        let Json(reply) = stream_query_agent(
            State(context.clone()),
            ApiJson(StreamQueryRequest {
                user_id: "buyer-1".to_string(),
                session_id,
                message: Some("show my orders".to_string()),
                ..StreamQueryRequest::default()
            }),
        )
        .await
        .expect("reply");
        assert!(!reply.response.is_empty());

        let (status, _) = stream_query_agent(
            State(context),
            ApiJson(StreamQueryRequest {
                user_id: "buyer-1".to_string(),
                session_id: "stale-session".to_string(),
                message: Some("hello".to_string()),
                ..StreamQueryRequest::default()
            }),
        )
        .await
        .expect_err("stale session");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn rating_message_agrees_with_the_count() {
        let product = ProductId("prod-onion".to_string());

        assert_eq!(
            rating_message(&product, 4.0, 1),
            "Thanks for rating! Product prod-onion now averages 4.0 from 1 rating."
        );
        assert!(rating_message(&product, 4.5, 2).ends_with("averages 4.5 from 2 ratings."));
    }

    #[tokio::test]
    async fn malformed_body_is_a_json_bad_request() {
        let app = router(context().await);
        let request = Request::builder()
            .method("POST")
            .uri("/rate_product")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "order_id": "order-1",
                    "product_id": "prod-onion",
                    "rating": 4.5,
                    "user_id": "buyer-1"
                })
                .to_string(),
            ))
            .expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json error body");
        let message = body["error"].as_str().expect("error message");
        assert!(message.starts_with("Invalid request body:"), "{message}");
        assert!(message.contains("rating"), "{message}");
    }

    #[tokio::test]
    async fn router_decodes_client_payloads() {
        let app = router(context().await);
        let request = Request::builder()
            .method("POST")
            .uri("/list_products")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "state": "Tamil Nadu", "district": "Villupuram" }).to_string(),
            ))
            .expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["products"][0]["product_name"], json!("Onion"));
        assert_eq!(body["products"][0]["price_per_kg"], json!(30.0));
    }
}
