//! Wire shapes for products and orders, shared by the HTTP handlers and the
//! conversational tools.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::order::Order;
use crate::domain::product::Product;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductView {
    pub product_id: String,
    pub product_name: String,
    pub product_type: String,
    pub seller_id: String,
    pub seller_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_per_kg: Decimal,
    pub quantity_available: u32,
    pub state: String,
    pub district: String,
    pub rating: Option<f64>,
    pub rating_count: u32,
    pub listed_at: String,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id.0.clone(),
            product_name: product.name.clone(),
            product_type: product.category.clone(),
            seller_id: product.seller_id.0.clone(),
            seller_name: product.seller_name.clone(),
            price_per_kg: product.price_per_kg,
            quantity_available: product.quantity_available,
            state: product.location.state.clone(),
            district: product.location.district.clone(),
            rating: product.rating,
            rating_count: product.rating_count,
            listed_at: product.listed_at.to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderView {
    pub order_id: String,
    pub product_id: String,
    pub product_name: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub quantity: u32,
    pub order_time: String,
    pub status: String,
    pub agent_assigned: Option<String>,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.0.clone(),
            product_id: order.product_id.0.clone(),
            product_name: order.product_name.clone(),
            buyer_id: order.buyer_id.0.clone(),
            seller_id: order.seller_id.0.clone(),
            quantity: order.quantity,
            order_time: order.order_time.to_rfc3339(),
            status: order.status.as_str().to_string(),
            agent_assigned: order.agent_assigned.as_ref().map(|code| code.0.clone()),
        }
    }
}

pub fn product_views(products: &[Product]) -> Vec<ProductView> {
    products.iter().map(ProductView::from).collect()
}

pub fn order_views(orders: &[Order]) -> Vec<OrderView> {
    orders.iter().map(OrderView::from).collect()
}
