use std::collections::HashSet;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::inventory::validate_quantity;
use super::{require_user, MarketEngine, SideEffectStatus};
use crate::domain::product::{Location, Product, ProductId};
use crate::domain::session::{ListedProduct, Session, UserId};
use crate::errors::ApplicationError;
use crate::naming;

/// Filters for the product listing query. Location falls back to the
/// requester's session when absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BrowseQuery {
    pub requester: Option<UserId>,
    pub location: Option<Location>,
    pub category: Option<String>,
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SellRequest {
    pub seller_id: UserId,
    pub seller_name: Option<String>,
    pub location: Option<Location>,
    pub product_name: String,
    pub category: Option<String>,
    pub price_per_kg: Option<Decimal>,
    pub quantity: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SellOutcome {
    Restocked { product_id: ProductId, product_name: String, quantity_available: u32 },
    Listed { product: Product, session_listing: SideEffectStatus },
}

impl SellOutcome {
    pub fn product_id(&self) -> &ProductId {
        match self {
            Self::Restocked { product_id, .. } => product_id,
            Self::Listed { product, .. } => &product.id,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Restocked { product_name, quantity_available, .. } => format!(
                "Successfully updated {product_name}. New quantity is {quantity_available}."
            ),
            Self::Listed { product, .. } => {
                format!("Successfully listed new product '{}' for sale.", product.name)
            }
        }
    }
}

/// Applies the visibility rules to fetched listings: drops duplicates,
/// products the requester sells, sold-out products, then the optional
/// category and name filters.
pub fn visible_products(
    products: Vec<Product>,
    requester: Option<&UserId>,
    category: Option<&str>,
    name: Option<&str>,
) -> Vec<Product> {
    let category = category.map(str::trim).filter(|value| !value.is_empty()).map(str::to_lowercase);
    let name = name.map(str::trim).filter(|value| !value.is_empty()).map(naming::listing_name);
    let mut seen = HashSet::new();

    products
        .into_iter()
        .filter(|product| seen.insert(product.id.clone()))
        .filter(|product| requester.map_or(true, |user| !product.is_owned_by(user)))
        .filter(Product::in_stock)
        .filter(|product| {
            category.as_deref().map_or(true, |category| product.category.to_lowercase() == category)
        })
        .filter(|product| name.as_deref().map_or(true, |name| product.name == name))
        .collect()
}

impl MarketEngine {
    pub async fn browse(&self, query: BrowseQuery) -> Result<Vec<Product>, ApplicationError> {
        let location = match query.location {
            Some(location) => location,
            None => self
                .session_location(query.requester.as_ref())
                .await?
                .ok_or_else(|| {
                    ApplicationError::validation(
                        "Location (state and district) is not available. Please provide state and district.",
                    )
                })?,
        };

        let mut products = self.store.products_at(&location).await?;
        if !location.is_global() {
            products.extend(self.store.products_at(&Location::global()).await?);
        }

        Ok(visible_products(
            products,
            query.requester.as_ref(),
            query.category.as_deref(),
            query.name.as_deref(),
        ))
    }

    pub async fn products_for_seller(
        &self,
        seller_id: &UserId,
    ) -> Result<Vec<Product>, ApplicationError> {
        require_user(seller_id)?;
        Ok(self.store.products_by_seller(seller_id).await?)
    }

    /// Restocks the seller's existing listing with the same normalized name,
    /// or creates a new listing.
    pub async fn sell(&self, request: SellRequest) -> Result<SellOutcome, ApplicationError> {
        require_user(&request.seller_id)?;
        let product_name = request.product_name.trim();
        if product_name.is_empty() {
            return Err(ApplicationError::validation("product_name is required."));
        }
        let quantity = validate_quantity(request.quantity)?;
        if request.price_per_kg.is_some_and(|price| price <= Decimal::ZERO) {
            return Err(ApplicationError::validation("price_per_kg must be greater than zero."));
        }

        let session = self.store.find_session(&request.seller_id).await?;
        let seller_name = request
            .seller_name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| session.as_ref().and_then(|session| session.display_name.clone()));
        let location =
            request.location.or_else(|| session.as_ref().and_then(|session| session.location.clone()));
        let (Some(seller_name), Some(location)) = (seller_name, location) else {
            return Err(ApplicationError::validation(
                "User location and identity information is missing from the session.",
            ));
        };

        let existing = self
            .store
            .products_by_seller(&request.seller_id)
            .await?
            .into_iter()
            .find(|product| naming::same_product(&product.name, product_name));

        if let Some(existing) = existing {
            let quantity_available =
                self.store.restock_product(&existing.id, quantity, request.price_per_kg).await?;
            info!(
                event_name = "market.listing.restocked",
                product_id = %existing.id.0,
                seller_id = %request.seller_id.0,
                quantity_available,
                "listing restocked"
            );
            return Ok(SellOutcome::Restocked {
                product_id: existing.id,
                product_name: existing.name,
                quantity_available,
            });
        }

        let (Some(price_per_kg), Some(category)) = (
            request.price_per_kg,
            request.category.as_deref().map(str::trim).filter(|value| !value.is_empty()),
        ) else {
            return Err(ApplicationError::validation(
                "To list a new product, you must provide both a price_per_kg and a product_type.",
            ));
        };

        let product = Product {
            id: ProductId(Uuid::new_v4().to_string()),
            name: naming::listing_name(product_name),
            category: category.to_lowercase(),
            price_per_kg,
            quantity_available: quantity,
            seller_id: request.seller_id.clone(),
            seller_name,
            location,
            rating: None,
            rating_count: 0,
            listed_at: Utc::now(),
        };
        self.store.insert_product(&product).await?;
        info!(
            event_name = "market.listing.created",
            product_id = %product.id.0,
            seller_id = %request.seller_id.0,
            "listing created"
        );

        let listing =
            ListedProduct { product_id: product.id.clone(), product_name: product.name.clone() };
        let session_listing = SideEffectStatus::settle(
            "market.listing.session_sync",
            &request.seller_id,
            self.store.push_session_listing(&request.seller_id, &listing).await,
        );

        Ok(SellOutcome::Listed { product, session_listing })
    }

    async fn session_location(
        &self,
        requester: Option<&UserId>,
    ) -> Result<Option<Location>, ApplicationError> {
        let Some(user_id) = requester else {
            return Ok(None);
        };
        let session: Option<Session> = self.store.find_session(user_id).await?;
        Ok(session.and_then(|session| session.location))
    }
}
