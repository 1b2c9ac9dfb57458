pub mod community;
pub mod config;
pub mod domain;
pub mod errors;
pub mod market;
pub mod naming;

pub use community::{CommunityService, CommunityStore, NewCommunityMessage, Notifier, Translator};
pub use domain::order::{Order, OrderId, OrderStatus};
pub use domain::product::{Location, Product, ProductId};
pub use domain::session::{Session, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use market::{MarketEngine, MarketStore, SideEffectStatus, StoreError};
