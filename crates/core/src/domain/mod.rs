pub mod community;
pub mod delivery;
pub mod order;
pub mod product;
pub mod session;
