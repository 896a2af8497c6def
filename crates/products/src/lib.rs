//! Products domain module (event-sourced).
//!
//! A product carries the manually controlled sale price, the reorder level and
//! the category used for seasonality lookups. Pure domain logic (no IO).

pub mod product;

pub use product::{
    CategoryChanged, ChangeCategory, ChangePrice, CreateProduct, PriceChanged, Product,
    ProductCommand, ProductCreated, ProductEvent, ProductSnapshot, ReorderLevelChanged,
    SetReorderLevel,
};
