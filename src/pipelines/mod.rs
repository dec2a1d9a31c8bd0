pub mod normalize;
pub mod stock;

pub use normalize::Normalizer;
pub use stock::StockValidator;
