// Bar collection and order execution
pub mod bar_window;
pub mod executor;
pub mod paper;
pub mod price_feed;

pub use bar_window::BarWindow;
pub use executor::{Executor, OrderGateway, OrderRequest};
pub use paper::PaperExchange;
pub use price_feed::PriceFeed;
