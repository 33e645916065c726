pub mod item;
pub mod order;
pub mod price;
pub mod wallet;

pub use item::*;
pub use order::*;
pub use price::*;
pub use wallet::*;
