pub mod asset;
pub mod context;

pub use asset::{AssetContract, CreateAsset, UpdateAsset, seed_assets};
pub use context::TxContext;
