//! Client-side contact synchronization

mod controller;
pub mod favorites;

#[cfg(test)]
mod controller_pbt;

pub use controller::ContactSyncController;
pub use favorites::Favorites;
