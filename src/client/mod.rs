mod async_client;
pub(crate) mod dispatch;

pub use async_client::{Client, ClientBuilder};
