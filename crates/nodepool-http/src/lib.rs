//! nodepool-http: HTTP(S) transport for NodePool.
//!
//! # Quick start
//! ```rust,no_run
//! use nodepool_core::{Client, ClientConfig, Method};
//! use nodepool_http::default_registry;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_urls(["http://es1:9200", "http://es2:9200"]);
//! let client = Client::new(config, default_registry())?;
//! let health = client.request("/_cluster/health", Method::Get, None, &[]).await?;
//! println!("{}", health.body());
//! # Ok(())
//! # }
//! ```

pub mod client;

pub use client::{default_registry, HttpTransport, HttpTransportConfig};
