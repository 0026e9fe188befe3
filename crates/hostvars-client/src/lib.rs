//! hostvars-client: HTTP client library
//!
//! Talks to the hostvars daemon.
//!
//! # Example
//!
//! ```no_run
//! use hostvars_client::HttpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new("http://localhost:8250")?;
//!
//! client.create_host("web", "w1.example.com").await?;
//! client.set_fact("web", "w1.example.com", "env", "prod").await?;
//!
//! let inventory = client.inventory().await?;
//! println!("{:?}", inventory.hostvars("w1.example.com"));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod http;

pub use error::{ClientError, Result};
pub use http::HttpClient;
