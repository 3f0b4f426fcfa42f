use std::io::Write;
use std::time::Duration;

use log::debug;
use serde_json::Value as JsonValue;

use crate::error::DataError;

/// The two HTTP operations acquisition needs.
///
/// [`HttpRemote`] talks to the network; tests substitute an in-memory map.
pub trait Remote {
    /// GET `url` and parse the body as JSON.
    fn get_json(&self, url: &str) -> Result<JsonValue, DataError>;

    /// GET `url` and stream the body into `sink`, returning the byte count.
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, DataError>;
}

/// Blocking `reqwest` client.
pub struct HttpRemote {
    client: reqwest::blocking::Client,
}

impl HttpRemote {
    pub fn new() -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("cognoml/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .timeout(None)
            .build()
            .map_err(|e| remote_error("client", e))?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, DataError> {
        debug!("GET {url}");
        self.client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| remote_error(url, e))
    }
}

impl Remote for HttpRemote {
    fn get_json(&self, url: &str) -> Result<JsonValue, DataError> {
        self.get(url)?.json().map_err(|e| remote_error(url, e))
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, DataError> {
        let mut response = self.get(url)?;
        response.copy_to(sink).map_err(|e| remote_error(url, e))
    }
}

fn remote_error(url: &str, err: reqwest::Error) -> DataError {
    DataError::Remote {
        url: url.to_string(),
        message: err.to_string(),
    }
}
