//! Remote device object addressing.
//!
//! Peer device services expose their objects under their own service name:
//! `http://<service>:<port>/<service>/objects/<id>`.

use reqwest::Client;
use serde_json::Value;

use crate::error::HandlerError;

/// Port device services listen on unless configured otherwise.
pub const DEFAULT_DEVICE_PORT: u16 = 5000;

pub(crate) fn object_url(service: &str, port: u16, object: &str) -> String {
    format!("http://{}:{}/{}/objects/{}", service, port, service, object)
}

pub(crate) async fn get_object(client: &Client, url: &str) -> Result<Value, HandlerError> {
    let response = client.get(url).send().await?;
    ensure_success(url, &response)?;
    Ok(response.json().await?)
}

pub(crate) fn ensure_success(url: &str, response: &reqwest::Response) -> Result<(), HandlerError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(HandlerError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}
