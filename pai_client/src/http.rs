//! Helpers shared by the REST and WebHDFS clients.

use ::pai_common::{
    anyhow::anyhow,
    error::{PaiError, Result, UnexpectedResponse},
};
use ::reqwest::blocking::{RequestBuilder, Response};

/// Send a request, mapping transport failures to [PaiError::connectivity].
pub(crate) fn send(builder: RequestBuilder) -> Result<Response> {
    builder.send().map_err(|e| {
        if e.is_builder() {
            PaiError::validation(anyhow!("invalid request: {}", e))
        } else {
            PaiError::connectivity(e)
        }
    })
}

/// Consume a response whose status the caller did not expect.
pub(crate) fn unexpected(response: Response) -> UnexpectedResponse {
    UnexpectedResponse {
        status: response.status().as_u16(),
        body: response.text().unwrap_or_default(),
    }
}
