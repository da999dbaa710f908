/// HTTP transport backed by `reqwest`; in the browser it goes through `fetch`
use async_trait::async_trait;

use crate::error::TransportError;
use crate::ports::{HttpRequest, HttpResponse, HttpTransport};

#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn prepare(&self, request: HttpRequest) -> Result<reqwest::Request, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        Ok(builder.build()?)
    }
}

#[async_trait(?Send)]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let request = self.prepare(request)?;
        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}
