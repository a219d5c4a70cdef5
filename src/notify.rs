//! Notifies an external system when a module's license couldn't be
//! determined (the "Warn" unknown-license policy).

use std::future::Future;
use std::pin::Pin;

use tokio_stream::wrappers::ReceiverStream;

use crate::error::ValidationError;
use crate::module::Module;

/// Boxed future returned by [`UnknownLicenseNotifier::notify_unknown_license`].
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ValidationError>> + Send + 'a>>;

pub trait UnknownLicenseNotifier: Send + Sync {
    fn notify_unknown_license<'a>(&'a self, module: &'a Module) -> NotifyFuture<'a>;
}

/// The longest slice of a failed webhook's response body kept for
/// logging; matches the original's rationale of giving an operator
/// enough context without risking unbounded memory use on a chatty
/// endpoint.
const MAX_RESPONSE_BYTES: usize = 1024;

/// Posts a small JSON body describing the module to a configured URL.
///
/// The body is rendered from a template containing `{{module}}` and
/// `{{version}}` placeholders and streamed to the request rather than
/// buffered whole, mirroring the original's `io.Pipe`-fed request body.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: url::Url,
    method: reqwest::Method,
    body_template: String,
    headers: reqwest::header::HeaderMap,
}

impl WebhookNotifier {
    /// `method` defaults to `POST` when unset or unrecognized, matching
    /// the original's webhook configuration default.
    pub fn new(
        client: reqwest::Client,
        url: url::Url,
        method: &str,
        body_template: String,
        headers: reqwest::header::HeaderMap,
    ) -> Self {
        Self {
            client,
            url,
            method: reqwest::Method::from_bytes(method.as_bytes()).unwrap_or(reqwest::Method::POST),
            body_template,
            headers,
        }
    }

    fn render(&self, module: &Module) -> String {
        self.body_template
            .replace("{{module}}", &module.name)
            .replace("{{version}}", module.version.original())
    }

    async fn notify(&self, module: &Module) -> Result<(), ValidationError> {
        let rendered = self.render(module);
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<bytes::Bytes, std::io::Error>>(1);

        tokio::spawn(async move {
            let _ = tx.send(Ok(bytes::Bytes::from(rendered.into_bytes()))).await;
        });

        let body = reqwest::Body::wrap_stream(ReceiverStream::new(rx));

        let response = self
            .client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let bytes = response.bytes().await.unwrap_or_default();
            let truncated = &bytes[..bytes.len().min(MAX_RESPONSE_BYTES)];
            let body = String::from_utf8_lossy(truncated);
            tracing::warn!(module = %module, %status, %body, "unknown-license webhook rejected the notification");
            return Err(ValidationError::upstream(format!("webhook notifier got {status}: {body}")));
        }

        tracing::debug!(module = %module, url = %self.url, "notified unknown license");
        Ok(())
    }
}

impl UnknownLicenseNotifier for WebhookNotifier {
    fn notify_unknown_license<'a>(&'a self, module: &'a Module) -> NotifyFuture<'a> {
        Box::pin(self.notify(module))
    }
}
