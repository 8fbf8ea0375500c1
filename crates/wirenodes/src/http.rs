use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use wirecore::{Behavior, NodeContext, NodeError, Value};

/// General-purpose HTTP request node.
///
/// Supports method and query configuration, several auth strategies (api key
/// in header or query, bearer, basic, custom header), json / form / multipart
/// body encodings, a per-call timeout, and bounded retry with exponential
/// backoff. Transport errors and 5xx responses are retried; 4xx client errors
/// never are. The response is decoded by content type (JSON, text, bytes) and
/// returned with its status and headers; only transport failures after the
/// retry budget fail the node.
pub struct HttpRequestBehavior {
    client: reqwest::Client,
}

impl HttpRequestBehavior {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn build_request(
        &self,
        ctx: &NodeContext,
        method: &reqwest::Method,
        url: &str,
        timeout_ms: u64,
    ) -> Result<reqwest::RequestBuilder, NodeError> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .timeout(Duration::from_millis(timeout_ms));

        // query parameters
        let mut query: Vec<(String, String)> = Vec::new();
        if let Some(params) = ctx.config.get("params") {
            for (key, value) in object_entries(params) {
                query.push((key, value.to_text()));
            }
        }

        // auth strategy
        if let Some(auth) = ctx.config.get("auth") {
            let auth_type = member_str(auth, "type").unwrap_or_else(|| "none".to_string());
            match auth_type.as_str() {
                "api_key" => {
                    let key = member_str(auth, "key").unwrap_or_default();
                    let value = member_str(auth, "value").unwrap_or_default();
                    let location = member_str(auth, "in").unwrap_or_else(|| "header".to_string());
                    if location == "query" {
                        query.push((key, value));
                    } else {
                        request = request.header(key.as_str(), value);
                    }
                }
                "bearer" => {
                    let token = member_str(auth, "token")
                        .or_else(|| member_str(auth, "value"))
                        .unwrap_or_default();
                    request = request.bearer_auth(token);
                }
                "basic" => {
                    let username = member_str(auth, "username").unwrap_or_default();
                    let password = member_str(auth, "password");
                    request = request.basic_auth(username, password);
                }
                "custom" => {
                    let header = member_str(auth, "header").unwrap_or_default();
                    let value = member_str(auth, "value").unwrap_or_default();
                    request = request.header(header.as_str(), value);
                }
                _ => {}
            }
        }

        if !query.is_empty() {
            request = request.query(&query);
        }

        // custom headers
        if let Some(headers) = ctx.config.get("headers") {
            for (key, value) in object_entries(headers) {
                request = request.header(key.as_str(), value.to_text());
            }
        }

        // body
        let body = ctx
            .inputs
            .get("body")
            .cloned()
            .or_else(|| ctx.config.get("body").cloned());
        if let Some(body) = body {
            let body_type = ctx.config_str("body_type", "json");
            request = match body_type.as_str() {
                "form" => {
                    let fields: HashMap<String, String> = object_entries(&body)
                        .into_iter()
                        .map(|(key, value)| (key, value.to_text()))
                        .collect();
                    request.form(&fields)
                }
                "multipart" => {
                    let mut form = reqwest::multipart::Form::new();
                    match &body {
                        Value::Bytes(bytes) => {
                            form = form.part(
                                "file",
                                reqwest::multipart::Part::bytes(bytes.clone())
                                    .file_name("upload.bin"),
                            );
                        }
                        other => {
                            for (key, value) in object_entries(other) {
                                form = match value {
                                    Value::Bytes(bytes) => form.part(
                                        key,
                                        reqwest::multipart::Part::bytes(bytes)
                                            .file_name("upload.bin"),
                                    ),
                                    text => form.text(key, text.to_text()),
                                };
                            }
                        }
                    }
                    request.multipart(form)
                }
                "text" => request.body(body.to_text()),
                _ => request.json(&body.to_json()),
            };
        }

        Ok(request)
    }
}

impl Default for HttpRequestBehavior {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Behavior for HttpRequestBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let url = ctx
            .inputs
            .get("url")
            .and_then(|v| v.as_str().map(str::to_string))
            .or_else(|| ctx.config.get("url").and_then(|v| v.as_str().map(str::to_string)))
            .ok_or_else(|| NodeError::Configuration("Missing config: url".to_string()))?;

        let method: reqwest::Method = ctx
            .config_str("method", "GET")
            .to_uppercase()
            .parse()
            .map_err(|_| {
                NodeError::Configuration(format!(
                    "Unsupported method: {}",
                    ctx.config_str("method", "GET")
                ))
            })?;

        let timeout_ms = ctx.config_f64("timeout_ms", 30_000.0) as u64;
        let max_attempts = (ctx.config_f64("max_attempts", 3.0) as u32).max(1);
        let base_delay_ms = ctx.config_f64("retry_delay_ms", 500.0) as u64;

        ctx.logger.info(format!("{} {}", method, url));

        let mut attempt = 0u32;
        let response = loop {
            attempt += 1;
            let request = self.build_request(&ctx, &method, &url, timeout_ms)?;

            let result = tokio::select! {
                _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
                result = request.send() => result,
            };

            match result {
                Ok(response) if response.status().is_server_error() && attempt < max_attempts => {
                    let delay = backoff_delay(base_delay_ms, attempt);
                    ctx.logger.warn(format!(
                        "Server error {} (attempt {}/{}), retrying in {}ms",
                        response.status(),
                        attempt,
                        max_attempts,
                        delay.as_millis()
                    ));
                    tokio::time::sleep(delay).await;
                }
                Ok(response) => break response,
                Err(err) if attempt < max_attempts => {
                    let delay = backoff_delay(base_delay_ms, attempt);
                    ctx.logger.warn(format!(
                        "Request failed ({}) (attempt {}/{}), retrying in {}ms",
                        err,
                        attempt,
                        max_attempts,
                        delay.as_millis()
                    ));
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return Err(NodeError::ExecutionFailed(format!(
                        "HTTP request failed after {} attempts: {}",
                        attempt, err
                    )));
                }
            }
        };

        let status = response.status().as_u16();
        let headers: HashMap<String, Value> = response
            .headers()
            .iter()
            .map(|(key, value)| {
                (
                    key.to_string(),
                    Value::String(value.to_str().unwrap_or("").to_string()),
                )
            })
            .collect();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|err| NodeError::ExecutionFailed(format!("Failed to read response: {}", err)))?;

        let body = decode_body(&content_type, &bytes);

        ctx.logger.info(format!("Response status: {}", status));

        let mut outputs = HashMap::new();
        outputs.insert("status".to_string(), Value::Number(status as f64));
        outputs.insert("headers".to_string(), Value::Object(headers));
        outputs.insert("body".to_string(), body);
        Ok(Value::Object(outputs))
    }
}

fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(1 << (attempt - 1).min(16)))
}

/// Content-type-aware decoding: JSON when declared (with text fallback on a
/// malformed body), text for textual types, raw bytes otherwise.
fn decode_body(content_type: &str, bytes: &[u8]) -> Value {
    if content_type.contains("application/json") {
        match serde_json::from_slice::<serde_json::Value>(bytes) {
            Ok(json) => Value::Json(json),
            Err(_) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        }
    } else if content_type.starts_with("text/")
        || content_type.contains("xml")
        || content_type.contains("urlencoded")
    {
        Value::String(String::from_utf8_lossy(bytes).into_owned())
    } else if bytes.is_empty() {
        Value::Null
    } else {
        Value::Bytes(bytes.to_vec())
    }
}

fn object_entries(value: &Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Value::Json(serde_json::Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), Value::Json(v.clone())))
            .collect(),
        _ => Vec::new(),
    }
}

fn member_str(value: &Value, key: &str) -> Option<String> {
    value
        .get_member(key)
        .and_then(|member| member.as_str().map(str::to_string))
}
