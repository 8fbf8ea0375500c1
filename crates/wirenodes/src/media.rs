use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use wirecore::{Behavior, NodeContext, NodeError, Value};

/// Normalize a binary-ish input: bytes pass through, strings are base64
/// decoded when possible and used raw otherwise.
fn binary_input(value: &Value) -> Result<Vec<u8>, NodeError> {
    match value {
        Value::Bytes(bytes) => Ok(bytes.clone()),
        other => match other.as_str() {
            Some(text) => Ok(STANDARD
                .decode(text.trim())
                .unwrap_or_else(|_| text.as_bytes().to_vec())),
            None => Err(NodeError::InvalidInputType {
                field: "input".to_string(),
                expected: "bytes or base64 string".to_string(),
                actual: "other".to_string(),
            }),
        },
    }
}

/// Page-by-page PDF text extraction.
///
/// Plain mode uses the document's own text extraction. Layout mode walks the
/// page content stream tracking the text cursor's vertical position and
/// regroups runs into lines by y proximity, which keeps columns and headers
/// readable for documents whose stream order does not match reading order.
pub struct PdfTextBehavior;

#[async_trait]
impl Behavior for PdfTextBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let source = ctx
            .input_any(&["pdf", "file", "input"])
            .ok_or_else(|| NodeError::MissingInput("pdf".to_string()))?;
        let bytes = binary_input(source)?;

        let max_pages = ctx.config_f64("max_pages", 0.0) as usize;
        let preserve_layout = ctx.config_bool("preserve_layout", false);

        let doc = Document::load_mem(&bytes)
            .map_err(|err| NodeError::ExecutionFailed(format!("Failed to load PDF: {}", err)))?;

        let mut pages_text: Vec<String> = Vec::new();
        for (page_no, page_id) in doc.get_pages() {
            if max_pages > 0 && pages_text.len() >= max_pages {
                break;
            }
            let text = if preserve_layout {
                layout_page_text(&doc, page_id)?
            } else {
                doc.extract_text(&[page_no]).map_err(|err| {
                    NodeError::ExecutionFailed(format!(
                        "Failed to extract text from page {}: {}",
                        page_no, err
                    ))
                })?
            };
            pages_text.push(text);
        }

        ctx.logger
            .info(format!("Extracted text from {} pages", pages_text.len()));

        let mut outputs = HashMap::new();
        outputs.insert("text".to_string(), Value::String(pages_text.join("\n\n")));
        outputs.insert("pages".to_string(), Value::Number(pages_text.len() as f64));
        Ok(Value::Object(outputs))
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn string_text(object: &Object) -> Option<String> {
    match object {
        Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

/// Walk a page's content stream collecting text runs with the vertical
/// position they were shown at, then rebuild lines by y proximity.
fn layout_page_text(doc: &Document, page_id: ObjectId) -> Result<String, NodeError> {
    let data = doc
        .get_page_content(page_id)
        .map_err(|err| NodeError::ExecutionFailed(format!("Failed to read page: {}", err)))?;
    let content = Content::decode(&data)
        .map_err(|err| NodeError::ExecutionFailed(format!("Failed to decode page: {}", err)))?;

    let mut runs: Vec<(f64, usize, String)> = Vec::new();
    let mut y = 0.0_f64;
    let mut leading = 14.0_f64;

    for (order, op) in content.operations.iter().enumerate() {
        match op.operator.as_str() {
            "BT" => y = 0.0,
            "Tm" => {
                if let Some(ty) = op.operands.get(5).and_then(number) {
                    y = ty;
                }
            }
            "Td" => {
                if let Some(ty) = op.operands.get(1).and_then(number) {
                    y += ty;
                }
            }
            "TD" => {
                if let Some(ty) = op.operands.get(1).and_then(number) {
                    leading = -ty;
                    y += ty;
                }
            }
            "TL" => {
                if let Some(value) = op.operands.first().and_then(number) {
                    leading = value;
                }
            }
            "T*" => y -= leading,
            "Tj" => {
                if let Some(text) = op.operands.first().and_then(string_text) {
                    push_run(&mut runs, y, order, text);
                }
            }
            "'" | "\"" => {
                y -= leading;
                if let Some(text) = op.operands.iter().rev().find_map(string_text) {
                    push_run(&mut runs, y, order, text);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    let text: String = items.iter().filter_map(string_text).collect();
                    push_run(&mut runs, y, order, text);
                }
            }
            _ => {}
        }
    }

    // Highest y first (PDF origin is bottom-left); stream order within a line.
    runs.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });

    let mut lines: Vec<String> = Vec::new();
    let mut last_y: Option<f64> = None;
    for (run_y, _, text) in runs {
        let same_line = last_y.map(|prev| (prev - run_y).abs() <= 3.0).unwrap_or(false);
        if same_line {
            if let Some(line) = lines.last_mut() {
                line.push(' ');
                line.push_str(&text);
            }
        } else {
            lines.push(text);
        }
        last_y = Some(run_y);
    }

    Ok(lines.join("\n"))
}

fn push_run(runs: &mut Vec<(f64, usize, String)>, y: f64, order: usize, text: String) {
    if !text.trim().is_empty() {
        runs.push((y, order, text));
    }
}

/// Audio transcription: posts the audio as multipart form data to the
/// configured transcription endpoint.
pub struct TranscribeBehavior {
    client: reqwest::Client,
}

impl TranscribeBehavior {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for TranscribeBehavior {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Behavior for TranscribeBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let source = ctx
            .input_any(&["audio", "input"])
            .ok_or_else(|| NodeError::MissingInput("audio".to_string()))?;
        let audio = binary_input(source)?;

        let endpoint = ctx.config_str("endpoint", "http://localhost:8765/transcribe");
        ctx.logger.info(format!(
            "Transcribing {} bytes via {}",
            audio.len(),
            endpoint
        ));

        let mut form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(audio).file_name("audio.wav"),
        );
        let language = ctx.config_str("language", "");
        if !language.is_empty() {
            form = form.text("language", language);
        }

        let response = tokio::select! {
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
            result = self.client.post(&endpoint).multipart(form).send() => result
                .map_err(|err| NodeError::ExecutionFailed(format!("Transcription failed: {}", err)))?,
        };

        let payload: serde_json::Value = response.json().await.map_err(|err| {
            NodeError::ExecutionFailed(format!("Invalid transcription response: {}", err))
        })?;
        let text = payload["text"]
            .as_str()
            .or_else(|| payload["transcription"].as_str())
            .unwrap_or_default()
            .to_string();

        let mut outputs = HashMap::new();
        outputs.insert("text".to_string(), Value::String(text));
        Ok(Value::Object(outputs))
    }
}

/// Image generation: posts the prompt to the configured service and polls its
/// progress endpoint while the request is in flight, logging progress so live
/// panels can show it.
pub struct ImageGenerateBehavior {
    client: reqwest::Client,
}

impl ImageGenerateBehavior {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ImageGenerateBehavior {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Behavior for ImageGenerateBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let prompt = ctx
            .input_any(&["prompt", "input"])
            .map(|v| v.to_text())
            .unwrap_or_else(|| ctx.config_str("prompt", ""));
        if prompt.is_empty() {
            return Err(NodeError::MissingInput("prompt".to_string()));
        }

        let endpoint = ctx.config_str("endpoint", "http://localhost:8188/generate");
        let progress_url = ctx.config_str(
            "progress_url",
            &format!("{}/progress", endpoint.trim_end_matches('/')),
        );

        let payload = json!({
            "prompt": prompt,
            "negative_prompt": ctx.config_str("negative_prompt", ""),
            "steps": ctx.config_f64("steps", 20.0) as u64,
            "width": ctx.config_f64("width", 512.0) as u64,
            "height": ctx.config_f64("height", 512.0) as u64,
        });

        ctx.logger.info(format!("Generating image via {}", endpoint));

        let mut request = Box::pin(self.client.post(&endpoint).json(&payload).send());
        let mut ticker = tokio::time::interval(Duration::from_millis(500));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // the first tick completes immediately

        let response = loop {
            tokio::select! {
                _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
                result = &mut request => {
                    break result.map_err(|err| {
                        NodeError::ExecutionFailed(format!("Image generation failed: {}", err))
                    })?;
                }
                _ = ticker.tick() => {
                    if let Ok(progress) = self
                        .client
                        .get(&progress_url)
                        .timeout(Duration::from_millis(400))
                        .send()
                        .await
                    {
                        if let Ok(body) = progress.json::<serde_json::Value>().await {
                            let percent = body["progress"].as_f64().unwrap_or(0.0) * 100.0;
                            ctx.logger.info(format!("Generation progress: {:.0}%", percent));
                        }
                    }
                }
            }
        };

        let payload: serde_json::Value = response.json().await.map_err(|err| {
            NodeError::ExecutionFailed(format!("Invalid generation response: {}", err))
        })?;
        let image = payload["image"]
            .as_str()
            .or_else(|| payload["images"][0].as_str())
            .ok_or_else(|| {
                NodeError::ExecutionFailed("Generation response carried no image".to_string())
            })?
            .to_string();

        let mut outputs = HashMap::new();
        outputs.insert("image".to_string(), Value::String(image));
        Ok(Value::Object(outputs))
    }
}

/// Text-to-speech: posts text to the configured synthesis endpoint and
/// returns the audio as base64 alongside the autoplay flag for the caller.
pub struct TextToSpeechBehavior {
    client: reqwest::Client,
}

impl TextToSpeechBehavior {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for TextToSpeechBehavior {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Behavior for TextToSpeechBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let text = ctx
            .input_any(&["text", "input"])
            .map(|v| v.to_text())
            .ok_or_else(|| NodeError::MissingInput("text".to_string()))?;

        let endpoint = ctx.config_str("endpoint", "http://localhost:8765/synthesize");
        let payload = json!({
            "text": text,
            "voice": ctx.config_str("voice", "default"),
        });

        ctx.logger.info(format!("Synthesizing speech via {}", endpoint));

        let response = tokio::select! {
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
            result = self.client.post(&endpoint).json(&payload).send() => result
                .map_err(|err| NodeError::ExecutionFailed(format!("Synthesis failed: {}", err)))?,
        };

        let audio = response.bytes().await.map_err(|err| {
            NodeError::ExecutionFailed(format!("Failed to read synthesis response: {}", err))
        })?;

        let mut outputs = HashMap::new();
        outputs.insert("audio".to_string(), Value::String(STANDARD.encode(&audio)));
        outputs.insert(
            "autoplay".to_string(),
            Value::Bool(ctx.config_bool("autoplay", false)),
        );
        Ok(Value::Object(outputs))
    }
}
