use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::CONFIG;
use crate::llm::{summarize_error_body, truncate_for_log};
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

const RENDER_REQUEST_TIMEOUT_SECS: u64 = 120;

/// One rendering call: a prompt plus the fixed generation parameters. Immutable once
/// built; retries derive a new request rather than mutating this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub prompt: String,
    pub size: String,
    pub quality: String,
    pub style: String,
}

impl RenderRequest {
    pub fn from_config(prompt: &str) -> Self {
        RenderRequest {
            prompt: prompt.to_string(),
            size: CONFIG.image_size.clone(),
            quality: CONFIG.image_quality.clone(),
            style: CONFIG.image_style.clone(),
        }
    }

    fn with_prompt(&self, prompt: &str) -> Self {
        RenderRequest {
            prompt: prompt.to_string(),
            ..self.clone()
        }
    }
}

/// Terminal outcome of a render: either a generated image locator or the well-known
/// placeholder. There is no error variant; rendering always yields a usable locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderResult {
    Generated(String),
    Placeholder(String),
}

impl RenderResult {
    pub fn url(&self) -> &str {
        match self {
            RenderResult::Generated(url) | RenderResult::Placeholder(url) => url,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, RenderResult::Placeholder(_))
    }
}

/// Runs the rendering call with bounded, strictly sequential retries and a fixed
/// backoff between attempts. Attempt 1 sends the caller's full prompt; every later
/// attempt sends `fallback_prompt` instead, so a malformed or over-length prompt is
/// never retried verbatim. When every attempt fails the placeholder locator is
/// returned; this function never surfaces an error.
pub async fn execute_render<F, Fut>(
    request: RenderRequest,
    fallback_prompt: &str,
    placeholder_url: &str,
    max_attempts: usize,
    backoff: Duration,
    mut attempt_call: F,
) -> RenderResult
where
    F: FnMut(RenderRequest) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let max_attempts = max_attempts.max(1);
    for attempt in 1..=max_attempts {
        let current = if attempt == 1 {
            request.clone()
        } else {
            request.with_prompt(fallback_prompt)
        };

        match attempt_call(current).await {
            Ok(url) => {
                info!(
                    "Render succeeded on attempt {}/{}: {}",
                    attempt,
                    max_attempts,
                    truncate_for_log(&url, 200)
                );
                return RenderResult::Generated(url);
            }
            Err(err) => {
                warn!("Render attempt {attempt}/{max_attempts} failed: {err}");
                if attempt < max_attempts {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    warn!("All {max_attempts} render attempts failed; using placeholder image");
    RenderResult::Placeholder(placeholder_url.to_string())
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
    revised_prompt: Option<String>,
}

async fn call_images_api(request: &RenderRequest) -> Result<String> {
    let payload = json!({
        "model": CONFIG.image_model,
        "prompt": request.prompt,
        "n": 1,
        "size": request.size,
        "quality": request.quality,
        "style": request.style,
        "response_format": "url",
    });

    let client = get_http_client();
    let response = client
        .post(format!(
            "{}/images/generations",
            CONFIG.openai_base_url.trim_end_matches('/')
        ))
        .header(
            "Authorization",
            format!("Bearer {}", CONFIG.openai_api_key),
        )
        .timeout(Duration::from_secs(RENDER_REQUEST_TIMEOUT_SECS))
        .json(&payload)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let (message, body_summary) = summarize_error_body(&body);
        warn!("Images API error: status={}, body={}", status, body_summary);
        let detail = message.unwrap_or(body_summary);
        return Err(anyhow!(
            "Images request failed with status {}: {}",
            status,
            detail
        ));
    }

    let parsed: ImagesResponse = response.json().await?;
    let image = parsed
        .data
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Images response contained no data"))?;

    if let Some(revised) = image.revised_prompt.as_deref() {
        debug!("Images API revised prompt: {}", truncate_for_log(revised, 300));
    }

    image
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| anyhow!("Images response missing image url"))
}

/// Renders the card image for one submission using the configured attempt limit,
/// backoff, fallback prompt and placeholder.
pub async fn render_card_image(prompt: &str) -> RenderResult {
    let request = RenderRequest::from_config(prompt);
    let backoff = Duration::from_secs(CONFIG.render_backoff_seconds);

    execute_render(
        request,
        &CONFIG.fallback_render_prompt,
        &CONFIG.placeholder_image_url,
        CONFIG.render_max_attempts,
        backoff,
        |attempt_request| async move {
            log_llm_timing(
                "openai",
                &CONFIG.image_model,
                "images:generate",
                Some(json!({ "prompt_chars": attempt_request.prompt.chars().count() })),
                || async { call_images_api(&attempt_request).await },
            )
            .await
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn test_request() -> RenderRequest {
        RenderRequest {
            prompt: "full detailed prompt".to_string(),
            size: "1024x1024".to_string(),
            quality: "hd".to_string(),
            style: "vivid".to_string(),
        }
    }

    const FALLBACK: &str = "short generic fallback prompt";
    const PLACEHOLDER: &str = "https://placeholder.test/300";

    #[tokio::test(start_paused = true)]
    async fn returns_placeholder_after_exactly_max_attempts() {
        let prompts: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen = prompts.clone();

        let started = tokio::time::Instant::now();
        let result = execute_render(
            test_request(),
            FALLBACK,
            PLACEHOLDER,
            3,
            Duration::from_secs(2),
            move |request| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(request.prompt);
                    Err(anyhow!("service unavailable"))
                }
            },
        )
        .await;

        assert_eq!(result, RenderResult::Placeholder(PLACEHOLDER.to_string()));
        assert!(result.is_placeholder());

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3, "one outbound call per attempt");
        assert_eq!(prompts[0], "full detailed prompt");
        assert_eq!(prompts[1], FALLBACK);
        assert_eq!(prompts[2], FALLBACK);

        // Two waits between three attempts, none after the last.
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn degrades_prompt_on_second_attempt_then_succeeds() {
        let prompts: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen = prompts.clone();

        let result = execute_render(
            test_request(),
            FALLBACK,
            PLACEHOLDER,
            3,
            Duration::from_secs(2),
            move |request| {
                let seen = seen.clone();
                async move {
                    let mut seen = seen.lock().unwrap();
                    seen.push(request.prompt);
                    if seen.len() == 1 {
                        Err(anyhow!("transient failure"))
                    } else {
                        Ok("https://img.test/generated.png".to_string())
                    }
                }
            },
        )
        .await;

        assert_eq!(
            result,
            RenderResult::Generated("https://img.test/generated.png".to_string())
        );
        assert_eq!(result.url(), "https://img.test/generated.png");

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2, "success on attempt two stops the loop");
        assert_ne!(prompts[1], prompts[0], "retry must not resend the original prompt");
        assert_eq!(prompts[1], FALLBACK);
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success_uses_original_prompt_without_waiting() {
        let started = tokio::time::Instant::now();
        let result = execute_render(
            test_request(),
            FALLBACK,
            PLACEHOLDER,
            3,
            Duration::from_secs(2),
            |request| async move {
                assert_eq!(request.prompt, "full detailed prompt");
                Ok("https://img.test/first.png".to_string())
            },
        )
        .await;

        assert_eq!(
            result,
            RenderResult::Generated("https://img.test/first.png".to_string())
        );
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempt_limit_is_clamped_to_one_call() {
        let calls: Arc<Mutex<usize>> = Arc::new(Mutex::new(0));
        let counter = calls.clone();

        let result = execute_render(
            test_request(),
            FALLBACK,
            PLACEHOLDER,
            0,
            Duration::from_secs(2),
            move |_| {
                let counter = counter.clone();
                async move {
                    *counter.lock().unwrap() += 1;
                    Err(anyhow!("down"))
                }
            },
        )
        .await;

        assert!(result.is_placeholder());
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
