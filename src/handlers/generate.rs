use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::CONFIG;
use crate::llm::media::is_supported_photo;
use crate::llm::openai::{author_render_prompt, describe_photo, generate_persona};
use crate::llm::render::render_card_image;
use crate::state::AppState;
use crate::submissions::SubmissionRecord;
use crate::utils::logging::read_recent_log_lines;
use crate::utils::timing::{complete_request_timer, start_request_timer, RequestTimer};

const DIAGNOSE_LOG_LINES: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("Invalid form submission: {0}")]
    BadRequest(String),
    #[error("Failed to generate persona: {0}")]
    PersonaGeneration(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            ApiError::MissingFields => (
                StatusCode::BAD_REQUEST,
                "Missing required fields".to_string(),
                None,
            ),
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                "Invalid form submission".to_string(),
                Some(detail.clone()),
            ),
            ApiError::PersonaGeneration(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate persona".to_string(),
                Some(err.to_string()),
            ),
        };

        let mut body = json!({ "success": false, "error": error });
        if let Some(details) = details {
            body["details"] = json!(details);
        }
        (status, Json(body)).into_response()
    }
}

/// Raw multipart form fields before validation.
#[derive(Debug, Default)]
struct CardForm {
    role: String,
    pain_point: String,
    personality: String,
    email: String,
    gender_presentation: String,
    bonus_accessory: String,
    photo: Option<Vec<u8>>,
}

/// A validated submission: required fields are non-empty and the gender presentation
/// default has been applied.
#[derive(Debug)]
struct Submission {
    role: String,
    pain_point: String,
    personality: String,
    email: String,
    gender_presentation: String,
    bonus_accessory: String,
    photo: Option<Vec<u8>>,
}

fn validate_form(form: CardForm, default_gender_presentation: &str) -> Result<Submission, ApiError> {
    let role = form.role.trim().to_string();
    let pain_point = form.pain_point.trim().to_string();
    let personality = form.personality.trim().to_string();
    let email = form.email.trim().to_string();

    if role.is_empty() || pain_point.is_empty() || personality.is_empty() || email.is_empty() {
        return Err(ApiError::MissingFields);
    }

    let gender_presentation = {
        let value = form.gender_presentation.trim();
        if value.is_empty() {
            default_gender_presentation.to_string()
        } else {
            value.to_string()
        }
    };

    Ok(Submission {
        role,
        pain_point,
        personality,
        email,
        gender_presentation,
        bonus_accessory: form.bonus_accessory.trim().to_string(),
        photo: form.photo,
    })
}

async fn read_card_form(multipart: &mut Multipart) -> Result<CardForm, ApiError> {
    let mut form = CardForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "role" => {
                form.role = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
            }
            "painPoint" => {
                form.pain_point = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
            }
            "crmPersonality" => {
                form.personality = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
            }
            "email" => {
                form.email = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
            }
            "genderPreference" => {
                form.gender_presentation = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
            }
            "bonusAccessory" => {
                form.bonus_accessory = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
            }
            "image" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                if bytes.is_empty() {
                    continue;
                }
                if bytes.len() > CONFIG.max_upload_bytes {
                    return Err(ApiError::BadRequest(format!(
                        "Uploaded image exceeds the {} byte limit",
                        CONFIG.max_upload_bytes
                    )));
                }
                if is_supported_photo(&bytes) {
                    form.photo = Some(bytes.to_vec());
                } else {
                    warn!("Ignoring uploaded file that is not a supported image");
                }
            }
            other => debug!("Ignoring unknown form field '{other}'"),
        }
    }

    Ok(form)
}

pub async fn generate_card(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut timer = start_request_timer("generate-card");
    let result = handle_generate_card(&state, &mut multipart, &mut timer).await;
    match &result {
        Ok(_) => complete_request_timer(&mut timer, "success", None),
        Err(err) => complete_request_timer(&mut timer, "error", Some(err.to_string())),
    }
    result
}

async fn handle_generate_card(
    state: &AppState,
    multipart: &mut Multipart,
    timer: &mut RequestTimer,
) -> Result<Json<Value>, ApiError> {
    let form = read_card_form(multipart).await?;
    let submission = validate_form(form, &CONFIG.default_gender_presentation)?;
    timer.set_submission(&submission.role, &submission.personality);

    // Validation is the only gate before outbound calls; everything past this point
    // degrades to fallbacks instead of failing the request, except a persona
    // transport failure.
    let photo_description = match submission.photo.as_deref() {
        Some(bytes) => {
            info!("Analyzing uploaded photo ({} bytes)", bytes.len());
            Some(describe_photo(bytes).await)
        }
        None => None,
    };

    let persona = generate_persona(
        &submission.role,
        &submission.pain_point,
        &submission.personality,
        &submission.gender_presentation,
        photo_description.as_deref(),
    )
    .await
    .map_err(ApiError::PersonaGeneration)?;
    info!("Generated persona '{}'", persona.title);

    let accessories = CONFIG.accessory_tables.resolve(
        &submission.role,
        &submission.personality,
        &submission.pain_point,
        &submission.bonus_accessory,
    );

    let render_prompt = author_render_prompt(
        &persona,
        &submission.role,
        &submission.pain_point,
        &submission.personality,
        &submission.gender_presentation,
        &accessories,
        photo_description.as_deref(),
    )
    .await;

    let render = render_card_image(&render_prompt).await;
    if render.is_placeholder() {
        warn!("Returning placeholder image for persona '{}'", persona.title);
    }

    state
        .submission_log
        .log_submission(&SubmissionRecord {
            timestamp: Utc::now(),
            email: submission.email.clone(),
            role: submission.role.clone(),
            pain_point: submission.pain_point.clone(),
            personality: submission.personality.clone(),
            gender_presentation: submission.gender_presentation.clone(),
            title: persona.title.clone(),
            quote: persona.quote.clone(),
        })
        .await;

    Ok(Json(json!({
        "success": true,
        "card": {
            "title": persona.title,
            "quote": persona.quote,
            "accessories": accessories,
            "image_url": render.url(),
        },
    })))
}

pub async fn test_route() -> &'static str {
    "Router is working!"
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn diagnose() -> Json<Value> {
    match read_recent_log_lines("server.log", DIAGNOSE_LOG_LINES) {
        Ok(Some(tail)) => Json(json!({
            "success": true,
            "log_file": tail.path.display().to_string(),
            "lines": tail.lines,
        })),
        Ok(None) => Json(json!({
            "success": true,
            "log_file": Value::Null,
            "lines": Vec::<String>::new(),
        })),
        Err(err) => Json(json!({
            "success": false,
            "error": err.to_string(),
        })),
    }
}
