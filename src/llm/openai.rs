use std::time::Duration;

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{
    CONFIG, FALLBACK_PHOTO_DESCRIPTION, PERSONA_SYSTEM_PROMPT, RENDER_PROMPT_SYSTEM_PROMPT,
    VISION_USER_PROMPT,
};
use crate::llm::media::photo_data_url;
use crate::llm::{summarize_error_body, truncate_for_log};
use crate::persona::accessories::format_accessory_list;
use crate::persona::{fallback_persona, parse_persona_response, Persona};
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

const CHAT_REQUEST_TIMEOUT_SECS: u64 = 60;

async fn call_chat_api(payload: &Value) -> Result<Value> {
    debug!(
        "Chat request: model={}, messages={}",
        payload.get("model").and_then(|v| v.as_str()).unwrap_or("unknown"),
        payload
            .get("messages")
            .and_then(|v| v.as_array())
            .map(|messages| messages.len())
            .unwrap_or(0)
    );

    let client = get_http_client();
    let response = client
        .post(format!(
            "{}/chat/completions",
            CONFIG.openai_base_url.trim_end_matches('/')
        ))
        .header(
            "Authorization",
            format!("Bearer {}", CONFIG.openai_api_key),
        )
        .timeout(Duration::from_secs(CHAT_REQUEST_TIMEOUT_SECS))
        .json(payload)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let (message, body_summary) = summarize_error_body(&body);
        warn!("Chat API error: status={}, body={}", status, body_summary);
        let detail = message.unwrap_or(body_summary);
        return Err(anyhow!(
            "Chat request failed with status {}: {}",
            status,
            detail
        ));
    }

    Ok(response.json::<Value>().await?)
}

fn extract_chat_content(response: &Value) -> String {
    response
        .get("choices")
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("message"))
        .and_then(|v| v.get("content"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string()
}

fn build_persona_user_prompt(
    role: &str,
    pain_point: &str,
    personality: &str,
    gender_presentation: &str,
    photo_description: Option<&str>,
) -> String {
    let mut user_prompt = format!(
        "Create a CRM action figure persona based on this role: {role}, pain point: \
         {pain_point}, personality: {personality}, and gender preference: {gender_presentation}."
    );

    match photo_description {
        Some(description) => {
            user_prompt.push_str(&format!(
                " The action figure should resemble this person: {description}. Make sure the \
                 action figure reflects their actual appearance and gender preference."
            ));
        }
        None => {
            user_prompt.push_str(&format!(
                " The action figure should have a {gender_presentation} appearance."
            ));
        }
    }

    user_prompt.push_str(" Make it fun, creative and memorable - like a real action figure character!");
    user_prompt
}

/// Generates the persona for one submission. Transport-level failure is surfaced to
/// the caller (the one fatal upstream error in the pipeline); an unparseable response
/// degrades to the deterministic templated persona built from the same inputs.
pub async fn generate_persona(
    role: &str,
    pain_point: &str,
    personality: &str,
    gender_presentation: &str,
    photo_description: Option<&str>,
) -> Result<Persona> {
    let user_prompt =
        build_persona_user_prompt(role, pain_point, personality, gender_presentation, photo_description);

    let payload = json!({
        "model": CONFIG.persona_model,
        "messages": [
            { "role": "system", "content": PERSONA_SYSTEM_PROMPT },
            { "role": "user", "content": user_prompt },
        ],
        "temperature": CONFIG.persona_temperature,
        "max_tokens": CONFIG.persona_max_tokens,
        "response_format": { "type": "json_object" },
    });

    let response = log_llm_timing(
        "openai",
        &CONFIG.persona_model,
        "chat:persona",
        None,
        || async { call_chat_api(&payload).await },
    )
    .await?;

    let content = extract_chat_content(&response);
    match parse_persona_response(&content) {
        Some(persona) => Ok(persona),
        None => {
            warn!(
                "Falling back to templated persona; raw response: {}",
                truncate_for_log(&content, 500)
            );
            Ok(fallback_persona(role, pain_point, personality))
        }
    }
}

/// Describes an uploaded photo for prompt construction. Never fails: any error is
/// replaced with the generic description.
pub async fn describe_photo(image_bytes: &[u8]) -> String {
    let data_url = photo_data_url(image_bytes);
    let payload = json!({
        "model": CONFIG.vision_model,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": VISION_USER_PROMPT },
                { "type": "image_url", "image_url": { "url": data_url } },
            ],
        }],
        "max_tokens": CONFIG.vision_max_tokens,
    });

    let result = log_llm_timing(
        "openai",
        &CONFIG.vision_model,
        "chat:describe_photo",
        Some(json!({ "image_bytes": image_bytes.len() })),
        || async { call_chat_api(&payload).await },
    )
    .await;

    match result {
        Ok(response) => {
            let description = extract_chat_content(&response);
            if description.is_empty() {
                warn!("Vision response was empty; using generic photo description");
                FALLBACK_PHOTO_DESCRIPTION.to_string()
            } else {
                description
            }
        }
        Err(err) => {
            warn!("Photo description failed: {err}; using generic photo description");
            FALLBACK_PHOTO_DESCRIPTION.to_string()
        }
    }
}

fn build_prompt_author_request(
    persona: &Persona,
    role: &str,
    pain_point: &str,
    personality: &str,
    gender_presentation: &str,
    accessories: &[String],
    photo_description: Option<&str>,
    brand_title: &str,
) -> String {
    let accessories_text = format_accessory_list(accessories);
    let appearance_line = photo_description
        .map(|description| format!("\nPerson's Appearance: {description}"))
        .unwrap_or_default();

    format!(
        "Create an image-generation prompt for a satirical CRM action figure based on:\n\n\
         Title: \"{title}\"\n\
         Role: {role}\n\
         Pain Point: {pain_point}\n\
         Personality: {personality}\n\
         Gender Preference: {gender_presentation}\n\
         Quote: \"{quote}\"\n\
         Character concept: {visual_prompt}{appearance_line}\n\n\
         CRITICAL REQUIREMENTS:\n\
         1. ALWAYS show a full-body action figure (never cut off body parts)\n\
         2. If no clothing is visible in the photo, default to a simple dark outfit\n\
         3. Eyes must be a consistent, realistic color\n\
         4. Gender appearance must match the specified preference: {gender_presentation}\n\n\
         PACKAGING REQUIREMENTS:\n\
         1. Main brand title: \"{brand_title}\" at the top\n\
         2. Character title: \"{title}\" prominently displayed\n\
         3. NO other text or wording on the packaging\n\
         4. Consistent vintage toy packaging style\n\n\
         ACCESSORIES: include {accessories_text} as symbolic accessory items.\n\n\
         Start with \"Photorealistic 3D render of a full-body toy action figure in clear \
         plastic blister packaging with cardboard backing.\" and end with \"Studio lighting, \
         professional product photography, highly detailed, consistent toy packaging style.\"",
        title = persona.title,
        quote = persona.quote,
        visual_prompt = persona.visual_prompt,
    )
}

pub(crate) fn build_fallback_render_prompt(
    persona: &Persona,
    role: &str,
    personality: &str,
    gender_presentation: &str,
    accessories: &[String],
    photo_description: Option<&str>,
    brand_title: &str,
) -> String {
    let mut prompt = format!(
        "Photorealistic 3D render of a full-body {gender_presentation} toy action figure in \
         clear plastic blister packaging with cardboard backing. Main title \"{brand_title}\" \
         at top, character name \"{title}\" below. The figure represents a {role} with \
         {personality} personality.",
        title = persona.title,
    );

    match photo_description {
        Some(description) => prompt.push_str(&format!(
            " The action figure matches this appearance: {description}, with realistic matching \
             eye color and full body visible."
        )),
        None => prompt.push_str(&format!(
            " The {gender_presentation} figure has realistic proportions and consistent eye color."
        )),
    }

    let accessories_text = format_accessory_list(accessories);
    if !accessories_text.is_empty() {
        prompt.push_str(&format!(
            " Includes {accessories_text} as symbolic accessory items based on their CRM struggle."
        ));
    }
    prompt.push_str(
        " Studio lighting, professional product photography, highly detailed, consistent \
         packaging style.",
    );
    prompt
}

/// Authors the final render prompt via the prompt model, falling back to the
/// deterministic template when the call fails or comes back empty.
#[allow(clippy::too_many_arguments)]
pub async fn author_render_prompt(
    persona: &Persona,
    role: &str,
    pain_point: &str,
    personality: &str,
    gender_presentation: &str,
    accessories: &[String],
    photo_description: Option<&str>,
) -> String {
    let user_prompt = build_prompt_author_request(
        persona,
        role,
        pain_point,
        personality,
        gender_presentation,
        accessories,
        photo_description,
        &CONFIG.brand_title,
    );

    let payload = json!({
        "model": CONFIG.prompt_model,
        "messages": [
            { "role": "system", "content": RENDER_PROMPT_SYSTEM_PROMPT },
            { "role": "user", "content": user_prompt },
        ],
        "temperature": CONFIG.prompt_temperature,
        "max_tokens": CONFIG.prompt_max_tokens,
    });

    let result = log_llm_timing(
        "openai",
        &CONFIG.prompt_model,
        "chat:render_prompt",
        None,
        || async { call_chat_api(&payload).await },
    )
    .await;

    match result {
        Ok(response) => {
            let prompt = extract_chat_content(&response);
            if prompt.is_empty() {
                warn!("Prompt model returned empty content; using fallback render prompt");
            } else {
                return prompt;
            }
        }
        Err(err) => {
            warn!("Render prompt authoring failed: {err}; using fallback render prompt");
        }
    }

    build_fallback_render_prompt(
        persona,
        role,
        personality,
        gender_presentation,
        accessories,
        photo_description,
        &CONFIG.brand_title,
    )
}
