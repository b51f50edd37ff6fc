use std::env;
use std::path::PathBuf;

use anyhow::Result;
use once_cell::sync::Lazy;

use crate::persona::accessories::AccessoryTables;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub log_level: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub persona_model: String,
    pub prompt_model: String,
    pub vision_model: String,
    pub image_model: String,
    pub persona_temperature: f32,
    pub persona_max_tokens: i32,
    pub prompt_temperature: f32,
    pub prompt_max_tokens: i32,
    pub vision_max_tokens: i32,
    pub image_size: String,
    pub image_quality: String,
    pub image_style: String,
    pub render_max_attempts: usize,
    pub render_backoff_seconds: u64,
    pub placeholder_image_url: String,
    pub fallback_render_prompt: String,
    pub brand_title: String,
    pub default_gender_presentation: String,
    pub submissions_csv_path: PathBuf,
    pub accessory_config_path: PathBuf,
    pub accessory_tables: AccessoryTables,
    pub max_upload_bytes: usize,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn resolve_accessory_config_path() -> PathBuf {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(env_value) = env::var("ACCESSORY_CONFIG_PATH") {
        let env_path = PathBuf::from(env_value);
        if env_path.is_absolute() {
            candidates.push(env_path);
        } else {
            candidates.push(
                env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(env_path),
            );
        }
    }
    candidates.push(PathBuf::from("accessories.json"));

    for candidate in &candidates {
        if candidate.exists() {
            return candidate.to_path_buf();
        }
    }

    candidates
        .first()
        .cloned()
        .unwrap_or_else(|| PathBuf::from("accessories.json"))
}

impl Config {
    pub fn load() -> Result<Self> {
        let openai_api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        if openai_api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("OPENAI_API_KEY is required"));
        }

        let accessory_config_path = resolve_accessory_config_path();
        let accessory_tables = AccessoryTables::load(&accessory_config_path);

        let brand_title = env_string("BRAND_TITLE", "Julep Confessionals");
        let fallback_render_prompt = format!(
            "Photorealistic 3D render of a toy action figure in clear plastic blister \
             packaging labeled \"{brand_title}\". Studio lighting, product photography, \
             highly detailed."
        );

        Ok(Config {
            port: env_u64("PORT", 10000) as u16,
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            openai_api_key,
            openai_base_url: env_string("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            persona_model: env_string("PERSONA_MODEL", "gpt-3.5-turbo"),
            prompt_model: env_string("PROMPT_MODEL", "gpt-4"),
            vision_model: env_string("VISION_MODEL", "gpt-4o"),
            image_model: env_string("IMAGE_MODEL", "dall-e-3"),
            persona_temperature: env_f32("PERSONA_TEMPERATURE", 0.8),
            persona_max_tokens: env_i32("PERSONA_MAX_TOKENS", 500),
            prompt_temperature: env_f32("PROMPT_TEMPERATURE", 0.7),
            prompt_max_tokens: env_i32("PROMPT_MAX_TOKENS", 500),
            vision_max_tokens: env_i32("VISION_MAX_TOKENS", 300),
            image_size: env_string("IMAGE_SIZE", "1024x1024"),
            image_quality: env_string("IMAGE_QUALITY", "hd"),
            image_style: env_string("IMAGE_STYLE", "vivid"),
            render_max_attempts: env_usize("RENDER_MAX_ATTEMPTS", 3).max(1),
            render_backoff_seconds: env_u64("RENDER_BACKOFF_SECONDS", 2),
            placeholder_image_url: env_string(
                "PLACEHOLDER_IMAGE_URL",
                "https://via.placeholder.com/300",
            ),
            fallback_render_prompt,
            brand_title,
            default_gender_presentation: env_string("DEFAULT_GENDER_PRESENTATION", "ambiguous"),
            submissions_csv_path: PathBuf::from(env_string(
                "SUBMISSIONS_CSV_PATH",
                "submissions.csv",
            )),
            accessory_config_path,
            accessory_tables,
            max_upload_bytes: env_usize("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
        })
    }
}

pub const PERSONA_SYSTEM_PROMPT: &str = "You create fun, creative CRM action figure personas in JSON format with title, quote, and visual_prompt fields. Be playful and imaginative - these are action figures! The title should be a superhero-like name that incorporates their role and personality. The quote should be a catchy one-liner that sounds like something an action figure would say. The visual_prompt should describe a detailed, colorful action figure with accessories and a dynamic pose. If given a person's appearance description, make sure the action figure reflects their actual physical features.";

pub const RENDER_PROMPT_SYSTEM_PROMPT: &str = "You are an expert at creating detailed, creative prompts for image generation. You specialize in prompts that produce high-quality, photorealistic 3D renders of action figures in vintage packaging. Your prompts consistently look like professional product photography of actual toys. Respond with the prompt text only, without quotation marks.";

pub const VISION_USER_PROMPT: &str = "I'm creating a custom action figure toy. Please describe the visual elements in this image that would be relevant for toy design: hair style and color, clothing style, and general visual characteristics. Focus on design elements only, not personal identification.";

pub const FALLBACK_PHOTO_DESCRIPTION: &str = "Professional person";
