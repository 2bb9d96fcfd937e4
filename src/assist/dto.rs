use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CodeGenerationRequest {
    pub prompt: String,
    pub language: Option<String>,
    pub context: Option<String>, // surrounding code
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

#[derive(Debug, Serialize)]
pub struct CodeGenerationResponse {
    pub generated_code: String,
    pub language_detected: Option<String>,
    pub confidence: Option<f32>,
    pub warnings: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct CodeExplanationRequest {
    pub code_block: String,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CodeExplanationResponse {
    pub explanation: String,
    pub language_detected: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CodeRefactorRequest {
    pub code_block: String,
    pub language: Option<String>,
    pub refactor_goals: Vec<String>, // e.g. "DRY", "performance"
}

#[derive(Debug, Serialize)]
pub struct CodeRefactorResponse {
    pub refactored_code: String,
    pub changes_summary: Vec<String>,
}
