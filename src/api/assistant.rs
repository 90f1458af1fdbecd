// src/api/assistant.rs
//
// Medical-assistant endpoints. Each one builds a feature-specific prompt and
// delegates entirely to the external LLM gateway; nothing here interprets
// medical content. Paid-tier features are gated on a live entitlement.

use actix_web::{post, web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::api::ai_client;
use crate::api::auth::AuthedUser;
use crate::entitlement;
use crate::error::ApiError;
use crate::AppState;

async fn require_active_plan(state: &AppState, user_id: i32) -> Result<(), ApiError> {
    let today = Utc::now().date_naive();
    let view = entitlement::resolve(&state.pool, user_id, today).await?;
    if view.is_active {
        Ok(())
    } else {
        Err(ApiError::SubscriptionRequired)
    }
}

async fn relay(
    state: &AppState,
    feature: &str,
    system_prompt: &str,
    user_content: serde_json::Value,
) -> Result<HttpResponse, ApiError> {
    let content = ai_client::complete(
        &state.config.ai_gateway_url,
        &state.config.ai_gateway_key,
        &state.config.ai_model,
        system_prompt,
        user_content,
    )
    .await?;

    log::info!("ai request completed feature={feature}");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "result": ai_client::parse_result(&content),
    })))
}

const SYMPTOM_PROMPT: &str = "You are an expert medical AI assistant. Analyze the exact symptoms \
provided and respond with ONLY valid JSON: {\"analysis\": string, \"recommendations\": \
[string], \"possibleConditions\": [string]}. List conditions from most to least likely and \
include home remedies, lifestyle changes, and when to seek care.";

const PRESCRIPTION_PROMPT: &str = "You are an expert medical AI providing treatment \
recommendations. Only recommend over-the-counter medications, with specific dosages and timing, \
tailored to the diagnosis and patient details. Respond with ONLY valid JSON: {\"medications\": \
[string], \"recommendations\": [string], \"precautions\": [string]}.";

const REPORT_PROMPT: &str = "You are an expert medical AI that analyzes medical reports. \
Identify all abnormal values and their significance, give context for the findings, and provide \
clear, actionable recommendations in patient-friendly language.";

const DIET_PROMPT: &str = "You are a clinical nutrition assistant. Build a practical daily diet \
plan tailored to the patient's goal, preferences and health conditions. Respond with ONLY valid \
JSON: {\"meals\": [{\"name\": string, \"items\": [string]}], \"guidelines\": [string], \
\"avoid\": [string]}.";

const BODY_SCAN_PROMPT: &str = "You are a medical imaging assistant. Describe visible findings \
on the provided body image, flag anything that warrants in-person examination, and be explicit \
that this is not a diagnosis.";

#[derive(Debug, Deserialize)]
pub struct SymptomRequest {
    pub symptoms: String,
}

/// Available on the free plan.
#[post("/ai/symptom-analysis")]
pub async fn symptom_analysis(
    state: web::Data<AppState>,
    _user: web::ReqData<AuthedUser>,
    payload: web::Json<SymptomRequest>,
) -> Result<HttpResponse, ApiError> {
    if payload.symptoms.trim().is_empty() {
        return Err(ApiError::Validation("Symptoms are required".into()));
    }

    relay(
        &state,
        "symptom-analysis",
        SYMPTOM_PROMPT,
        json!(format!(
            "Analyze these symptoms thoroughly and provide a detailed medical assessment:\n\nSymptoms: \"{}\"",
            payload.symptoms
        )),
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct PatientInfo {
    pub age: Option<u32>,
    pub gender: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PrescriptionRequest {
    pub diagnosis: String,
    pub patient_info: Option<PatientInfo>,
}

#[post("/ai/prescription")]
pub async fn prescription(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
    payload: web::Json<PrescriptionRequest>,
) -> Result<HttpResponse, ApiError> {
    if payload.diagnosis.trim().is_empty() {
        return Err(ApiError::Validation("Diagnosis is required".into()));
    }
    require_active_plan(&state, user.id).await?;

    let mut details = String::new();
    if let Some(info) = &payload.patient_info {
        if let Some(age) = info.age {
            details.push_str(&format!("Age: {age}. "));
        }
        if let Some(gender) = &info.gender {
            details.push_str(&format!("Gender: {gender}. "));
        }
        if !info.allergies.is_empty() {
            details.push_str(&format!("Allergies: {}. ", info.allergies.join(", ")));
        }
    }

    relay(
        &state,
        "prescription",
        PRESCRIPTION_PROMPT,
        json!(format!(
            "Create a detailed treatment plan for this diagnosis:\n\nDiagnosis: \"{}\"\n{}",
            payload.diagnosis,
            if details.is_empty() {
                String::new()
            } else {
                format!("Patient Information: {details}")
            }
        )),
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub report_content: String,
}

#[post("/ai/report-analysis")]
pub async fn report_analysis(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
    payload: web::Json<ReportRequest>,
) -> Result<HttpResponse, ApiError> {
    if payload.report_content.trim().is_empty() {
        return Err(ApiError::Validation("Report content is required".into()));
    }
    require_active_plan(&state, user.id).await?;

    relay(
        &state,
        "report-analysis",
        REPORT_PROMPT,
        json!(format!(
            "Analyze this medical report and provide a comprehensive assessment:\n\n{}",
            payload.report_content
        )),
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct DietPlanRequest {
    pub goal: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub dietary_preferences: Option<String>,
    pub health_conditions: Option<String>,
}

#[post("/ai/diet-plan")]
pub async fn diet_plan(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
    payload: web::Json<DietPlanRequest>,
) -> Result<HttpResponse, ApiError> {
    if payload.goal.trim().is_empty() {
        return Err(ApiError::Validation("Goal is required".into()));
    }
    require_active_plan(&state, user.id).await?;

    let mut prompt = format!("Create a daily diet plan.\n\nGoal: {}", payload.goal);
    if let Some(age) = payload.age {
        prompt.push_str(&format!("\nAge: {age}"));
    }
    if let Some(gender) = &payload.gender {
        prompt.push_str(&format!("\nGender: {gender}"));
    }
    if let Some(prefs) = &payload.dietary_preferences {
        prompt.push_str(&format!("\nDietary preferences: {prefs}"));
    }
    if let Some(conditions) = &payload.health_conditions {
        prompt.push_str(&format!("\nHealth conditions: {conditions}"));
    }

    relay(&state, "diet-plan", DIET_PROMPT, json!(prompt)).await
}

#[derive(Debug, Deserialize)]
pub struct BodyScanRequest {
    /// Data-URL or raw base64 image content.
    pub image_base64: String,
    pub notes: Option<String>,
}

#[post("/ai/body-scan")]
pub async fn body_scan(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
    payload: web::Json<BodyScanRequest>,
) -> Result<HttpResponse, ApiError> {
    if payload.image_base64.trim().is_empty() {
        return Err(ApiError::Validation("Image is required".into()));
    }
    require_active_plan(&state, user.id).await?;

    let text = payload
        .notes
        .clone()
        .unwrap_or_else(|| "Describe any visible medical findings on this image.".to_string());

    // Multimodal message content: text part plus image part.
    let content = json!([
        { "type": "text", "text": text },
        { "type": "image_url", "image_url": { "url": payload.image_base64 } },
    ]);

    relay(&state, "body-scan", BODY_SCAN_PROMPT, content).await
}
