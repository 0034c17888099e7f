use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use dialtone_core::{ApplicationError, WebhookEndpoint};
use dialtone_telephony::twiml;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::dispatcher::{Dispatcher, InboundEvent};

#[derive(Clone)]
pub struct WebhookState {
    dispatcher: Arc<Dispatcher>,
}

#[derive(Debug, Deserialize)]
pub struct VoiceForm {
    #[serde(rename = "From")]
    from: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SpeechForm {
    #[serde(rename = "SpeechResult")]
    speech_result: Option<String>,
    #[serde(rename = "From")]
    from: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SmsForm {
    #[serde(rename = "Body")]
    body: Option<String>,
    #[serde(rename = "From")]
    from: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: &'static str,
}

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route(WebhookEndpoint::Voice.path(), post(voice))
        .route(WebhookEndpoint::ProcessSpeech.path(), post(process_speech))
        .route(WebhookEndpoint::Sms.path(), post(sms))
        .with_state(WebhookState { dispatcher })
}

async fn voice(
    State(state): State<WebhookState>,
    form: Result<Form<VoiceForm>, FormRejection>,
) -> Response {
    let endpoint = WebhookEndpoint::Voice;
    let correlation_id = received(endpoint);
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => return malformed(endpoint, &correlation_id, rejection),
    };

    let event = InboundEvent { correlation_id, from: form.from, text: None };
    match state.dispatcher.handle_voice_entry(&event).await {
        Ok(response) => voice_markup(response.to_xml()),
        Err(err) => failure(endpoint, &event.correlation_id, err.into()),
    }
}

async fn process_speech(
    State(state): State<WebhookState>,
    form: Result<Form<SpeechForm>, FormRejection>,
) -> Response {
    let endpoint = WebhookEndpoint::ProcessSpeech;
    let correlation_id = received(endpoint);
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => return malformed(endpoint, &correlation_id, rejection),
    };

    let event = InboundEvent { correlation_id, from: form.from, text: form.speech_result };
    match state.dispatcher.handle_voice_continuation(&event).await {
        Ok(response) => voice_markup(response.to_xml()),
        Err(err) => failure(endpoint, &event.correlation_id, err.into()),
    }
}

async fn sms(
    State(state): State<WebhookState>,
    form: Result<Form<SmsForm>, FormRejection>,
) -> Response {
    let endpoint = WebhookEndpoint::Sms;
    let correlation_id = received(endpoint);
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => return malformed(endpoint, &correlation_id, rejection),
    };

    let event = InboundEvent { correlation_id, from: form.from, text: form.body };
    match state.dispatcher.handle_sms(&event).await {
        Ok(body) => body.into_response(),
        Err(err) => failure(endpoint, &event.correlation_id, err.into()),
    }
}

fn received(endpoint: WebhookEndpoint) -> String {
    let correlation_id = Uuid::new_v4().to_string();
    info!(
        event_name = "webhook.received",
        correlation_id = %correlation_id,
        endpoint = endpoint.path(),
        "inbound webhook"
    );
    correlation_id
}

fn voice_markup(xml: String) -> Response {
    ([(header::CONTENT_TYPE, twiml::CONTENT_TYPE)], xml).into_response()
}

fn malformed(endpoint: WebhookEndpoint, correlation_id: &str, rejection: FormRejection) -> Response {
    failure(endpoint, correlation_id, ApplicationError::MalformedBody(rejection.body_text()))
}

fn failure(endpoint: WebhookEndpoint, correlation_id: &str, error: ApplicationError) -> Response {
    let interface = error.into_interface(endpoint, correlation_id);
    error!(
        event_name = "webhook.failed",
        correlation_id = interface.correlation_id(),
        endpoint = endpoint.path(),
        error = %interface,
        "webhook processing failed"
    );
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { detail: interface.user_message() }))
        .into_response()
}
