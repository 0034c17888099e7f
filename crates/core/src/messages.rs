//! Fixed caller-facing text. Every failure path that reaches a caller resolves to one of these.

pub const GREETING: &str = "Welcome to the AI Assistant. How can I help you?";
pub const REPROMPT: &str = "Sorry, I didn't hear that. Please say it again.";
pub const FOLLOW_UP: &str = "Do you have any other questions?";

pub const VOICE_LIMIT_REACHED: &str = "Sorry, you have reached the call limit for today.";
pub const SMS_LIMIT_REACHED: &str = "Sorry, you have reached the SMS limit for today.";

pub const SMS_EMPTY_BODY: &str = "Please send your question as a text message.";
pub const SMS_ACCEPTED: &str = "Message processed";

pub const GENERATION_MISSING_FIELD: &str =
    "Sorry, I\u{2019}m unable to understand your input right now.";
pub const GENERATION_BACKEND_ERROR: &str =
    "The system is temporarily unable to process your request, please try again later.";
pub const GENERATION_TIMEOUT: &str =
    "Sorry, the assistant is taking too long to respond. Please try again in a moment.";
pub const GENERATION_TRANSPORT_ERROR: &str = "Sorry, there was an error processing your request.";
