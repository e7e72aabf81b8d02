use crate::config::Config;
use crate::responder::GeminiResponder;
use crate::sender::TwilioSender;
use crate::store::ConversationStore;

/// Shared per-process state handed to every handler.  Collaborators are
/// constructed once at startup from `Config`; nothing reads the environment
/// after that.
pub struct AppState {
    pub config: Config,
    pub store: ConversationStore,
    pub responder: GeminiResponder,
    pub sender: TwilioSender,
}
