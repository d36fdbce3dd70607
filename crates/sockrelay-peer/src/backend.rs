use std::sync::Arc;

use sockrelay_frame::ClientProfile;

/// Reply for requests no backend accepts.
pub const INVALID_COMMAND: &str = "invalid command";

/// Turns a request into the plain text sent back to the client.
pub trait CommandBackend: Send + Sync {
    fn execute(&self, command: &str) -> String;
}

impl<F> CommandBackend for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn execute(&self, command: &str) -> String {
        self(command)
    }
}

/// Routes requests to a backend by client profile.
///
/// Profiles A and B query logs, profile C queries system information.
#[derive(Clone)]
pub struct Dispatcher {
    log_query: Arc<dyn CommandBackend>,
    system_info: Arc<dyn CommandBackend>,
}

impl Dispatcher {
    pub fn new(log_query: Arc<dyn CommandBackend>, system_info: Arc<dyn CommandBackend>) -> Self {
        Self {
            log_query,
            system_info,
        }
    }

    pub fn dispatch(&self, profile: Option<ClientProfile>, command: &str) -> String {
        match profile {
            Some(ClientProfile::A | ClientProfile::B) => self.log_query.execute(command),
            Some(ClientProfile::C) => self.system_info.execute(command),
            None => INVALID_COMMAND.to_string(),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}
