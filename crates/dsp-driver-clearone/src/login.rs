//! Login handshake for transports that prompt for credentials.
//!
//! The unit sends `Username:` and `Password:` without a line terminator and
//! shows a `=>` command prompt once the session is authenticated. The framer
//! surfaces those prompts as lines (see [`crate::framer::LineFramer::take_prompt`]).

use crate::config::LoginSettings;

pub const USERNAME_PROMPT: &str = "Username:";
pub const PASSWORD_PROMPT: &str = "Password:";
pub const COMMAND_PROMPT: &str = "=>";

/// Unterminated prompts the framer should release.
pub fn login_prompts() -> Vec<String> {
    vec![
        USERNAME_PROMPT.to_string(),
        PASSWORD_PROMPT.to_string(),
        COMMAND_PROMPT.to_string(),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    AwaitingUsername,
    AwaitingPassword,
    LoggedIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginAction {
    /// Send this line
    Respond(String),
    /// Session authenticated; start the bootstrap
    Completed,
    /// The unit rejected the credentials
    Rejected,
    None,
}

#[derive(Debug, Clone)]
pub struct LoginHandshake {
    credentials: LoginSettings,
    state: LoginState,
}

impl LoginHandshake {
    pub fn new(credentials: LoginSettings) -> Self {
        Self {
            credentials,
            state: LoginState::AwaitingUsername,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == LoginState::LoggedIn
    }

    pub fn reset(&mut self) {
        self.state = LoginState::AwaitingUsername;
    }

    /// Advance on one received line.
    pub fn on_line(&mut self, line: &str) -> LoginAction {
        let text = line.trim();

        if text.ends_with(USERNAME_PROMPT) {
            // A second username prompt right after the password means the
            // credentials were refused; resending them would only repeat that.
            if self.state == LoginState::AwaitingPassword {
                tracing::warn!("login rejected");
                self.state = LoginState::AwaitingUsername;
                return LoginAction::Rejected;
            }
            tracing::debug!("sending login username");
            self.state = LoginState::AwaitingPassword;
            return LoginAction::Respond(self.credentials.username.clone());
        }

        if text.ends_with(PASSWORD_PROMPT) {
            tracing::debug!("sending login password");
            self.state = LoginState::AwaitingPassword;
            return LoginAction::Respond(self.credentials.password.clone());
        }

        if self.state != LoginState::LoggedIn && text.contains(COMMAND_PROMPT) {
            tracing::info!("login complete");
            self.state = LoginState::LoggedIn;
            return LoginAction::Completed;
        }

        LoginAction::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake() -> LoginHandshake {
        LoginHandshake::new(LoginSettings {
            username: "clearone".into(),
            password: "converge".into(),
        })
    }

    #[test]
    fn test_full_handshake() {
        let mut login = handshake();
        assert_eq!(
            login.on_line("Username:"),
            LoginAction::Respond("clearone".into())
        );
        assert_eq!(
            login.on_line("Password:"),
            LoginAction::Respond("converge".into())
        );
        assert!(!login.is_logged_in());
        assert_eq!(login.on_line("=>"), LoginAction::Completed);
        assert!(login.is_logged_in());

        // Later command prompts do not restart the bootstrap
        assert_eq!(login.on_line("=>"), LoginAction::None);
    }

    #[test]
    fn test_banner_before_prompt() {
        let mut login = handshake();
        assert_eq!(login.on_line("ClearOne Converge Pro 2"), LoginAction::None);
        assert_eq!(
            login.on_line("Converge Username:"),
            LoginAction::Respond("clearone".into())
        );
    }

    #[test]
    fn test_rejected_credentials() {
        let mut login = handshake();
        login.on_line("Username:");
        login.on_line("Password:");
        assert_eq!(login.on_line("Username:"), LoginAction::Rejected);
        assert_eq!(login.state(), LoginState::AwaitingUsername);
        assert!(!login.is_logged_in());
    }

    #[test]
    fn test_reset() {
        let mut login = handshake();
        login.on_line("Username:");
        login.on_line("Password:");
        login.on_line("=>");
        login.reset();
        assert_eq!(login.state(), LoginState::AwaitingUsername);
    }
}
