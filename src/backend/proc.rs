use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::{Backend, BackendKind};
use crate::Result;
use crate::error::{Error, TransportError};
use crate::message::{Message, Outcome, Reference, Response};
use crate::util;

const NOTIFIER_PROGRAM: &str = "terminal-notifier";

/// Structured stdout payload of the notifier process.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotifierOutput {
    activation_type: String,
    #[serde(default)]
    activation_value: Option<String>,
}

/// Backend spawning one `terminal-notifier` process per message.
pub struct ProcBackend {
    program: PathBuf,
    app_name: String,
    show_app_name: bool,
}

impl ProcBackend {
    /// Locate the notifier binary on `PATH`.
    ///
    /// # Errors
    ///
    /// Fails when the binary is absent, which the selector surfaces as this
    /// backend's unavailability reason.
    pub fn new(
        app_name: impl Into<String>,
        show_app_name: bool,
    ) -> std::result::Result<Self, TransportError> {
        let program = which::which(NOTIFIER_PROGRAM).map_err(|err| {
            TransportError::ProgramNotFound {
                program: NOTIFIER_PROGRAM.to_string(),
                message: err.to_string(),
            }
        })?;
        Ok(Self::with_program(program, app_name, show_app_name))
    }

    /// Use a notifier binary at a known location instead of searching
    /// `PATH`.
    pub fn with_program(
        program: impl Into<PathBuf>,
        app_name: impl Into<String>,
        show_app_name: bool,
    ) -> Self {
        Self {
            program: program.into(),
            app_name: app_name.into(),
            show_app_name,
        }
    }

    fn build_args(&self, msg: &Message, group: &str) -> Vec<String> {
        let mut args = Vec::new();
        let mut timeoutable = true;
        // With the app name shown in the title slot, the message's own
        // title moves down to the subtitle.
        let title_flag = if self.show_app_name {
            "-subtitle"
        } else {
            "-title"
        };

        if self.show_app_name {
            args.extend(["-title".to_string(), self.app_name.clone()]);
        }
        args.extend([title_flag.to_string(), msg.title().to_string()]);

        if let Some(text) = msg.text() {
            args.extend(["-message".to_string(), text.to_string()]);
        }
        if let Some(icon) = msg.icon() {
            args.extend([
                "-appIcon".to_string(),
                util::expand_path(icon).display().to_string(),
            ]);
        }

        let actions = msg.actions();
        if actions.len() >= 2 {
            // The close button doubles as the first action; the rest go on
            // the comma-joined action list.
            timeoutable = false;
            args.extend(["-closeLabel".to_string(), actions[0].label.clone()]);
            args.extend([
                "-actions".to_string(),
                actions[1..]
                    .iter()
                    .map(|a| a.label.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            ]);
        } else if let [action] = actions {
            timeoutable = false;
            args.extend(["-actions".to_string(), action.label.clone()]);
        }

        if let Some(label) = msg.extra("dropdown_label").and_then(|v| v.as_str()) {
            args.extend(["-dropdownLabel".to_string(), label.to_string()]);
        }

        if msg.reply() {
            timeoutable = false;
            args.push("-reply".to_string());
        }

        if timeoutable {
            if let Some(timeout) = msg.timeout() {
                args.extend(["-timeout".to_string(), timeout.as_secs().max(1).to_string()]);
            }
        }

        // Group token lets a later dismiss target this notification.
        args.extend(["-group".to_string(), group.to_string()]);
        args.push("-json".to_string());
        args
    }

    fn parse_output(
        msg: &Message,
        stdout: &[u8],
    ) -> std::result::Result<Option<Outcome>, TransportError> {
        let mut output: NotifierOutput =
            serde_json::from_slice(stdout).map_err(|err| TransportError::Output {
                message: err.to_string(),
            })?;

        // Undo the repurposed close button: with two or more actions a
        // "closed" activation really means the first action was picked.
        if msg.actions().len() >= 2 && output.activation_type == "closed" {
            output.activation_type = "actionClicked".to_string();
            output.activation_value = Some(msg.actions()[0].label.clone());
        }

        Ok(match output.activation_type.as_str() {
            "actionClicked" => output
                .activation_value
                .as_deref()
                .and_then(|label| reverse_action_lookup(msg, label))
                .map(Outcome::Action),
            "replied" => Some(Outcome::Replied(
                output.activation_value.unwrap_or_default(),
            )),
            "contentsClicked" | "closed" => Some(Outcome::Closed),
            "timeout" => Some(Outcome::Timeout),
            other => Some(Outcome::Other(other.to_string())),
        })
    }
}

/// Recover the internal action id from the display label reported by the
/// notifier, which has no id channel of its own.
fn reverse_action_lookup(msg: &Message, label: &str) -> Option<String> {
    msg.actions()
        .iter()
        .find(|action| action.label == label)
        .map(|action| action.id.clone())
}

#[async_trait]
impl Backend for ProcBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Proc
    }

    async fn send(&self, msg: &Message, wait: bool) -> Result<Response> {
        let reference = Reference::fresh_token();
        let args = self.build_args(msg, &reference.to_string());
        debug!(%reference, title = msg.title(), "spawning notifier");

        let mut command = Command::new(&self.program);
        command.args(&args).stdin(Stdio::null());

        let outcome = if wait {
            let output = command
                .output()
                .await
                .map_err(|source| spawn_error(&self.program, source))?;
            Self::parse_output(msg, &output.stdout)?
        } else {
            command
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|source| spawn_error(&self.program, source))?;
            None
        };

        Ok(Response {
            backend: BackendKind::Proc,
            reference,
            outcome,
        })
    }

    async fn dismiss(&self, reference: &Reference) -> Result<()> {
        Command::new(&self.program)
            .args(["-remove", &reference.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| spawn_error(&self.program, source))?;
        Ok(())
    }
}

fn spawn_error(program: &std::path::Path, source: std::io::Error) -> Error {
    Error::Transport(TransportError::Spawn {
        program: program.display().to_string(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::ProcBackend;
    use crate::message::{Message, Outcome};
    use std::time::Duration;

    fn backend() -> ProcBackend {
        ProcBackend::with_program("/opt/notifier/bin/terminal-notifier", "test-app", false)
    }

    fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn plain_message_args() {
        let msg = Message::builder("Title")
            .text("Body")
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap();
        let args = backend().build_args(&msg, "ref-1");

        assert_eq!(arg_value(&args, "-title"), Some("Title"));
        assert_eq!(arg_value(&args, "-message"), Some("Body"));
        assert_eq!(arg_value(&args, "-timeout"), Some("3"));
        assert_eq!(arg_value(&args, "-group"), Some("ref-1"));
        assert_eq!(args.last().map(String::as_str), Some("-json"));
    }

    #[test]
    fn show_app_name_moves_title_to_subtitle() {
        let backend = ProcBackend::with_program("/bin/tn", "MyApp", true);
        let msg = Message::builder("Title").build().unwrap();
        let args = backend.build_args(&msg, "ref-1");

        assert_eq!(arg_value(&args, "-title"), Some("MyApp"));
        assert_eq!(arg_value(&args, "-subtitle"), Some("Title"));
    }

    #[test]
    fn two_actions_repurpose_the_close_button() {
        let msg = Message::builder("Q")
            .action("yes", "Yes!")
            .action("no", "No!")
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap();
        let args = backend().build_args(&msg, "ref-1");

        assert_eq!(arg_value(&args, "-closeLabel"), Some("Yes!"));
        assert_eq!(arg_value(&args, "-actions"), Some("No!"));
        // actions disable the timeout
        assert_eq!(arg_value(&args, "-timeout"), None);
    }

    #[test]
    fn single_action_goes_on_the_action_list() {
        let msg = Message::builder("Q")
            .action("ok", "Sure")
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap();
        let args = backend().build_args(&msg, "ref-1");

        assert_eq!(arg_value(&args, "-closeLabel"), None);
        assert_eq!(arg_value(&args, "-actions"), Some("Sure"));
        assert_eq!(arg_value(&args, "-timeout"), None);
    }

    #[test]
    fn reply_flag_disables_timeout() {
        let msg = Message::builder("Hey")
            .reply(true)
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap();
        let args = backend().build_args(&msg, "ref-1");

        assert!(args.iter().any(|a| a == "-reply"));
        assert_eq!(arg_value(&args, "-timeout"), None);
    }

    #[test]
    fn closed_with_two_actions_maps_to_first_action() {
        let msg = Message::builder("Q")
            .action("yes", "Yes!")
            .action("no", "No!")
            .build()
            .unwrap();
        let outcome =
            ProcBackend::parse_output(&msg, br#"{"activationType": "closed"}"#).unwrap();
        assert_eq!(outcome, Some(Outcome::Action("yes".to_string())));
    }

    #[test]
    fn action_click_reverse_looks_up_the_id() {
        let msg = Message::builder("Q")
            .action("yes", "Yes!")
            .action("no", "No!")
            .build()
            .unwrap();
        let outcome = ProcBackend::parse_output(
            &msg,
            br#"{"activationType": "actionClicked", "activationValue": "No!"}"#,
        )
        .unwrap();
        assert_eq!(outcome, Some(Outcome::Action("no".to_string())));
    }

    #[test]
    fn unknown_action_label_is_unresolved() {
        let msg = Message::builder("Q").action("yes", "Yes!").build().unwrap();
        let outcome = ProcBackend::parse_output(
            &msg,
            br#"{"activationType": "actionClicked", "activationValue": "Whatever"}"#,
        )
        .unwrap();
        assert_eq!(outcome, None);
    }

    #[test]
    fn replied_carries_its_payload() {
        let msg = Message::builder("Hey").reply(true).build().unwrap();
        let outcome = ProcBackend::parse_output(
            &msg,
            br#"{"activationType": "replied", "activationValue": "ok"}"#,
        )
        .unwrap();
        assert_eq!(outcome, Some(Outcome::Replied("ok".to_string())));
    }

    #[test]
    fn close_reasons_normalize() {
        let msg = Message::builder("Hello").build().unwrap();
        for payload in [
            br#"{"activationType": "contentsClicked"}"# as &[u8],
            br#"{"activationType": "closed"}"#,
        ] {
            assert_eq!(
                ProcBackend::parse_output(&msg, payload).unwrap(),
                Some(Outcome::Closed)
            );
        }
        assert_eq!(
            ProcBackend::parse_output(&msg, br#"{"activationType": "timeout"}"#).unwrap(),
            Some(Outcome::Timeout)
        );
    }

    #[test]
    fn unrecognized_activation_passes_through_raw() {
        let msg = Message::builder("Hello").build().unwrap();
        let outcome =
            ProcBackend::parse_output(&msg, br#"{"activationType": "snoozed"}"#).unwrap();
        assert_eq!(outcome, Some(Outcome::Other("snoozed".to_string())));
    }

    #[test]
    fn garbage_output_is_a_transport_error() {
        let msg = Message::builder("Hello").build().unwrap();
        assert!(ProcBackend::parse_output(&msg, b"not json").is_err());
    }
}
