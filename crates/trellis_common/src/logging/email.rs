//! Email log route: all pending entries in one message per recipient.
//!
//! Messages are handed to a `MailTransport`; the default pipes them to
//! the application's sendmail program (`sendmail -t -i`).

use crate::base::component::Component;
use crate::base::context::AppContext;
use crate::base::property::{as_bool, as_list, as_opt_string, split_list_raw};
use crate::error::{Result, TrellisError};
use crate::logging::route::{LogRoute, RouteState};
use crate::logging::LogEntry;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use std::any::Any;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use tracing::debug;

/// Body line width
pub const WRAP_WIDTH: usize = 70;

/// A rendered mail message
#[derive(Debug, Clone, PartialEq)]
pub struct MailMessage {
    pub to: String,
    pub headers: Vec<String>,
    pub body: String,
}

impl MailMessage {
    /// Headers joined by CRLF, a blank line, then the body
    pub fn render(&self) -> String {
        format!("{}\r\n\r\n{}", self.headers.join("\r\n"), self.body)
    }
}

pub trait MailTransport: Send {
    fn send(&self, message: &MailMessage) -> io::Result<()>;
}

/// Pipes messages to a sendmail compatible program.
pub struct SendmailTransport {
    program: String,
}

impl SendmailTransport {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MailTransport for SendmailTransport {
    fn send(&self, message: &MailMessage) -> io::Result<()> {
        let mut child = Command::new(&self.program)
            .args(["-t", "-i"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()?;

        // stdin closes at the end of the match; the child is reaped
        // before any write error is returned
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(message.render().as_bytes()),
            None => Ok(()),
        };
        let status = child.wait()?;
        if !status.success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} exited with {}", self.program, status),
            ));
        }
        written
    }
}

fn sender_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([^<]*)<([^>]*)>").expect("static regex"))
}

/// RFC 2047 base64 encoded word
fn encode_word(text: &str) -> String {
    format!("=?UTF-8?B?{}?=", STANDARD.encode(text.as_bytes()))
}

pub struct EmailLogRoute {
    state: RouteState,
    emails: Vec<String>,
    subject: Option<String>,
    sent_from: Option<String>,
    headers: Vec<String>,
    utf8: bool,
    app_name: String,
    transport: Option<Box<dyn MailTransport>>,
}

impl Default for EmailLogRoute {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailLogRoute {
    pub fn new() -> Self {
        Self {
            state: RouteState::default(),
            emails: Vec::new(),
            subject: None,
            sent_from: None,
            headers: Vec::new(),
            utf8: false,
            app_name: String::new(),
            transport: None,
        }
    }

    pub fn with_transport(mut self, transport: Box<dyn MailTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn emails(&self) -> &[String] {
        &self.emails
    }

    /// Configured subject, or `"<app name> log"`
    pub fn subject(&self) -> String {
        match &self.subject {
            Some(subject) if !subject.is_empty() => subject.clone(),
            _ => format!("{} log", self.app_name),
        }
    }

    pub fn sent_from(&self) -> Option<&str> {
        self.sent_from.as_deref()
    }

    /// Headers for one recipient, in send order
    pub fn build_headers(&self, email: &str, subject: &str) -> Vec<String> {
        let subject = if self.utf8 {
            encode_word(subject)
        } else {
            subject.to_string()
        };

        let mut headers = vec![
            "MIME-Version: 1.0".to_string(),
            format!("Date: {}", Utc::now().to_rfc2822()),
            format!("To: {}", email),
            format!("Subject: {}", subject),
            "Content-Type: text/plain; charset=utf-8".to_string(),
        ];

        if let Some(from) = self.sent_from.as_deref().filter(|f| !f.is_empty()) {
            let address = match sender_pattern().captures(from) {
                Some(caps) => {
                    let name = caps[1].trim();
                    let address = caps[2].trim().to_string();
                    let name = if self.utf8 {
                        encode_word(name)
                    } else {
                        name.to_string()
                    };
                    headers.push(format!("From: {} <{}>", name, address));
                    address
                }
                None => {
                    headers.push(format!("From: {}", from));
                    from.to_string()
                }
            };
            headers.push(format!("Reply-To: {}", address));
        }

        headers.extend(self.headers.iter().cloned());
        headers
    }

    pub fn build_body(&self, logs: &[LogEntry]) -> String {
        let text: String = logs.iter().map(|entry| self.format_log_message(entry)).collect();
        text.lines()
            .map(|line| textwrap::fill(line, WRAP_WIDTH))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Component for EmailLogRoute {
    fn class_name(&self) -> &str {
        "EmailLogRoute"
    }

    fn init(&mut self, ctx: &mut AppContext) -> Result<()> {
        self.app_name = ctx.name().to_string();
        if self.transport.is_none() {
            self.transport = Some(Box::new(SendmailTransport::new(ctx.sendmail())));
        }
        self.state.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state.initialized
    }

    fn set_property(&mut self, name: &str, value: &Value) -> Result<()> {
        const CLASS: &str = "EmailLogRoute";
        if self.state.set_property(CLASS, name, value)? {
            return Ok(());
        }
        match name {
            "emails" => self.emails = as_list(CLASS, name, value)?,
            "subject" => self.subject = as_opt_string(CLASS, name, value)?,
            "sentFrom" => self.sent_from = as_opt_string(CLASS, name, value)?,
            "utf8" => self.utf8 = as_bool(CLASS, name, value)?,
            "headers" => {
                self.headers = match value {
                    Value::String(s) => s
                        .split(['\r', '\n'])
                        .filter(|line| !line.is_empty())
                        .map(str::to_string)
                        .collect(),
                    other => as_list(CLASS, name, other)?,
                }
            }
            _ => return Err(TrellisError::unknown_property(CLASS, name)),
        }
        Ok(())
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "emails" => Some(Value::from(self.emails.clone())),
            "subject" => Some(Value::from(self.subject())),
            "sentFrom" => self.sent_from.clone().map(Value::from),
            "utf8" => Some(Value::Bool(self.utf8)),
            "headers" => Some(Value::from(self.headers.clone())),
            _ => self.state.get_property(name),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_log_route(&mut self) -> Option<&mut dyn LogRoute> {
        Some(self)
    }
}

impl LogRoute for EmailLogRoute {
    fn state(&self) -> &RouteState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RouteState {
        &mut self.state
    }

    fn process_logs(&mut self, logs: &[LogEntry]) {
        let Some(transport) = self.transport.as_ref() else {
            debug!("email log route used before init, dropping {} entries", logs.len());
            return;
        };

        let body = self.build_body(logs);
        let subject = self.subject();
        for email in &self.emails {
            let message = MailMessage {
                to: email.clone(),
                headers: self.build_headers(email, &subject),
                body: body.clone(),
            };
            if let Err(e) = transport.send(&message) {
                debug!("log mail to {} failed: {}", email, e);
            }
        }
    }
}

/// Recipients from a comma/space separated string
pub fn parse_emails(spec: &str) -> Vec<String> {
    split_list_raw(spec)
}
