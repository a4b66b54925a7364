use std::time::{Duration, Instant};

pub const SEND_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, PartialEq)]
pub enum SendStatus {
    Idle,
    Sending { since: Instant },
    Sent,
    Invalid(&'static str),
}

/// Contact form with a simulated send. Nothing leaves the process; the
/// submission is only logged.
#[derive(Debug, Clone)]
pub struct ContactForm {
    pub email: String,
    pub message: String,
    status: SendStatus,
}

impl Default for ContactForm {
    fn default() -> Self {
        Self {
            email: String::new(),
            message: String::new(),
            status: SendStatus::Idle,
        }
    }
}

impl ContactForm {
    pub fn status(&self) -> &SendStatus {
        &self.status
    }

    pub fn is_sending(&self) -> bool {
        matches!(self.status, SendStatus::Sending { .. })
    }

    pub fn submit(&mut self, now: Instant) -> bool {
        if self.is_sending() {
            return false;
        }
        if self.email.trim().is_empty() || self.message.trim().is_empty() {
            self.status = SendStatus::Invalid("Please fill in all fields");
            return false;
        }
        if !self.email.contains('@') {
            self.status = SendStatus::Invalid("Please enter a valid email address");
            return false;
        }
        log::info!(
            "contact form submitted: email={} message_len={}",
            self.email.trim(),
            self.message.len()
        );
        self.status = SendStatus::Sending { since: now };
        true
    }

    /// Completes a pending send once [`SEND_DELAY`] has passed.
    pub fn poll(&mut self, now: Instant) {
        if let SendStatus::Sending { since } = self.status {
            if now.saturating_duration_since(since) >= SEND_DELAY {
                self.email.clear();
                self.message.clear();
                self.status = SendStatus::Sent;
            }
        }
    }

    pub fn button_label(&self) -> &'static str {
        if self.is_sending() {
            "Sending..."
        } else {
            "Send Message"
        }
    }

    pub fn notice(&self) -> Option<&'static str> {
        match self.status {
            SendStatus::Sent => Some("Message sent successfully! (Demo only)"),
            SendStatus::Invalid(reason) => Some(reason),
            _ => None,
        }
    }
}
