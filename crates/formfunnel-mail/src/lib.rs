pub mod template;
pub mod transport;

pub use template::{fill_placeholders, ComposedEmail, MessageConfig, Replacement, Template, TemplateSet};
pub use transport::{LogMailer, Mailer, OutboxMailer, SmtpMailer, SmtpSettings};
