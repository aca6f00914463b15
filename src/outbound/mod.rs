//! Outbound formatting and delivery boundaries
//!
//! Everything downstream of the classifier: change digest, alert report,
//! WhatsApp links, mail hand-off. Formatting is pure; only `mail` and
//! `AlertReport::write_json` touch the filesystem.

pub mod digest;
pub mod mail;
pub mod report;
pub mod whatsapp;

pub use digest::{mail_subject, render_digest};
pub use mail::{MailSender, NullMailer, OutboxMailer};
pub use report::AlertReport;
pub use whatsapp::MessageLinkBuilder;
