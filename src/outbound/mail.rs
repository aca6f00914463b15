//! Mail sender boundary
//!
//! The core only produces a subject and a body. Delivery belongs to an
//! external relay; the default sender drops one message file per send into an
//! outbox directory that the relay drains.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use crate::error::Result;

pub trait MailSender {
    fn send(&self, subject: &str, body: &str) -> Result<()>;
}

/// Suffixes tried before giving up on a timestamp
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Claim a fresh `<stem>.txt` in `dir`, adding `-1`, `-2`, ... when taken.
/// The file is created exclusively so concurrent senders never share one.
fn create_message_file(dir: &Path, stem: &str) -> std::io::Result<(PathBuf, File)> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = match attempt {
            0 => format!("{}.txt", stem),
            n => format!("{}-{}.txt", stem, n),
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free outbox name for {} in {}", stem, dir.display()),
    ))
}

/// Writes `<outbox>/mail-<timestamp>.txt` with a `Subject:` header line
#[derive(Debug, Clone)]
pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl MailSender for OutboxMailer {
    fn send(&self, subject: &str, body: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let stem = format!("mail-{}", Utc::now().format("%Y%m%d-%H%M%S%.3f"));
        let (path, mut file) = create_message_file(&self.dir, &stem)?;
        write!(file, "Subject: {}\n\n{}\n", subject, body)?;
        file.sync_all()?;
        info!("Queued mail {:?} at {}", subject, path.display());
        Ok(())
    }
}

/// Discards everything; used for dry runs
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMailer;

impl MailSender for NullMailer {
    fn send(&self, subject: &str, _body: &str) -> Result<()> {
        info!("Mail suppressed: {:?}", subject);
        Ok(())
    }
}
