//! Link implementations.

use std::ffi::OsString;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use shell_escape::unix::escape;
use tracing::debug;

use super::{Channel, LinkControl, PartitionError};
use crate::command::{CommandError, CommandRunner, ProcessCommandRunner};

/// Placeholder replaced by the shell-escaped link name in command templates.
pub const LINK_PLACEHOLDER: &str = "{link}";

/// In-process link that only records its state.
///
/// Clones share state, so a test can keep a handle to observe a link it
/// registered.
#[derive(Clone, Debug)]
pub struct SimulatedLink {
    name: String,
    channel: Channel,
    suspended: Arc<AtomicBool>,
}

impl SimulatedLink {
    /// Creates a link that starts in the resumed state.
    #[must_use]
    pub fn new(name: impl Into<String>, channel: Channel) -> Self {
        Self {
            name: name.into(),
            channel,
            suspended: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns `true` while the link is suspended.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }
}

impl LinkControl for SimulatedLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel(&self) -> Channel {
        self.channel
    }

    fn suspend(&self) -> Result<(), PartitionError> {
        self.suspended.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&self) -> Result<(), PartitionError> {
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Link switched by shell commands, for example firewall rules or
/// `ip link set <iface> down`.
///
/// Commands are run through `sh -c`; every occurrence of
/// [`LINK_PLACEHOLDER`] is replaced by the shell-escaped link name.
#[derive(Clone)]
pub struct CommandLink<R = ProcessCommandRunner> {
    name: String,
    channel: Channel,
    suspend_command: String,
    resume_command: String,
    runner: R,
}

impl<R> fmt::Debug for CommandLink<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandLink")
            .field("name", &self.name)
            .field("channel", &self.channel)
            .field("suspend_command", &self.suspend_command)
            .field("resume_command", &self.resume_command)
            .finish_non_exhaustive()
    }
}

impl CommandLink<ProcessCommandRunner> {
    /// Creates a transport link driven by real processes.
    #[must_use]
    pub fn transport(
        name: impl Into<String>,
        suspend_command: impl Into<String>,
        resume_command: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            Channel::Transport,
            suspend_command,
            resume_command,
            ProcessCommandRunner,
        )
    }
}

impl<R: CommandRunner> CommandLink<R> {
    /// Creates a link using the provided runner.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        channel: Channel,
        suspend_command: impl Into<String>,
        resume_command: impl Into<String>,
        runner: R,
    ) -> Self {
        Self {
            name: name.into(),
            channel,
            suspend_command: suspend_command.into(),
            resume_command: resume_command.into(),
            runner,
        }
    }

    /// Renders `template` for this link.
    #[must_use]
    pub fn render(&self, template: &str) -> String {
        let escaped = escape(self.name.as_str().into());
        template.replace(LINK_PLACEHOLDER, escaped.as_ref())
    }

    fn execute(&self, template: &str, action: &'static str) -> Result<(), PartitionError> {
        let script = self.render(template);
        debug!(link = %self.name, action, script = %script, "running link command");
        let args = [OsString::from("-c"), OsString::from(script)];
        let link_error = |source: CommandError| PartitionError::Link {
            name: self.name.clone(),
            action,
            source,
        };
        let output = self.runner.run("sh", &args).map_err(link_error)?;
        if output.is_success() {
            return Ok(());
        }
        Err(link_error(CommandError::failure("sh", output)))
    }
}

impl<R: CommandRunner + Send + Sync> LinkControl for CommandLink<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel(&self) -> Channel {
        self.channel
    }

    fn suspend(&self) -> Result<(), PartitionError> {
        self.execute(&self.suspend_command, "suspend")
    }

    fn resume(&self) -> Result<(), PartitionError> {
        self.execute(&self.resume_command, "resume")
    }
}
