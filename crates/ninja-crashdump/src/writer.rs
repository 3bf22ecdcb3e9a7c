//! The dump sequence.
//!
//! `create_mini_dump` runs on the thread handling a fatal exception. It
//! never panics and never returns an error: each step either succeeds or
//! ends the call with one message to the [`DumpLog`]. Paths, names and
//! messages all live in fixed-capacity buffers on the stack.

use crate::capability::{Capability, DumpCapability};
use crate::context::{DumpRequest, ExceptionContext};
use crate::error::DumpError;
use crate::log::{DumpLog, TracingLog};
use crate::path::DumpPath;
use crate::sys;
use ninja_crashdump_config::{log_dump_debug, Config, DumpConfig};
use std::path::PathBuf;

/// How a [`DumpWriter`] finds its writer and where it puts the file.
///
/// Built once when the crash handler is installed; nothing here is
/// allocated at fault time.
#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    pub capability: Capability,
    /// Replaces the system temp directory. File naming is unchanged.
    pub directory: Option<PathBuf>,
    /// Unload the diagnostic module once the dump is written. Leave unset on
    /// the fatal path; set it for snapshots of a process that keeps running.
    pub unload_module: bool,
}

impl DumpOptions {
    pub fn from_config(config: &DumpConfig) -> Self {
        Self {
            capability: Capability::dynamic(config.module.clone(), config.entry_point.clone()),
            directory: config.directory.clone(),
            unload_module: config.unload_module,
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = capability;
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_unload_module(mut self, unload_module: bool) -> Self {
        self.unload_module = unload_module;
        self
    }
}

/// Produces `ninja_crash_dump_<pid>.dmp` for the current process.
#[derive(Debug)]
pub struct DumpWriter<L = TracingLog> {
    options: DumpOptions,
    log: L,
}

impl DumpWriter<TracingLog> {
    pub fn new(options: DumpOptions) -> Self {
        Self::with_log(options, TracingLog)
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(DumpOptions::from_config(&config.dump))
    }
}

impl Default for DumpWriter<TracingLog> {
    fn default() -> Self {
        Self::new(DumpOptions::default())
    }
}

impl<L: DumpLog> DumpWriter<L> {
    pub fn with_log(options: DumpOptions, log: L) -> Self {
        Self { options, log }
    }

    pub fn options(&self) -> &DumpOptions {
        &self.options
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Where this process's dump goes.
    pub fn dump_path(&self) -> Result<DumpPath, DumpError<'static>> {
        DumpPath::build(
            self.options.directory.as_deref().map(|d| d.as_os_str()),
            sys::current_process_id(),
        )
    }

    /// Write a minidump of the current process.
    ///
    /// `context` is the fault record from the exception hook; `None` writes a
    /// dump without exception information. The outcome is reported through
    /// the log only.
    pub fn create_mini_dump(&self, context: Option<&ExceptionContext<'_>>) {
        let path = match self.dump_path() {
            Ok(path) => path,
            Err(e) => {
                self.log.error(format_args!("{e}"));
                return;
            }
        };

        match self.write(&path, context) {
            Ok(()) => self
                .log
                .warning(format_args!("minidump created: {}", path.display())),
            Err(e) => self.log.error(format_args!("{e}")),
        }
    }

    fn write<'a>(
        &'a self,
        path: &'a DumpPath,
        context: Option<&ExceptionContext<'_>>,
    ) -> Result<(), DumpError<'a>> {
        // Usually absent. Any other failure resurfaces when the file is created.
        if let Err(e) = sys::delete_file(path) {
            if !e.is_not_found() {
                log_dump_debug!("stale dump not removed", code = e.code());
            }
        }

        let capability = self.options.capability.resolve()?;
        let written = self.write_with(&capability, path, context);
        if self.options.unload_module {
            capability.release();
        }
        written
    }

    fn write_with<'a>(
        &'a self,
        capability: &DumpCapability,
        path: &'a DumpPath,
        context: Option<&ExceptionContext<'_>>,
    ) -> Result<(), DumpError<'a>> {
        let file = sys::create_file(path).map_err(|source| DumpError::CreateFile {
            path: path.display(),
            source,
        })?;

        let request = context.map(DumpRequest::for_current_thread);
        let written = unsafe { capability.write(&file, request.as_ref()) };
        drop(file);

        // A partial file stays on disk for inspection.
        written.map_err(|source| DumpError::WriteDump {
            writer: self.options.capability.name(),
            source,
        })
    }
}
