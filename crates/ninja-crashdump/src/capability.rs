//! Runtime discovery of the dump-writing function.
//!
//! The writer lives in a system module that is not present on every OS
//! edition, so it is loaded by name and looked up by symbol on each call
//! instead of being linked. A missing module or export is an ordinary error.

use crate::context::DumpRequest;
use crate::error::{DumpError, OsError};
use crate::sys::{self, DumpFile, RawHandle};
use ninja_crashdump_config::{DEFAULT_ENTRY_POINT, DEFAULT_MODULE};
use std::borrow::Cow;
use std::ffi::c_void;
use std::ptr::{self, NonNull};

/// Signature of `MiniDumpWriteDump`. Returns non-zero on success.
pub type WriteDumpFn = unsafe extern "system" fn(
    process: RawHandle,
    process_id: u32,
    file: RawHandle,
    dump_type: u32,
    exception: *const DumpRequest,
    user_stream: *const c_void,
    callback: *const c_void,
) -> i32;

/// Where the dump writer comes from.
#[derive(Clone, Debug)]
pub enum Capability {
    /// Load `module` at call time and look up `entry_point` in it.
    Dynamic {
        module: Cow<'static, str>,
        entry_point: Cow<'static, str>,
    },
    /// Writer the host already links against.
    Linked(WriteDumpFn),
}

impl Default for Capability {
    fn default() -> Self {
        Capability::Dynamic {
            module: Cow::Borrowed(DEFAULT_MODULE),
            entry_point: Cow::Borrowed(DEFAULT_ENTRY_POINT),
        }
    }
}

impl Capability {
    pub fn dynamic(
        module: impl Into<Cow<'static, str>>,
        entry_point: impl Into<Cow<'static, str>>,
    ) -> Self {
        Capability::Dynamic {
            module: module.into(),
            entry_point: entry_point.into(),
        }
    }

    /// Name used when reporting a failed write.
    pub fn name(&self) -> &str {
        match self {
            Capability::Dynamic { entry_point, .. } => entry_point,
            Capability::Linked(_) => "linked minidump writer",
        }
    }

    /// Resolve the writer. Nothing is cached between calls.
    pub fn resolve(&self) -> Result<DumpCapability, DumpError<'_>> {
        match self {
            Capability::Linked(write_dump) => Ok(DumpCapability {
                write_dump: *write_dump,
                module: None,
            }),
            Capability::Dynamic {
                module,
                entry_point,
            } => {
                let loaded = Module::load(module).map_err(|source| DumpError::LoadModule {
                    module: &**module,
                    source,
                })?;
                let symbol = match loaded.symbol(entry_point) {
                    Ok(symbol) => symbol,
                    Err(source) => {
                        return Err(DumpError::ResolveEntryPoint {
                            entry_point: &**entry_point,
                            source,
                        })
                    }
                };
                let write_dump =
                    unsafe { std::mem::transmute::<*mut c_void, WriteDumpFn>(symbol.as_ptr()) };
                Ok(DumpCapability {
                    write_dump,
                    module: Some(loaded),
                })
            }
        }
    }
}

/// Loaded system module.
///
/// Dropping a `Module` does not unload it. After a fault the process is
/// about to exit and the module stays resident for that remaining lifetime;
/// callers that keep running call [`Module::unload`].
#[derive(Debug)]
pub struct Module {
    handle: NonNull<c_void>,
}

impl Module {
    pub fn load(name: &str) -> Result<Self, OsError> {
        sys::load_module(name).map(|handle| Self { handle })
    }

    pub fn symbol(&self, name: &str) -> Result<NonNull<c_void>, OsError> {
        sys::resolve_symbol(self.handle, name)
    }

    pub fn unload(self) {
        sys::unload_module(self.handle);
    }
}

/// A resolved dump writer, ready to call.
pub struct DumpCapability {
    write_dump: WriteDumpFn,
    module: Option<Module>,
}

impl DumpCapability {
    /// Write a dump of the current process into `file`.
    ///
    /// The OS error is captured before returning, ahead of any call that
    /// could overwrite it.
    ///
    /// # Safety
    /// The resolved function must have the `MiniDumpWriteDump` signature.
    pub(crate) unsafe fn write(
        &self,
        file: &DumpFile,
        request: Option<&DumpRequest>,
    ) -> Result<(), OsError> {
        let request = request.map_or(ptr::null(), |r| r as *const DumpRequest);
        let ok = (self.write_dump)(
            sys::current_process(),
            sys::current_process_id(),
            file.raw(),
            crate::context::DUMP_TYPE,
            request,
            ptr::null(),
            ptr::null(),
        );
        if ok == 0 {
            return Err(OsError::last());
        }
        Ok(())
    }

    pub fn is_linked(&self) -> bool {
        self.module.is_none()
    }

    /// Unload the module the writer came from, if any.
    pub fn release(self) {
        if let Some(module) = self.module {
            module.unload();
        }
    }
}
