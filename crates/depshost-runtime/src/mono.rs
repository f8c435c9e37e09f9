//! Bindings to the Mono embedding API (`libmonosgen-2.0`).
//!
//! Handles are the raw Mono pointers. Nothing here frees runtime-owned
//! objects; their lifetime is the root domain's.
#![allow(unsafe_code)]

use crate::backend::{RuntimeBackend, RuntimeProperty};
use crate::handle::{
    AssemblyHandle, ClassHandle, DomainHandle, ImageHandle, MethodHandle, ObjectHandle,
    ThreadHandle,
};
use crate::RuntimeError;
use std::ffi::{c_char, c_int, c_void, CString};
use std::ptr;
use tracing::debug;

const MONO_IMAGE_OK: c_int = 0;

#[link(name = "monosgen-2.0")]
extern "C" {
    fn monovm_initialize(
        property_count: c_int,
        keys: *const *const c_char,
        values: *const *const c_char,
    ) -> c_int;
    fn mono_jit_init_version(domain_name: *const c_char, runtime_version: *const c_char)
        -> *mut c_void;
    fn mono_get_root_domain() -> *mut c_void;
    fn mono_assembly_name_new(name: *const c_char) -> *mut c_void;
    fn mono_assembly_name_free(aname: *mut c_void);
    fn mono_assembly_load_full(
        aname: *mut c_void,
        basedir: *const c_char,
        status: *mut c_int,
        refonly: c_int,
    ) -> *mut c_void;
    fn mono_assembly_get_image(assembly: *mut c_void) -> *mut c_void;
    fn mono_class_from_name(
        image: *mut c_void,
        name_space: *const c_char,
        name: *const c_char,
    ) -> *mut c_void;
    fn mono_class_get_method_from_name(
        klass: *mut c_void,
        name: *const c_char,
        param_count: c_int,
    ) -> *mut c_void;
    fn mono_runtime_invoke(
        method: *mut c_void,
        obj: *mut c_void,
        params: *mut *mut c_void,
        exc: *mut *mut c_void,
    ) -> *mut c_void;
    fn mono_thread_attach(domain: *mut c_void) -> *mut c_void;
    fn mono_thread_detach(thread: *mut c_void);
}

fn c_string(value: &str) -> Result<CString, RuntimeError> {
    CString::new(value)
        .map_err(|_| RuntimeError::InvalidArgument(format!("interior NUL in '{value}'")))
}

fn as_ptr(raw: usize) -> *mut c_void {
    raw as *mut c_void
}

fn non_null(p: *mut c_void) -> Option<usize> {
    (!p.is_null()).then_some(p as usize)
}

#[derive(Debug, Default)]
pub struct MonoBackend;

impl MonoBackend {
    pub fn new() -> Self {
        Self
    }
}

impl RuntimeBackend for MonoBackend {
    fn name(&self) -> &'static str {
        "mono"
    }

    fn available(&self) -> bool {
        true
    }

    fn initialize(&self, properties: &[RuntimeProperty]) -> Result<(), RuntimeError> {
        let keys = properties
            .iter()
            .map(|p| c_string(&p.key))
            .collect::<Result<Vec<_>, _>>()?;
        let values = properties
            .iter()
            .map(|p| c_string(&p.value))
            .collect::<Result<Vec<_>, _>>()?;
        let key_ptrs: Vec<*const c_char> = keys.iter().map(|k| k.as_ptr()).collect();
        let value_ptrs: Vec<*const c_char> = values.iter().map(|v| v.as_ptr()).collect();
        let count = c_int::try_from(properties.len())
            .map_err(|_| RuntimeError::InvalidArgument("too many properties".to_owned()))?;

        // SAFETY: both pointer arrays hold `count` NUL-terminated strings that
        // outlive the call.
        let rc = unsafe { monovm_initialize(count, key_ptrs.as_ptr(), value_ptrs.as_ptr()) };
        if rc != 0 {
            return Err(RuntimeError::InitFailed(format!(
                "monovm_initialize returned {rc}"
            )));
        }
        Ok(())
    }

    fn start(&self, host_name: &str, version_token: &str) -> Result<DomainHandle, RuntimeError> {
        let host = c_string(host_name)?;
        let version = c_string(version_token)?;
        // SAFETY: valid C strings for the duration of the call.
        let domain = unsafe { mono_jit_init_version(host.as_ptr(), version.as_ptr()) };
        non_null(domain)
            .map(DomainHandle::from_raw)
            .ok_or_else(|| {
                RuntimeError::InitFailed("root domain was null, expected non-NULL".to_owned())
            })
    }

    fn root_domain(&self) -> Result<DomainHandle, RuntimeError> {
        // SAFETY: no arguments; returns null before initialization.
        let domain = unsafe { mono_get_root_domain() };
        non_null(domain)
            .map(DomainHandle::from_raw)
            .ok_or_else(|| RuntimeError::InitFailed("runtime not started".to_owned()))
    }

    fn load_assembly_by_name(&self, identity: &str) -> Result<AssemblyHandle, RuntimeError> {
        let name = c_string(identity)?;
        // SAFETY: `name` is a valid C string; the returned name is freed below.
        let aname = unsafe { mono_assembly_name_new(name.as_ptr()) };
        if aname.is_null() {
            return Err(RuntimeError::InvalidArgument(format!(
                "couldn't parse assembly name '{identity}'"
            )));
        }
        let mut status: c_int = MONO_IMAGE_OK;
        // SAFETY: `aname` is a live MonoAssemblyName, `status` a valid out-pointer.
        let assembly = unsafe { mono_assembly_load_full(aname, ptr::null(), &mut status, 0) };
        // SAFETY: `aname` came from mono_assembly_name_new and is not used again.
        unsafe { mono_assembly_name_free(aname) };

        match non_null(assembly) {
            Some(raw) if status == MONO_IMAGE_OK => Ok(AssemblyHandle::from_raw(raw)),
            _ => {
                debug!("mono_assembly_load_full status=0x{status:08x}");
                Err(RuntimeError::AssemblyNotFound(identity.to_owned()))
            }
        }
    }

    fn image_of(&self, assembly: AssemblyHandle) -> Result<ImageHandle, RuntimeError> {
        // SAFETY: the handle was produced by load_assembly_by_name.
        let image = unsafe { mono_assembly_get_image(as_ptr(assembly.raw())) };
        non_null(image)
            .map(ImageHandle::from_raw)
            .ok_or_else(|| RuntimeError::InvalidArgument(format!("no image for {assembly}")))
    }

    fn find_class(
        &self,
        image: ImageHandle,
        namespace: &str,
        name: &str,
    ) -> Result<ClassHandle, RuntimeError> {
        let ns = c_string(namespace)?;
        let cls = c_string(name)?;
        // SAFETY: live image handle and valid C strings.
        let class =
            unsafe { mono_class_from_name(as_ptr(image.raw()), ns.as_ptr(), cls.as_ptr()) };
        non_null(class)
            .map(ClassHandle::from_raw)
            .ok_or_else(|| RuntimeError::ClassNotFound {
                namespace: namespace.to_owned(),
                name: name.to_owned(),
            })
    }

    fn get_method(
        &self,
        class: ClassHandle,
        name: &str,
        arity: u32,
    ) -> Result<MethodHandle, RuntimeError> {
        let method_name = c_string(name)?;
        let param_count = c_int::try_from(arity)
            .map_err(|_| RuntimeError::InvalidArgument(format!("arity {arity} out of range")))?;
        // SAFETY: live class handle and a valid C string.
        let method = unsafe {
            mono_class_get_method_from_name(as_ptr(class.raw()), method_name.as_ptr(), param_count)
        };
        non_null(method)
            .map(MethodHandle::from_raw)
            .ok_or_else(|| RuntimeError::MethodNotFound {
                class: class.to_string(),
                name: name.to_owned(),
                arity,
            })
    }

    fn invoke(
        &self,
        method: MethodHandle,
        receiver: Option<ObjectHandle>,
        args: &[ObjectHandle],
    ) -> Result<Option<ObjectHandle>, RuntimeError> {
        let mut params: Vec<*mut c_void> = args.iter().map(|a| as_ptr(a.raw())).collect();
        let params_ptr = if params.is_empty() {
            ptr::null_mut()
        } else {
            params.as_mut_ptr()
        };
        let obj = receiver.map_or(ptr::null_mut(), |r| as_ptr(r.raw()));
        let mut exc: *mut c_void = ptr::null_mut();

        // SAFETY: method/receiver handles come from this runtime; `params`
        // outlives the call and `exc` is a valid out-pointer.
        let result =
            unsafe { mono_runtime_invoke(as_ptr(method.raw()), obj, params_ptr, &mut exc) };
        if !exc.is_null() {
            return Err(RuntimeError::InvokeFailed(format!(
                "{method} raised a managed exception"
            )));
        }
        Ok(non_null(result).map(ObjectHandle::from_raw))
    }

    fn attach_thread(&self, domain: DomainHandle) -> Result<ThreadHandle, RuntimeError> {
        // SAFETY: live domain handle; attaching the calling thread.
        let thread = unsafe { mono_thread_attach(as_ptr(domain.raw())) };
        non_null(thread)
            .map(ThreadHandle::from_raw)
            .ok_or_else(|| {
                RuntimeError::AttachFailed("mono_thread_attach returned null".to_owned())
            })
    }

    fn detach_thread(&self, thread: ThreadHandle) -> Result<(), RuntimeError> {
        // SAFETY: the handle was returned by mono_thread_attach on this thread.
        unsafe { mono_thread_detach(as_ptr(thread.raw())) };
        Ok(())
    }
}
