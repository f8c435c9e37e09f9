//! Opaque tokens for objects owned by the runtime.
//!
//! The host never constructs or frees what these refer to; it only threads
//! them back into the backend that produced them.

use std::fmt;

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(usize);

        impl $name {
            pub fn from_raw(raw: usize) -> Self {
                Self(raw)
            }

            pub fn raw(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.0)
            }
        }
    };
}

opaque_handle!(
    /// Root application domain returned by runtime start.
    DomainHandle
);
opaque_handle!(AssemblyHandle);
opaque_handle!(ImageHandle);
opaque_handle!(ClassHandle);
opaque_handle!(MethodHandle);
opaque_handle!(
    /// Managed object reference returned from an invocation.
    ObjectHandle
);
opaque_handle!(
    /// Registration of one native thread with the runtime, released by detach.
    ThreadHandle
);
