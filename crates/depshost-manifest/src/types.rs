//! Newtype wrappers for the identity strings that flow through resolution.
//!
//! Both newtypes serialize/deserialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// `<name>/<version>` key of a library in the manifest's `libraries` and `targets` maps.
    LibraryIdentity
);

string_newtype!(
    /// Fully-qualified assembly name, `<name>, Version=<version>`, used to load by name.
    AssemblyIdentity
);

impl LibraryIdentity {
    /// Build the identity of a dependency from its name and version.
    pub fn from_parts(name: &str, version: &str) -> Self {
        Self(format!("{name}/{version}"))
    }

    /// Split on the first `/`. `None` when the identity carries no version.
    pub fn split_version(&self) -> Option<(&str, &str)> {
        self.0.split_once('/')
    }

    pub fn assembly_identity(&self) -> Option<AssemblyIdentity> {
        let (name, version) = self.split_version()?;
        Some(AssemblyIdentity(format!("{name}, Version={version}")))
    }
}

impl AssemblyIdentity {
    /// Simple name of the assembly, the part before the first `,`.
    pub fn simple_name(&self) -> &str {
        self.0.split(',').next().unwrap_or_default().trim()
    }
}
