//! Macro for defining strongly-typed identifier newtypes.
//!
//! Every identifier shares the same invariant (non-empty, no surrounding
//! whitespace) and the same set of trait impls, so they are generated from a
//! single invocation.

/// Define a strongly-typed, non-empty identifier newtype.
///
/// Serde goes through `TryFrom<String>`, so empty identifiers are rejected at
/// deserialization time instead of surfacing later as lookup misses.
macro_rules! define_id_newtype {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        $vis struct $Name(String);

        impl $Name {
            /// Create a new identifier, panicking if it is empty.
            ///
            /// Prefer [`try_new`](Self::try_new) for untrusted input.
            pub fn new(id: impl Into<String>) -> Self {
                Self::try_new(id).expect(concat!(stringify!($Name), " must not be empty"))
            }

            /// Try to create a new identifier, returning `None` if it is blank.
            pub fn try_new(id: impl Into<String>) -> Option<Self> {
                let s = id.into();
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else if trimmed.len() == s.len() {
                    Some(Self(s))
                } else {
                    Some(Self(trimmed.to_string()))
                }
            }

            /// Return the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::ops::Deref for $Name {
            type Target = str;
            fn deref(&self) -> &str { &self.0 }
        }

        impl std::borrow::Borrow<str> for $Name {
            fn borrow(&self) -> &str { &self.0 }
        }

        impl TryFrom<String> for $Name {
            type Error = String;
            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::try_new(s).ok_or_else(|| concat!(stringify!($Name), " must not be empty").to_string())
            }
        }

        impl From<$Name> for String {
            fn from(id: $Name) -> String { id.0 }
        }

        impl PartialEq<str> for $Name {
            fn eq(&self, other: &str) -> bool { self.0 == other }
        }

        impl PartialEq<&str> for $Name {
            fn eq(&self, other: &&str) -> bool { self.0 == *other }
        }
    };
}

pub(crate) use define_id_newtype;
