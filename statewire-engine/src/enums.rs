//! Enum support: constants travel by name, never by ordinal, so variants can
//! be reordered or extended without breaking stored documents.

/// A type whose values map to and from bare constant-name tokens.
///
/// Usually implemented via [`wire_enum!`](crate::wire_enum); hand
/// implementations are fine for enums that need custom token spellings.
pub trait WireEnum: Copy + PartialEq + Default + Send + Sync + 'static {
    /// Name used in diagnostics when a token fails to resolve.
    const TYPE_NAME: &'static str;

    /// The wire token for this value.
    fn token(&self) -> &'static str;

    /// Resolves a wire token, `None` if no constant matches.
    fn from_token(token: &str) -> Option<Self>;
}

/// Declares an enum and implements [`WireEnum`] for it.
///
/// The first variant becomes the `Default`, which is what a field holds when
/// a document predating the field is decoded.
///
/// ```
/// statewire_engine::wire_enum! {
///     pub enum Phase { Setup, Combat, Cleanup }
/// }
/// assert_eq!(Phase::default(), Phase::Setup);
/// ```
#[macro_export]
macro_rules! wire_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $first:ident $(, $rest:ident)* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $first
            $(, $rest)*
        }

        impl ::core::default::Default for $name {
            fn default() -> Self {
                Self::$first
            }
        }

        impl $crate::WireEnum for $name {
            const TYPE_NAME: &'static str = stringify!($name);

            fn token(&self) -> &'static str {
                match self {
                    Self::$first => stringify!($first)
                    $(, Self::$rest => stringify!($rest))*
                }
            }

            fn from_token(token: &str) -> Option<Self> {
                match token {
                    stringify!($first) => Some(Self::$first),
                    $(stringify!($rest) => Some(Self::$rest),)*
                    _ => None,
                }
            }
        }
    };
}
