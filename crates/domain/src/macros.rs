//! Macro for implementing Display and FromStr for protocol enums
//!
//! Validation results, authorization states and flow kinds are logged,
//! persisted and compared as strings. This macro keeps the string form and
//! the parser in one place.
//!
//! # Example
//!
//! ```rust
//! use authlane_domain::impl_auth_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Prompt {
//!     None,
//!     Login,
//! }
//!
//! impl_auth_enum_conversions!(Prompt {
//!     None => "none",
//!     Login => "login",
//! });
//!
//! assert_eq!(Prompt::Login.to_string(), "login");
//! assert_eq!("NONE".parse::<Prompt>(), Ok(Prompt::None));
//! ```

/// Implements `Display` and `FromStr` for fieldless enums.
///
/// String forms must be lowercase; parsing is case-insensitive.
#[macro_export]
macro_rules! impl_auth_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestResponseMode {
        Query,
        Fragment,
        FormPost,
    }

    impl_auth_enum_conversions!(TestResponseMode {
        Query => "query",
        Fragment => "fragment",
        FormPost => "form_post",
    });

    #[test]
    fn test_display_conversion() {
        assert_eq!(TestResponseMode::Query.to_string(), "query");
        assert_eq!(TestResponseMode::FormPost.to_string(), "form_post");
    }

    #[test]
    fn test_fromstr_mixed_case() {
        assert_eq!(TestResponseMode::from_str("Fragment").unwrap(), TestResponseMode::Fragment);
        assert_eq!(TestResponseMode::from_str("FORM_POST").unwrap(), TestResponseMode::FormPost);
    }

    #[test]
    fn test_fromstr_invalid() {
        let err = TestResponseMode::from_str("web_message").unwrap_err();
        assert!(err.contains("TestResponseMode"));
        assert!(err.contains("web_message"));
    }
}
