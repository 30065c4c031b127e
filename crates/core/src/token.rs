//! Process-wide type identity tokens
//!
//! Two independently constructed descriptor tables for the same type name
//! must agree on identity, so tokens come from a global registry keyed by
//! type name. Type tests compare tokens, never structural shape.
//!
//! Uses parking_lot::Mutex instead of std::sync::Mutex to avoid cascading
//! panics from mutex poisoning.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Opaque, process-wide-unique identity for a message type.
///
/// Tokens are handed out by name: every schema constructed for the type
/// name `"User"` carries the same token, even when the descriptor tables
/// were built by independently loaded copies of the type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeToken(u64);

/// Global registry of issued tokens (type name -> token)
static TOKENS: Lazy<Mutex<HashMap<String, TypeToken>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

impl TypeToken {
    /// Look up (or issue) the token for a type name.
    pub fn for_type(name: &str) -> TypeToken {
        let mut tokens = TOKENS.lock();
        if let Some(token) = tokens.get(name) {
            return *token;
        }
        let token = TypeToken(tokens.len() as u64 + 1);
        tokens.insert(name.to_string(), token);
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_token() {
        let a = TypeToken::for_type("token_test_User");
        let b = TypeToken::for_type("token_test_User");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_names_distinct_tokens() {
        let a = TypeToken::for_type("token_test_A");
        let b = TypeToken::for_type("token_test_B");
        assert_ne!(a, b);
    }

    #[test]
    fn token_is_copy_and_hashable() {
        use std::collections::HashSet;
        let a = TypeToken::for_type("token_test_C");
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&a));
    }
}
