//! Conversation room naming.
//!
//! A two-party conversation is identified by the unordered pair of its
//! participants. The key is derived, never stored.

use crate::constants::{PRIVATE_ROOM_PREFIX, ROOM_SEPARATOR};
use crate::types::UserId;

/// Canonical room key for the conversation between `a` and `b`.
///
/// The textual ids are sorted before joining, so `room_key(a, b) == room_key(b, a)`.
pub fn room_key(a: &UserId, b: &UserId) -> String {
    let mut ids = [a.to_string(), b.to_string()];
    ids.sort();
    format!("{}{}{}", ids[0], ROOM_SEPARATOR, ids[1])
}

/// Per-user room used for notifications and read receipts, never for
/// conversation traffic.
pub fn private_room(user: &UserId) -> String {
    format!("{PRIVATE_ROOM_PREFIX}{user}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_room_key_is_commutative() {
        for _ in 0..100 {
            let a = UserId::new();
            let b = UserId::new();
            assert_eq!(room_key(&a, &b), room_key(&b, &a));
        }
    }

    #[test]
    fn test_room_key_distinct_pairs_do_not_collide() {
        let users: Vec<UserId> = (0..20).map(|_| UserId::new()).collect();
        let mut keys = HashSet::new();
        let mut pairs = 0;
        for (i, a) in users.iter().enumerate() {
            for b in &users[i + 1..] {
                keys.insert(room_key(a, b));
                pairs += 1;
            }
        }
        assert_eq!(keys.len(), pairs);
    }

    #[test]
    fn test_room_key_sorted_lexicographically() {
        let a = UserId::parse("00000000-0000-4000-8000-000000000001").unwrap();
        let b = UserId::parse("ffffffff-0000-4000-8000-000000000001").unwrap();
        assert_eq!(
            room_key(&b, &a),
            "00000000-0000-4000-8000-000000000001_ffffffff-0000-4000-8000-000000000001"
        );
    }

    #[test]
    fn test_private_room_is_not_a_conversation_key() {
        let a = UserId::new();
        let b = UserId::new();
        let room = private_room(&a);
        assert!(room.starts_with("user_"));
        assert_ne!(room, room_key(&a, &b));
    }
}
