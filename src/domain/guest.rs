//! Guest checkout identity.
//!
//! Every order belongs to a user row. Guests get one synthesized from their
//! phone number, so a repeat guest with the same phone reuses the same row.

/// Synthesized email for a guest: `guest_<digits>@guest.com`. Returns `None`
/// when the phone carries no digits at all.
pub fn guest_email(phone: &str) -> Option<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    Some(format!("guest_{digits}@guest.com"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_only() {
        assert_eq!(guest_email("0612345678").as_deref(), Some("guest_0612345678@guest.com"));
    }

    #[test]
    fn formatting_is_stripped() {
        // Same phone written two ways resolves to the same identity.
        assert_eq!(guest_email("+212 612-345-678"), guest_email("212612345678"));
    }

    #[test]
    fn empty_or_garbage_is_rejected() {
        assert_eq!(guest_email(""), None);
        assert_eq!(guest_email("no digits"), None);
    }
}
