use regex::Regex;
use std::sync::OnceLock;

use super::models::SignupInput;
use crate::common::{ValidationResult, Validator};

const NICKNAME_MIN: usize = 2;
const NICKNAME_MAX: usize = 30;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email.trim())
}

impl Validator<SignupInput> for SignupInput {
    fn validate(&self, data: &SignupInput) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !is_valid_email(&data.email) {
            result.add_error("email", "Email format is invalid");
        }

        let nickname_len = data.nickname.trim().chars().count();
        if !(NICKNAME_MIN..=NICKNAME_MAX).contains(&nickname_len) {
            result.add_error("nickname", "Nickname must be between 2 and 30 characters");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(email: &str, nickname: &str) -> SignupInput {
        SignupInput {
            email: email.to_string(),
            password: "abc12345".to_string(),
            nickname: nickname.to_string(),
        }
    }

    #[test]
    fn test_valid_signup() {
        let data = input("a@b.com", "Ann");
        assert!(data.validate(&data).is_valid);
    }

    #[test]
    fn test_invalid_email() {
        for email in ["", "a@b", "a b@c.com", "@b.com", "a@@b.com"] {
            let data = input(email, "Ann");
            let result = data.validate(&data);
            assert!(!result.is_valid, "{:?}", email);
            assert_eq!(result.errors[0].field, "email");
        }
    }

    #[test]
    fn test_nickname_bounds() {
        let data = input("a@b.com", " A ");
        assert!(!data.validate(&data).is_valid);
        let data = input("a@b.com", &"가".repeat(30));
        assert!(data.validate(&data).is_valid);
        let data = input("a@b.com", &"x".repeat(31));
        assert!(!data.validate(&data).is_valid);
    }
}
