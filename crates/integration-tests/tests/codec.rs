//! Field encryption properties.

#![allow(clippy::unwrap_used)]

use stockbot_core::{CodecError, FieldCipher};
use stockbot_integration_tests::random_cipher;

#[test]
fn test_round_trip_preserves_text() {
    let cipher = random_cipher();
    for text in ["", "12.50", "Überweisung 💶", &"x".repeat(4096)] {
        assert_eq!(cipher.decrypt(&cipher.encrypt(text).unwrap()).unwrap(), text);
    }
}

#[test]
fn test_same_plaintext_encrypts_differently() {
    let cipher = random_cipher();
    let a = cipher.encrypt("9.99").unwrap();
    let b = cipher.encrypt("9.99").unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_ciphertext_is_not_plaintext() {
    let cipher = random_cipher();
    let sealed = cipher.encrypt("secret price 1234").unwrap();
    assert!(!sealed.contains("1234"));
}

#[test]
fn test_foreign_key_cannot_decrypt() {
    let sealed = random_cipher().encrypt("42.00").unwrap();
    assert_eq!(
        random_cipher().decrypt(&sealed),
        Err(CodecError::Decryption)
    );
}

#[test]
fn test_tampered_ciphertext_is_rejected() {
    let cipher = random_cipher();
    let sealed = cipher.encrypt("42.00").unwrap();

    let mut chars: Vec<char> = sealed.chars().collect();
    let last = chars.len() - 2;
    chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
    let tampered: String = chars.into_iter().collect();

    assert!(cipher.decrypt(&tampered).is_err());
    assert!(cipher.decrypt("not base64 at all!").is_err());
    assert!(cipher.decrypt("").is_err());
}

#[test]
fn test_optional_values_pass_none_through() {
    let cipher = random_cipher();
    assert_eq!(cipher.encrypt_opt(None).unwrap(), None);
    assert_eq!(cipher.decrypt_opt(None).unwrap(), None);

    let sealed = cipher.encrypt_opt(Some("1.00")).unwrap();
    assert_eq!(
        cipher.decrypt_opt(sealed.as_deref()).unwrap().as_deref(),
        Some("1.00")
    );
}

#[test]
fn test_invalid_keys_are_refused() {
    assert!(matches!(
        FieldCipher::from_base64(""),
        Err(CodecError::InvalidKey(_))
    ));
    assert!(matches!(
        FieldCipher::from_base64("dG9vLXNob3J0"),
        Err(CodecError::InvalidKey(_))
    ));
    assert!(matches!(
        FieldCipher::from_bytes(&[7u8; 16]),
        Err(CodecError::InvalidKey(_))
    ));
}
